//! Metrics collector for the scheduler subsystem
//!
//! All recording goes through the `metrics` facade; nothing is exported unless
//! the binary installs a recorder (Prometheus exporter).

use metrics::{counter, gauge, histogram};

/// Metrics collector shared by dispatcher, worker and ingestion
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    // Dispatcher metrics

    /// A due job was handed off to its queue
    pub fn record_job_dispatched(&self, queue: &str) {
        counter!("scheduler_jobs_dispatched_total", "queue" => queue.to_string()).increment(1);
    }

    /// Another instance removed the index entry first
    pub fn record_lost_race(&self) {
        counter!("scheduler_lost_races_total").increment(1);
    }

    /// A tick failed because the backing store was unavailable
    pub fn record_tick_error(&self) {
        counter!("scheduler_tick_errors_total").increment(1);
    }

    pub fn record_sync(&self, inserted: usize, removed: usize) {
        counter!("scheduler_index_inserts_total").increment(inserted as u64);
        counter!("scheduler_index_removals_total").increment(removed as u64);
    }

    pub fn record_reload(&self, job_count: usize) {
        counter!("scheduler_reloads_total").increment(1);
        gauge!("scheduler_registered_jobs").set(job_count as f64);
    }

    // Worker metrics

    pub fn record_task_attempt(&self, kind: &str) {
        counter!("worker_task_attempts_total", "kind" => kind.to_string()).increment(1);
    }

    pub fn record_task_outcome(&self, kind: &str, status: &str, duration_seconds: f64) {
        counter!(
            "worker_task_outcomes_total",
            "kind" => kind.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        histogram!("worker_task_duration_seconds", "kind" => kind.to_string())
            .record(duration_seconds);
    }

    pub fn set_in_flight(&self, count: usize) {
        gauge!("worker_tasks_in_flight").set(count as f64);
    }

    // Ingestion metrics

    pub fn record_report_ingested(&self, status: &str, created: bool) {
        counter!(
            "ingestion_reports_total",
            "status" => status.to_string(),
            "outcome" => if created { "created" } else { "updated" }
        )
        .increment(1);
    }
}
