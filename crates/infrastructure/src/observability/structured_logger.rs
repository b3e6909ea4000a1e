//! Structured logging utilities
//!
//! Event-style log lines with stable field names, so log pipelines can
//! filter on `event`.

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

/// Structured logging utilities
pub struct StructuredLogger;

impl StructuredLogger {
    /// Log a job hand-off; `next_run` is `None` when the job was not rescheduled
    pub fn log_job_dispatched(
        job_id: &str,
        queue: &str,
        func_path: &str,
        next_run: Option<DateTime<Utc>>,
    ) {
        info!(
            event = "job_dispatched",
            job.id = job_id,
            job.queue = queue,
            job.func_path = func_path,
            job.next_run = ?next_run,
            "任务已投递"
        );
    }

    /// Log a rejected job definition
    pub fn log_job_rejected(job_id: &str, reason: &str) {
        warn!(
            event = "job_rejected",
            job.id = job_id,
            reason = reason,
            "跳过无效的任务定义"
        );
    }

    pub fn log_reload(reason: &str, job_count: usize, inserted: usize, removed: usize) {
        info!(
            event = "scheduler_reload",
            reason = reason,
            jobs = job_count,
            index.inserted = inserted,
            index.removed = removed,
            "任务表已重新加载"
        );
    }

    /// Log a single execution attempt failure
    pub fn log_attempt_failed(task_id: &str, attempt: u32, max_attempts: u32, error_message: &str) {
        warn!(
            event = "task_attempt_failed",
            task.id = task_id,
            attempt = attempt,
            max_attempts = max_attempts,
            error = error_message,
            "任务执行失败"
        );
    }

    pub fn log_task_finished(task_id: &str, status: &str, attempts: u32, duration_ms: u128) {
        info!(
            event = "task_finished",
            task.id = task_id,
            task.status = status,
            attempts = attempts,
            duration_ms = duration_ms as u64,
            "任务执行结束"
        );
    }

    pub fn log_report_failed(task_id: &str, error_message: &str) {
        error!(
            event = "task_report_failed",
            task.id = task_id,
            error = error_message,
            "任务结果上报失败"
        );
    }
}
