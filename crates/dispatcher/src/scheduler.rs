use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Instrument};

use scheduler_core::{
    config::DispatcherConfig,
    logging::job_span,
    models::{from_score, to_score, JobSpec, TaskExecutionMessage},
    traits::{JobStore, TaskQueue},
    SchedulerResult,
};
use scheduler_infrastructure::{MetricsCollector, StructuredLogger};

use crate::job_registry::JobRegistry;

/// 一次索引同步的写入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub removed: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.removed == 0
    }
}

/// 单次tick的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// 没有到期任务
    Idle,
    /// 本实例取得并投递了该任务
    Dispatched(String),
    /// 其他实例先删除了索引项
    LostRace(String),
    /// 索引项对应的任务已不在任务表中，已清除
    Stale(String),
}

/// 周期任务调度器
///
/// 多个实例可以共享同一个 [`JobStore`]；到期项通过原子的条件删除认领，
/// 认领成功的实例拥有本轮投递，因此每个周期最多投递一次。
pub struct JobScheduler {
    registry: Arc<JobRegistry>,
    store: Arc<dyn JobStore>,
    task_queue: Arc<dyn TaskQueue>,
    config: DispatcherConfig,
    metrics: Arc<MetricsCollector>,
}

impl JobScheduler {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<dyn JobStore>,
        task_queue: Arc<dyn TaskQueue>,
        config: DispatcherConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            store,
            task_queue,
            config,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// 让下次运行索引与任务表一致
    ///
    /// 缺失的任务插入 `now` 之后的第一次触发时间，多余的索引项删除。
    /// 已存在的索引项保持不变，重复调用不会产生写入。
    pub async fn sync_next_index(&self, now: DateTime<Utc>) -> SchedulerResult<SyncReport> {
        let jobs = self.registry.snapshot().await;
        let entries = self.store.next_run_entries().await?;
        let mut report = SyncReport::default();

        for (id, job) in jobs.iter() {
            if entries.contains_key(id) {
                continue;
            }
            // 单个任务算不出触发时间时跳过它，不影响其他任务入索引
            let next_run = match job.next_run_after(now) {
                Ok(next_run) => next_run,
                Err(e) => {
                    StructuredLogger::log_job_rejected(id, &e.to_string());
                    continue;
                }
            };
            self.store.set_next_run(id, to_score(next_run)).await?;
            debug!(job_id = %id, next_run = %next_run, "索引中插入任务");
            report.inserted += 1;
        }

        let known: HashSet<&String> = jobs.keys().collect();
        for id in entries.keys().filter(|id| !known.contains(id)) {
            if self.store.remove_next_run(id).await? {
                debug!(job_id = %id, "从索引中移除过期项");
                report.removed += 1;
            }
        }

        self.metrics.record_sync(report.inserted, report.removed);
        Ok(report)
    }

    /// 重新加载任务表并同步索引
    pub async fn reload(&self, reason: &str) -> SchedulerResult<SyncReport> {
        let job_count = self.registry.reload().await?;
        let report = self.sync_next_index(Utc::now()).await?;

        self.metrics.record_reload(job_count);
        StructuredLogger::log_reload(reason, job_count, report.inserted, report.removed);
        Ok(report)
    }

    pub async fn tick(&self) -> SchedulerResult<TickOutcome> {
        self.tick_at(Utc::now()).await
    }

    /// 取出最早到期的任务并投递，然后按 `now` 重新计算下次运行时间
    pub async fn tick_at(&self, now: DateTime<Utc>) -> SchedulerResult<TickOutcome> {
        let Some((id, score)) = self.store.earliest_due(to_score(now)).await? else {
            return Ok(TickOutcome::Idle);
        };

        let Some(job) = self.registry.get(&id).await else {
            self.store.remove_next_run(&id).await?;
            warn!(job_id = %id, "索引项没有对应的任务定义，已清除");
            return Ok(TickOutcome::Stale(id));
        };

        self.dispatch(job, score, now)
            .instrument(job_span(&id))
            .await
    }

    async fn dispatch(
        &self,
        job: JobSpec,
        score: f64,
        now: DateTime<Utc>,
    ) -> SchedulerResult<TickOutcome> {
        if !self.store.claim_next_run(&job.id, score).await? {
            debug!("任务已被其他实例取得");
            self.metrics.record_lost_race();
            return Ok(TickOutcome::LostRace(job.id));
        }

        // 本次到期的触发照常投递；算不出下次时间的任务不再入索引
        let next_run = match job.next_run_after(now) {
            Ok(next_run) => {
                self.store.set_next_run(&job.id, to_score(next_run)).await?;
                Some(next_run)
            }
            Err(e) => {
                StructuredLogger::log_job_rejected(&job.id, &e.to_string());
                None
            }
        };

        let message = TaskExecutionMessage::from_job(&job);
        self.task_queue.push(&job.queue_name, &message).await?;

        debug!(scheduled_for = %from_score(score), "到期任务已取出");
        StructuredLogger::log_job_dispatched(&job.id, &job.queue_name, &job.func_path, next_run);
        self.metrics.record_job_dispatched(&job.queue_name);
        Ok(TickOutcome::Dispatched(job.id))
    }

    /// 连续tick直到没有到期任务，返回投递数量
    pub async fn tick_until_idle(&self, now: DateTime<Utc>) -> SchedulerResult<usize> {
        let mut dispatched = 0;
        loop {
            match self.tick_at(now).await? {
                TickOutcome::Idle => return Ok(dispatched),
                TickOutcome::Dispatched(_) => dispatched += 1,
                TickOutcome::LostRace(_) | TickOutcome::Stale(_) => {}
            }
        }
    }

    /// 调度主循环，直到收到关闭信号
    ///
    /// 存储不可用只会记录日志，下一轮继续尝试。
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SchedulerResult<()> {
        info!("调度器启动");

        if let Err(e) = self.reload("startup").await {
            error!("启动时加载任务表失败: {}", e);
            self.metrics.record_tick_error();
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut resync_interval = (self.config.resync_interval_seconds > 0).then(|| {
            tokio::time::interval_at(
                tokio::time::Instant::now()
                    + Duration::from_secs(self.config.resync_interval_seconds),
                Duration::from_secs(self.config.resync_interval_seconds),
            )
        });

        loop {
            if let Err(e) = self.tick_until_idle(Utc::now()).await {
                error!("调度tick失败: {}", e);
                self.metrics.record_tick_error();
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("调度器收到关闭信号");
                    break;
                }
                _ = tokio::time::sleep(poll_interval) => {}
                _ = async {
                    match resync_interval.as_mut() {
                        Some(interval) => { interval.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if let Err(e) = self.reload("periodic resync").await {
                        warn!("周期性重同步失败: {}", e);
                        self.metrics.record_tick_error();
                    }
                }
            }
        }

        info!("调度器已停止");
        Ok(())
    }
}
