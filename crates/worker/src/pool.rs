//! 有界Worker池
//!
//! 每个队列一个消费循环，所有循环共享一个信号量。每条取出的消息在拿到
//! 许可后才开始执行，因此同时执行的任务数不会超过 `max_concurrent_tasks`，
//! 每个消费循环最多持有一条等待许可的消息。

use std::sync::Arc;
use std::time::Duration;

use scheduler_core::{config::WorkerConfig, traits::TaskQueue, SchedulerResult};
use scheduler_infrastructure::MetricsCollector;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::flow::TaskFlow;

const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct WorkerPool {
    worker_id: String,
    queues: Vec<String>,
    max_concurrent_tasks: usize,
    poll_timeout: Duration,
    queue: Arc<dyn TaskQueue>,
    flow: Arc<TaskFlow>,
    permits: Arc<Semaphore>,
    metrics: Arc<MetricsCollector>,
}

impl WorkerPool {
    pub fn new(
        config: &WorkerConfig,
        queue: Arc<dyn TaskQueue>,
        flow: Arc<TaskFlow>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let max_concurrent_tasks = config.max_concurrent_tasks.max(1);
        Self {
            worker_id: config.worker_id.clone(),
            queues: config.queues.clone(),
            max_concurrent_tasks,
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds.max(1)),
            queue,
            flow,
            permits: Arc::new(Semaphore::new(max_concurrent_tasks)),
            metrics,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrent_tasks - self.permits.available_permits()
    }

    /// 运行到收到关闭信号，然后等待执行中的任务结束
    pub async fn run(self: Arc<Self>, shutdown_rx: broadcast::Receiver<()>) -> SchedulerResult<()> {
        info!(
            worker_id = %self.worker_id,
            queues = ?self.queues,
            max_concurrent_tasks = self.max_concurrent_tasks,
            "Worker池启动"
        );

        let mut consumers = JoinSet::new();
        for queue_name in self.queues.clone() {
            let pool = Arc::clone(&self);
            let shutdown_rx = shutdown_rx.resubscribe();
            consumers.spawn(async move { pool.consume(queue_name, shutdown_rx).await });
        }
        while let Some(joined) = consumers.join_next().await {
            if let Err(e) = joined {
                error!("队列消费循环异常退出: {}", e);
            }
        }

        // 所有许可归还即表示执行中的任务都已结束
        let in_flight = self.in_flight();
        if in_flight > 0 {
            info!("等待 {} 个执行中的任务结束", in_flight);
        }
        let _drained = self
            .permits
            .acquire_many(self.max_concurrent_tasks as u32)
            .await;

        info!(worker_id = %self.worker_id, "Worker池已停止");
        Ok(())
    }

    async fn consume(&self, queue_name: String, mut shutdown_rx: broadcast::Receiver<()>) {
        debug!(queue = %queue_name, "开始消费队列");

        loop {
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            let message = match self.queue.pop(&queue_name, self.poll_timeout).await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    error!(queue = %queue_name, "读取队列失败: {}", e);
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => continue,
                    }
                }
            };

            // 已取出的消息一定会执行，等待许可时不响应关闭信号
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };

            let flow = Arc::clone(&self.flow);
            let permits = Arc::clone(&self.permits);
            let metrics = Arc::clone(&self.metrics);
            let max = self.max_concurrent_tasks;
            metrics.set_in_flight(max - permits.available_permits());

            tokio::spawn(async move {
                flow.run(&message).await;
                drop(permit);
                metrics.set_in_flight(max - permits.available_permits());
            });
        }

        debug!(queue = %queue_name, "停止消费队列");
    }
}
