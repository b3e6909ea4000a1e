use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use scheduler_core::{traits::ReloadChannel, SchedulerResult};

use crate::scheduler::{JobScheduler, SyncReport};

/// 重载信号监听器
///
/// 在独立的tokio任务中运行，不阻塞tick循环。订阅失败时按固定间隔重试，
/// 订阅流结束时重新订阅；每次（重新）订阅成功后先做一次全量同步，
/// 补上断开期间错过的变化。
pub struct ReloadListener {
    channel: Arc<dyn ReloadChannel>,
    scheduler: Arc<JobScheduler>,
    retry_delay: Duration,
}

impl ReloadListener {
    pub fn new(
        channel: Arc<dyn ReloadChannel>,
        scheduler: Arc<JobScheduler>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            channel,
            scheduler,
            retry_delay,
        }
    }

    /// 处理一条重载信号：整表替换并同步索引
    ///
    /// 重复信号是幂等的，第二次同步不会产生写入。
    pub async fn handle_signal(&self, reason: &str) -> SchedulerResult<SyncReport> {
        info!("收到重载信号: {}", reason);
        self.scheduler.reload(reason).await
    }

    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> SchedulerResult<()> {
        info!("重载监听器启动");

        loop {
            let mut stream = tokio::select! {
                _ = shutdown_rx.recv() => break,
                subscription = self.channel.subscribe() => match subscription {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!("订阅重载通道失败: {}，{}秒后重试", e, self.retry_delay.as_secs());
                        tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            _ = tokio::time::sleep(self.retry_delay) => continue,
                        }
                    }
                },
            };

            if let Err(e) = self.handle_signal("subscribed").await {
                error!("订阅后同步失败: {}", e);
            }

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("重载监听器已停止");
                        return Ok(());
                    }
                    signal = stream.next() => match signal {
                        Some(reason) => {
                            if let Err(e) = self.handle_signal(&reason).await {
                                error!("处理重载信号失败: {}", e);
                            }
                        }
                        None => {
                            warn!("重载订阅已断开，准备重新订阅");
                            break;
                        }
                    },
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        info!("重载监听器已停止");
        Ok(())
    }
}
