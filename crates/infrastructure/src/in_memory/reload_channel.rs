use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use scheduler_core::{traits::ReloadChannel, SchedulerResult};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;

/// 进程内重载通道（tokio broadcast）
#[derive(Debug, Clone)]
pub struct InMemoryReloadChannel {
    sender: broadcast::Sender<String>,
}

impl Default for InMemoryReloadChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryReloadChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

#[async_trait]
impl ReloadChannel for InMemoryReloadChannel {
    async fn publish(&self, reason: &str) -> SchedulerResult<()> {
        // 没有订阅者时发送失败，对fire-and-forget语义无影响
        let receivers = self.sender.send(reason.to_string()).unwrap_or(0);
        debug!(receivers, "已发布重载信号: {}", reason);
        Ok(())
    }

    async fn subscribe(&self) -> SchedulerResult<BoxStream<'static, String>> {
        let receiver = self.sender.subscribe();
        let stream = stream::unfold(receiver, |mut receiver| async move {
            match receiver.recv().await {
                Ok(reason) => Some((reason, receiver)),
                // 落后的订阅者只需要知道"有变化"，合并为一次重载
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "重载订阅落后，合并为一次重载");
                    Some(("lagged".to_string(), receiver))
                }
                Err(RecvError::Closed) => None,
            }
        });
        Ok(stream.boxed())
    }
}
