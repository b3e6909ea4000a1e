use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::AsyncCommands;
use scheduler_core::{traits::ReloadChannel, SchedulerResult};
use tracing::{debug, warn};

use super::RedisConnection;

/// 基于Redis pub/sub的重载通道
pub struct RedisReloadChannel {
    connection: RedisConnection,
    channel: String,
}

impl RedisReloadChannel {
    pub fn new(connection: RedisConnection) -> Self {
        let channel = connection.config().reload_channel();
        Self {
            connection,
            channel,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl ReloadChannel for RedisReloadChannel {
    async fn publish(&self, reason: &str) -> SchedulerResult<()> {
        let mut conn = self.connection.manager();
        let receivers: i64 = conn.publish(&self.channel, reason).await?;
        debug!(channel = %self.channel, receivers, "已发布重载信号: {}", reason);
        Ok(())
    }

    async fn subscribe(&self) -> SchedulerResult<BoxStream<'static, String>> {
        let mut pubsub = self.connection.pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        debug!(channel = %self.channel, "已订阅重载通道");

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(reason) => Some(reason),
                Err(e) => {
                    warn!("无法解析重载信号内容: {}", e);
                    Some(String::new())
                }
            }
        });
        Ok(stream.boxed())
    }
}
