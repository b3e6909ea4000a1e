use std::time::Duration;

use redis::aio::{ConnectionManager, MultiplexedConnection, PubSub};
use redis::Client;
use scheduler_core::{config::RedisConfig, errors::SchedulerError, SchedulerResult};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Redis连接
///
/// 普通命令共用一个自动重连的 [`ConnectionManager`]；阻塞命令（BRPOP）和
/// 订阅使用独立连接，避免阻塞共享连接。
#[derive(Clone)]
pub struct RedisConnection {
    client: Client,
    manager: ConnectionManager,
    config: RedisConfig,
}

impl RedisConnection {
    pub async fn connect(config: RedisConfig) -> SchedulerResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            SchedulerError::Configuration(format!("创建Redis客户端失败: {e}"))
        })?;

        let manager = Self::connect_with_retry(&client, &config).await?;
        debug!("已连接Redis: {}", config.url);

        Ok(Self {
            client,
            manager,
            config,
        })
    }

    async fn connect_with_retry(
        client: &Client,
        config: &RedisConfig,
    ) -> SchedulerResult<ConnectionManager> {
        let mut last_error = None;

        for attempt in 1..=config.max_retry_attempts {
            match ConnectionManager::new(client.clone()).await {
                Ok(manager) => {
                    if attempt > 1 {
                        debug!("第{}次尝试连接Redis成功", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < config.max_retry_attempts {
                        warn!(
                            "连接Redis失败 (尝试 {}/{}): {}，{}秒后重试",
                            attempt, config.max_retry_attempts, e, config.retry_delay_seconds
                        );
                        sleep(Duration::from_secs(config.retry_delay_seconds)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let error_msg = format!(
            "连接Redis失败，已尝试{}次: {}",
            config.max_retry_attempts,
            last_error.map_or("Unknown".to_string(), |e| e.to_string())
        );
        error!("{}", error_msg);
        Err(SchedulerError::MessageQueue(error_msg))
    }

    /// 共享的自动重连连接
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// 新建一个供阻塞命令独占的连接
    pub async fn dedicated(&self) -> SchedulerResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    pub async fn pubsub(&self) -> SchedulerResult<PubSub> {
        Ok(self.client.get_async_pubsub().await?)
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    pub async fn health_check(&self) -> bool {
        let mut conn = self.manager();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(response) if response == "PONG" => true,
            Ok(response) => {
                warn!("Redis PING返回异常: {}", response);
                false
            }
            Err(e) => {
                warn!("Redis健康检查失败: {}", e);
                false
            }
        }
    }
}
