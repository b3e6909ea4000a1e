use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use scheduler_core::{models::TaskExecutionMessage, traits::TaskQueue, SchedulerResult};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::RedisConnection;

/// 空闲的阻塞连接
///
/// 每个进行中的BRPOP独占一个连接，结束后归还复用；出错的连接不归还。
struct IdleConnections<C> {
    idle: Mutex<Vec<C>>,
}

impl<C> IdleConnections<C> {
    fn new() -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
        }
    }

    async fn take(&self) -> Option<C> {
        self.idle.lock().await.pop()
    }

    async fn put_back(&self, connection: C) {
        self.idle.lock().await.push(connection);
    }
}

/// Redis list任务队列，LPUSH入队，BRPOP出队（先进先出）
pub struct RedisTaskQueue {
    connection: RedisConnection,
    blocking: IdleConnections<MultiplexedConnection>,
}

impl RedisTaskQueue {
    pub fn new(connection: RedisConnection) -> Self {
        Self {
            connection,
            blocking: IdleConnections::new(),
        }
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn push(&self, queue: &str, message: &TaskExecutionMessage) -> SchedulerResult<()> {
        let key = self.connection.config().queue_key(queue);
        let payload = message.to_json()?;
        let mut conn = self.connection.manager();
        let _: i64 = conn.lpush(&key, payload).await?;
        debug!(queue, message_id = %message.message_id, "消息已入队");
        Ok(())
    }

    async fn pop(
        &self,
        queue: &str,
        wait: Duration,
    ) -> SchedulerResult<Option<TaskExecutionMessage>> {
        let key = self.connection.config().queue_key(queue);
        let mut conn = match self.blocking.take().await {
            Some(conn) => conn,
            None => self.connection.dedicated().await?,
        };
        let popped: Option<(String, String)> = conn.brpop(&key, wait.as_secs_f64()).await?;
        self.blocking.put_back(conn).await;

        match popped {
            Some((_, payload)) => match TaskExecutionMessage::from_json(&payload) {
                Ok(message) => Ok(Some(message)),
                Err(e) => {
                    warn!(queue, "丢弃无法解析的队列消息: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn len(&self, queue: &str) -> SchedulerResult<u64> {
        let key = self.connection.config().queue_key(queue);
        let mut conn = self.connection.manager();
        Ok(conn.llen(&key).await?)
    }
}
