use std::time::Duration;

use async_trait::async_trait;

use crate::{models::TaskExecutionMessage, SchedulerResult};

/// 任务队列抽象接口
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 推送任务执行消息到指定队列
    async fn push(&self, queue: &str, message: &TaskExecutionMessage) -> SchedulerResult<()>;

    /// 从指定队列取出一条消息，最多等待 `wait`
    async fn pop(
        &self,
        queue: &str,
        wait: Duration,
    ) -> SchedulerResult<Option<TaskExecutionMessage>>;

    /// 获取队列中的消息数量
    async fn len(&self, queue: &str) -> SchedulerResult<u64>;
}
