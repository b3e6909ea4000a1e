use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::SchedulerResult;

/// 热重载广播通道
///
/// 任何生产者（Core或持有任务的进程）在任务相关配置变化时发布一条简短的
/// 文本原因；任意数量的调度器实例订阅该通道，收到后完整重建内存中的任务表。
/// 消息内容只用于日志。
#[async_trait]
pub trait ReloadChannel: Send + Sync {
    /// 发布重载信号（fire-and-forget）
    async fn publish(&self, reason: &str) -> SchedulerResult<()>;

    /// 订阅重载信号，流结束表示订阅已断开
    async fn subscribe(&self) -> SchedulerResult<BoxStream<'static, String>>;
}
