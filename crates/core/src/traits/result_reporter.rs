use async_trait::async_trait;

use crate::{
    models::{ResultReport, TaskResult},
    SchedulerResult,
};

/// Worker侧的结果上报接口
#[async_trait]
pub trait ResultReporter: Send + Sync {
    /// 幂等上报（按task_id upsert）
    async fn report(&self, report: &ResultReport) -> SchedulerResult<()>;

    /// 查询任务状态，未知task_id视为PENDING
    async fn query(&self, task_id: &str) -> SchedulerResult<TaskResult>;
}
