use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    models::{ResultReport, TaskResult, TaskRunStatistics},
    SchedulerResult,
};

/// upsert的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// 任务结果仓储
///
/// 以 `task_id` 为唯一键。重复投递同一 `(task_id, status, result)` 不会产生
/// 第二条记录，也不会重复计入运行历史。
#[async_trait]
pub trait TaskResultRepository: Send + Sync {
    /// 按task_id插入或原地更新
    async fn upsert(&self, report: &ResultReport) -> SchedulerResult<UpsertOutcome>;

    /// 按task_id查询
    async fn get(&self, task_id: &str) -> SchedulerResult<Option<TaskResult>>;

    /// 该task_id的历史运行统计
    async fn statistics(&self, task_id: &str) -> SchedulerResult<TaskRunStatistics>;

    /// 记录总数
    async fn count(&self) -> SchedulerResult<u64>;
}
