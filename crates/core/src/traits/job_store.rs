use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::SchedulerResult;

/// 持久化的任务注册表与下次运行索引
///
/// 注册表保存 `job id -> 原始任务定义`，索引保存 `job id -> 下次触发时间`
/// （Unix秒）。多个调度器实例共享同一个存储，是唯一的事实来源。
///
/// # 并发语义
///
/// `claim_next_run` 必须是原子的"分值未变则删除"操作：返回 `true` 的实例
/// 获得该次触发的交接权，其他实例观察到条目已不存在（或已被重新调度）
/// 并跳过。只比较ID不够，胜出的实例会立即写回下一次的时间。
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 读取注册表中全部原始任务定义（未规范化）
    async fn load_definitions(&self) -> SchedulerResult<Vec<(String, Value)>>;

    /// 写入（覆盖）一条原始任务定义
    async fn put_definition(&self, id: &str, raw: &Value) -> SchedulerResult<()>;

    /// 删除任务定义，返回是否存在
    async fn delete_definition(&self, id: &str) -> SchedulerResult<bool>;

    /// 读取完整的下次运行索引
    async fn next_run_entries(&self) -> SchedulerResult<HashMap<String, f64>>;

    /// 设置任务的下次运行时间
    async fn set_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<()>;

    /// 原子地删除索引条目，返回本次调用是否真正删除了它
    async fn remove_next_run(&self, id: &str) -> SchedulerResult<bool>;

    /// 仅当条目的分值仍等于 `timestamp` 时原子地删除它
    async fn claim_next_run(&self, id: &str, timestamp: f64) -> SchedulerResult<bool>;

    /// 查找下次运行时间最早且不晚于 `now` 的条目
    async fn earliest_due(&self, now: f64) -> SchedulerResult<Option<(String, f64)>>;
}
