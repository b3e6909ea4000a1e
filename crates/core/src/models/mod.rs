//! # 数据模型
//!
//! 调度与执行子系统的核心数据结构。
//!
//! ### JobSpec - 周期任务定义
//! 由Core的领域事件创建/修改/删除，调度器从不自行生成任务定义。
//!
//! ### TaskRequest - 类型化任务请求
//! 每种任务（bot、collector、connector、presenter、publisher、word list）
//! 各自的不可变请求载荷。
//!
//! ### TaskResult / ResultReport - 任务结果
//! 按 `task_id` 幂等更新（upsert）的结果记录。
//!
//! ### TaskExecutionMessage - 队列消息
//! 调度器与Worker之间传递的任务执行消息。

pub mod job;
pub mod message;
pub mod task;

pub use job::{
    from_score, to_score, JobOptions, JobSpec, Trigger, DEFAULT_JOB_INTERVAL_SECONDS,
    MAX_JOB_INTERVAL_SECONDS,
};
pub use message::TaskExecutionMessage;
pub use task::{
    BotTask, CollectorTask, ConnectorTask, PresenterTask, PublisherTask, ResultReport,
    TaskKind, TaskRequest, TaskResult, TaskRunStatistics, TaskStatus, WordListTask,
};
