//! 任务处理器接口定义
//!
//! 此模块定义了任务执行阶段的核心抽象：
//! - 任务处理器接口 [`TaskHandler`]
//! - 执行上下文 [`TaskContext`]
//!
//! ## 核心概念
//!
//! ### TaskHandler
//! 处理器是实际执行任务的组件。每个处理器属于一种任务类型（bot、collector、
//! connector、presenter、publisher、word list），并以Core返回配置中的
//! `type` 字段作为注册名，例如 `rss_collector`、`wordlist_bot`。
//!
//! ### 执行结果
//! 处理器返回任意JSON作为结果载荷；返回 [`SchedulerError::SoftSkip`]
//! 表示"无需执行"，流程会把它报告为成功并附带说明文本。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use scheduler_core::traits::{TaskContext, TaskHandler};
//! use scheduler_core::{models::TaskKind, SchedulerResult};
//! use serde_json::{json, Value};
//!
//! pub struct EchoPresenter;
//!
//! #[async_trait]
//! impl TaskHandler for EchoPresenter {
//!     fn name(&self) -> &str {
//!         "echo_presenter"
//!     }
//!
//!     fn kind(&self) -> TaskKind {
//!         TaskKind::Presenter
//!     }
//!
//!     async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value> {
//!         Ok(json!({ "product_id": context.request.config_id() }))
//!     }
//! }
//! ```
//!
//! [`SchedulerError::SoftSkip`]: crate::SchedulerError::SoftSkip

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    models::{TaskKind, TaskRequest},
    SchedulerResult,
};

/// 任务执行上下文
///
/// # 字段说明
///
/// * `task_id` - 带种类前缀的结果关联ID
/// * `run_id` - 本次执行（含所有重试）的唯一ID
/// * `request` - 类型化的任务请求
/// * `config` - 从Core解析到的配置实体
/// * `attempt` - 当前尝试次数，从1开始
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub run_id: String,
    pub request: TaskRequest,
    pub config: Value,
    pub attempt: u32,
}

impl TaskContext {
    /// 读取配置中的字符串字段
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// 读取配置 `parameters` 对象中的字段
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.config.get("parameters").and_then(|p| p.get(key))
    }
}

/// 任务处理器核心接口
///
/// 实现者必须是 `Send + Sync`，一个处理器实例会被多个并发任务共享，
/// 不应持有跨任务的可变状态。
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// 注册名，对应配置中的 `type` 字段
    fn name(&self) -> &str;

    /// 处理器所属的任务种类
    fn kind(&self) -> TaskKind;

    /// 执行任务，返回结果载荷
    async fn execute(&self, context: &TaskContext) -> SchedulerResult<Value>;
}
