use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP请求错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{kind} 未找到: {id}")]
    NotFound { kind: String, id: String },

    #[error("未实现的类型: {kind} '{type_name}'")]
    NotImplemented { kind: String, type_name: String },

    /// 领域层判定无需执行（例如源自上次采集以来未变化）
    #[error("{0}")]
    SoftSkip(String),

    #[error("任务执行超时: {seconds}秒")]
    ExecutionTimeout { seconds: u64 },

    #[error("无效的任务定义: {0}")]
    InvalidJobSpec(String),

    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn not_implemented(kind: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::NotImplemented {
            kind: kind.into(),
            type_name: type_name.into(),
        }
    }

    /// 永久性前置条件失败，不应重试
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::NotImplemented { .. }
                | Self::InvalidTaskParams(_)
                | Self::InvalidJobSpec(_)
        )
    }

    pub fn is_soft_skip(&self) -> bool {
        matches!(self, Self::SoftSkip(_))
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SchedulerError>;
