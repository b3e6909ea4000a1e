pub mod config;
pub mod errors;
pub mod health;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use health::{classify, classify_with_floor, HealthLabel, Severity, TaskHealth};
pub use logging::init_logging;

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
