//! 调度器配置
//!
//! 配置按以下顺序合并，后者覆盖前者：
//!
//! 1. 内置默认值（[`AppConfig::default`]）
//! 2. TOML配置文件（`--config` 指定，或依次查找 `config/scheduler.toml`、
//!    `scheduler.toml`、`/etc/scheduler/config.toml`）
//! 3. 以 `SCHEDULER_` 为前缀、`__` 为层级分隔符的环境变量
//!
//! ```toml
//! [redis]
//! url = "redis://127.0.0.1:6379/0"
//!
//! [worker]
//! queues = ["bots", "collectors"]
//! max_concurrent_tasks = 4
//! ```

pub mod models;

pub use models::{
    ApiConfig, AppConfig, CoreConfig, DatabaseConfig, DispatcherConfig, ObservabilityConfig,
    RedisConfig, WorkerConfig,
};
