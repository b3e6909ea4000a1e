//! Dispatcher
//!
//! 周期任务的注册表、调度循环、重载监听以及结果接收路由。

pub mod job_registry;
pub mod reload_listener;
pub mod result_ingestion;
pub mod scheduler;

pub use job_registry::{normalize_spec, JobRegistry, JobRegistryWriter};
pub use reload_listener::ReloadListener;
pub use result_ingestion::{ResultIngestion, RouteAction};
pub use scheduler::{JobScheduler, SyncReport, TickOutcome};
