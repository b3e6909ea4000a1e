pub mod api_observability;
pub mod app_config;
pub mod core_service;
pub mod database;
pub mod dispatcher_worker;
pub mod redis;

// Re-export main types for easier imports
pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use core_service::CoreConfig;
pub use database::DatabaseConfig;
pub use dispatcher_worker::{DispatcherConfig, WorkerConfig};
pub use redis::RedisConfig;
