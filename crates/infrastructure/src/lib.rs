pub mod core_client;
pub mod database;
pub mod in_memory;
pub mod observability;
pub mod redis;

pub use core_client::HttpCoreClient;
pub use database::SqliteTaskResultRepository;
pub use in_memory::{
    InMemoryJobStore, InMemoryReloadChannel, InMemoryTaskQueue, InMemoryTaskResultRepository,
};
pub use observability::{MetricsCollector, StructuredLogger};
pub use self::redis::{RedisConnection, RedisJobStore, RedisReloadChannel, RedisTaskQueue};
