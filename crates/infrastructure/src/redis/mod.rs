//! Redis实现：任务注册表、下次运行索引、重载通道和任务队列

pub mod connection;
pub mod job_store;
pub mod reload_channel;
pub mod task_queue;

pub use connection::RedisConnection;
pub use job_store::RedisJobStore;
pub use reload_channel::RedisReloadChannel;
pub use task_queue::RedisTaskQueue;
