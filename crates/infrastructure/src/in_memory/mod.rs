//! 内存实现，用于嵌入式运行和测试

pub mod job_store;
pub mod reload_channel;
pub mod task_queue;
pub mod task_result_repository;

pub use job_store::InMemoryJobStore;
pub use reload_channel::InMemoryReloadChannel;
pub use task_queue::InMemoryTaskQueue;
pub use task_result_repository::InMemoryTaskResultRepository;
