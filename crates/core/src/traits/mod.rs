pub mod core_client;
pub mod domain_sink;
pub mod job_store;
pub mod message_queue;
pub mod reload_channel;
pub mod repository;
pub mod result_reporter;
pub mod task_executor;

pub use core_client::*;
pub use domain_sink::*;
pub use job_store::*;
pub use message_queue::*;
pub use reload_channel::*;
pub use repository::*;
pub use result_reporter::*;
pub use task_executor::*;
