pub mod flow;
pub mod handlers;
pub mod pool;
pub mod reporter;

pub use flow::{FlowOutcome, FlowSettings, RetryPolicy, TaskFlow};
pub use handlers::{HandlerRegistry, BUILTIN_TYPES};
pub use pool::WorkerPool;
pub use reporter::HttpResultReporter;
