pub mod sqlite_task_result_repository;

pub use sqlite_task_result_repository::SqliteTaskResultRepository;
