pub mod run_key;
pub mod sqlite;

pub use run_key::run_key;
pub use sqlite::SqliteTaskResultRepository;
