//! SQLite persistence.

pub mod pool;
pub mod step;

pub use pool::{default_database_url, DatabasePool};
pub use step::SqliteStepRepository;
