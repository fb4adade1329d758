//! SQLite connection management.
//!
//! Workflow editing is read-heavy: the canvas and step list refetch far more
//! often than they write. `DatabasePool` therefore keeps two pools over the
//! same database file: several read-only connections for queries and exactly
//! one writable connection, which serializes mutations without busy-loop
//! retries. WAL mode lets the readers proceed while a write is in flight.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const READER_CONNECTIONS: u32 = 8;

/// Reader/writer pool pair for one SQLite database.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if missing) the database at `database_url`, run
    /// pending migrations on the writer, then open the reader pool.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(base_opts.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

/// Database URL used when the config file does not name one:
/// `$FORMFLOW_DATA_DIR/formflow.db`, defaulting to `~/.formflow/formflow.db`.
pub fn default_database_url() -> String {
    let data_dir = std::env::var("FORMFLOW_DATA_DIR").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}/.formflow")
    });
    format!("sqlite://{data_dir}/formflow.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_pool(dir: &tempfile::TempDir) -> DatabasePool {
        let db_path = dir.path().join("pool.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_migrations_create_workflow_tables() {
        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;

        for table in ["workflow_steps", "workflow_nodes", "workflow_edges"] {
            let found: Option<(String,)> =
                sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_optional(&pool.reader)
                    .await
                    .unwrap();
            assert!(found.is_some(), "{table} missing after migration");
        }
    }

    #[tokio::test]
    async fn test_pool_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;

        let (journal_mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");

        let (foreign_keys,): (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool.writer)
            .await
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn test_reader_pool_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = temp_pool(&dir).await;

        let result = sqlx::query("DELETE FROM workflow_steps")
            .execute(&pool.reader)
            .await;
        assert!(result.is_err(), "reader connections must be read-only");
    }

    #[test]
    fn test_default_database_url_shape() {
        let url = default_database_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("/formflow.db"));
    }
}
