//! Shared error enums.
//!
//! Crate-local error types (config validation, simulator failures) live next
//! to their modules in `formflow-core`; this module holds the errors that
//! cross crate boundaries.

use thiserror::Error;

/// Errors from repository operations (trait definitions live in
/// `formflow-core`, implementations in `formflow-infra`).
///
/// A repository error during a mutation triggers a rollback of the in-memory
/// state to its pre-mutation snapshot; callers must not assume the write
/// succeeded.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the external step-executor boundary.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor request failed: {0}")]
    Request(String),

    #[error("executor returned malformed envelope: {0}")]
    Envelope(String),

    #[error("executor call timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("no such table: workflow_steps".to_string());
        assert_eq!(err.to_string(), "query error: no such table: workflow_steps");
    }

    #[test]
    fn test_executor_error_display() {
        assert_eq!(
            ExecutorError::Timeout.to_string(),
            "executor call timed out"
        );
        let err = ExecutorError::Envelope("missing status".to_string());
        assert!(err.to_string().contains("missing status"));
    }
}
