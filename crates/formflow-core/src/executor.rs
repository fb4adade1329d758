//! Boundary to the external step executor.
//!
//! The executor performs the actual side effects (HTTP calls, emails, file
//! transfers) for a submitted page and answers with a discriminated envelope.
//! The simulator only ever talks to this trait; `formflow-infra` provides the
//! HTTP-backed implementation and tests provide scripted ones.

use formflow_types::error::ExecutorError;
use formflow_types::executor::{ExecuteRequest, ExecuteResponse};

/// Executes workflow steps out of process.
pub trait StepExecutor: Send + Sync {
    fn execute(
        &self,
        request: ExecuteRequest,
    ) -> impl std::future::Future<Output = Result<ExecuteResponse, ExecutorError>> + Send;
}
