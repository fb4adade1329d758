//! HTTP client for the external step-executor service.
//!
//! One POST per submission or confirmation answer; the executor responds
//! with the discriminated envelope. Calls carry an explicit timeout so a
//! hung executor surfaces as `ExecutorError::Timeout` instead of leaving
//! the simulator waiting indefinitely.

use std::time::Duration;

use tracing::debug;

use formflow_core::executor::StepExecutor;
use formflow_types::error::ExecutorError;
use formflow_types::executor::{ExecuteRequest, ExecuteResponse};

/// Default timeout for one executor call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP-backed implementation of `StepExecutor`.
pub struct HttpStepExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStepExecutor {
    /// Build a client for the given executor endpoint.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::Request(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// `new` with the default timeout.
    pub fn with_default_timeout(endpoint: &str) -> Result<Self, ExecutorError> {
        Self::new(endpoint, DEFAULT_TIMEOUT)
    }
}

impl StepExecutor for HttpStepExecutor {
    async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ExecutorError> {
        debug!(button = %request.button_id, endpoint = %self.endpoint, "dispatching execute request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutorError::Timeout
                } else {
                    ExecutorError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Request(format!(
                "executor returned {status}: {body}"
            )));
        }

        response
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| ExecutorError::Envelope(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_default_timeout() {
        let executor = HttpStepExecutor::with_default_timeout("http://localhost:8090/execute");
        assert!(executor.is_ok());
    }
}
