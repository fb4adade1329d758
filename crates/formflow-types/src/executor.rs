//! Wire contract of the external step-executor service.
//!
//! The engine never performs outbound side effects itself: resolved steps are
//! handed to an executor service that runs HTTP calls, emails, and file
//! transfers, and reports back with a discriminated response envelope. Exactly
//! one branch of the envelope is populated per response:
//!
//! - `requires_confirmation` + `confirmation_data` -- pause for a yes/no answer
//! - `exit_data` -- terminal exit state
//! - `next_group_node` -- jump to another input group
//! - none of the above -- terminal success/failure with per-step `results`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Request sent to the step executor for one submission or confirmation answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// The workflow being executed (historically the trigger button's id).
    pub button_id: Uuid,
    /// Form data and array data merged into one parameter map.
    pub execute_parameters: serde_json::Map<String, Value>,
    pub user_id: String,
    /// The group node the user submitted from (graph-model runs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_group_node_id: Option<String>,
    /// Accumulated context from earlier in the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_context_data: Option<Value>,
    /// The user's yes/no answer when resuming a pending confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_confirmation_response: Option<bool>,
    /// Context captured when the confirmation was raised; echoed back verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_context_data: Option<Value>,
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Discriminated response envelope from the step executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecuteResponse {
    pub requires_confirmation: Option<bool>,
    pub confirmation_data: Option<ConfirmationData>,
    /// Context to echo back with the confirmation answer.
    pub pending_context_data: Option<Value>,
    pub exit_data: Option<ExitData>,
    pub next_group_node: Option<NextGroupNode>,
    /// Context produced by the executed steps, merged into the run context.
    pub context_data: Option<Value>,
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<StepResult>,
    pub error: Option<String>,
}

impl ExecuteResponse {
    /// True when the envelope asks the user for a confirmation.
    pub fn wants_confirmation(&self) -> bool {
        self.requires_confirmation.unwrap_or(false) && self.confirmation_data.is_some()
    }
}

/// Confirmation prompt raised by a `user_confirmation` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationData {
    pub prompt_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes_button_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_button_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_location_map: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Terminal exit state raised by an `exit` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitData {
    pub exit_message: String,
    #[serde(default)]
    pub show_restart_button: bool,
}

/// Jump target: the run continues at the page containing this group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextGroupNode {
    pub group_id: String,
}

// ---------------------------------------------------------------------------
// Per-step results
// ---------------------------------------------------------------------------

/// Outcome of one executed step within a terminal response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Step name or node id. Older executors send this as `node`.
    #[serde(alias = "node")]
    pub step: String,
    pub status: StepResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
}

/// Per-step outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResultStatus {
    Completed,
    Failed,
    Skipped,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
