//! Execution-simulation state machine.
//!
//! The simulator pages a user through grouped input steps, validates each
//! page, hands the submission to the external step executor, and reacts to
//! the response envelope: pause on a confirmation, terminate on exit, jump
//! to another group, or finish with per-step results. State transitions go
//! through the immutable `ExecutionContext`, so each one is independently
//! testable.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use formflow_types::error::ExecutorError;
use formflow_types::executor::{
    ConfirmationData, ExecuteRequest, ExecuteResponse, ExitData, StepResult,
};
use formflow_types::graph::{ApplyCondition, BranchHandle, NodePayload};
use formflow_types::group::{FieldType, FormGroup};

use crate::context::ExecutionContext;
use crate::executor::StepExecutor;
use crate::graph::WorkflowGraph;
use crate::resolver::value_to_string;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static pattern"));

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// One rendered page: a run of consecutive groups merged together.
#[derive(Debug, Clone)]
pub struct Page {
    pub groups: Vec<FormGroup>,
}

impl Page {
    pub fn contains_group(&self, group_id: &str) -> bool {
        self.groups.iter().any(|g| g.id == group_id)
    }

    fn first_group_id(&self) -> Option<&str> {
        self.groups.first().map(|g| g.id.as_str())
    }
}

/// Merge consecutive groups into pages: a group joins the previous page
/// while its `display_with_previous` flag is set and it is not the first.
pub fn build_pages(groups: &[FormGroup]) -> Vec<Page> {
    let mut pages: Vec<Page> = Vec::new();
    for group in groups {
        match pages.last_mut() {
            Some(page) if group.display_with_previous => page.groups.push(group.clone()),
            _ => pages.push(Page {
                groups: vec![group.clone()],
            }),
        }
    }
    pages
}

// ---------------------------------------------------------------------------
// Outcomes and errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("no confirmation is pending")]
    NoPendingConfirmation,

    #[error("the run has already terminated")]
    RunFinished,
}

/// What one submission or confirmation answer led to.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Field-level validation errors; the page does not advance.
    Invalid(HashMap<String, String>),
    /// Waiting for a yes/no answer.
    AwaitingConfirmation(ConfirmationData),
    /// Terminal exit state, optionally restartable.
    Exited(ExitData),
    /// Jumped to the page at this index.
    Advanced { page: usize },
    /// Terminal result list; the run is over.
    Finished {
        success: bool,
        results: Vec<StepResult>,
        error: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    data: ConfirmationData,
    /// Echoed back verbatim with the answer.
    context: Option<Value>,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Drives one simulated run of a workflow against a step executor.
pub struct Simulator<E> {
    executor: E,
    button_id: Uuid,
    user_id: String,
    pages: Vec<Page>,
    graph: WorkflowGraph,
    current_page: usize,
    form_data: Map<String, Value>,
    array_data: Map<String, Value>,
    context: ExecutionContext,
    pending: Option<PendingConfirmation>,
    exit_state: Option<ExitData>,
    errors: HashMap<String, String>,
    finished: bool,
}

impl<E: StepExecutor> Simulator<E> {
    pub fn new(
        executor: E,
        button_id: Uuid,
        user_id: &str,
        groups: &[FormGroup],
        graph: WorkflowGraph,
    ) -> Self {
        let pages = build_pages(groups);
        let mut simulator = Self {
            executor,
            button_id,
            user_id: user_id.to_string(),
            pages,
            graph,
            current_page: 0,
            form_data: Map::new(),
            array_data: Map::new(),
            context: ExecutionContext::new(),
            pending: None,
            exit_state: None,
            errors: HashMap::new(),
            finished: false,
        };
        simulator.apply_defaults(0);
        simulator
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page(&self) -> Option<&Page> {
        self.pages.get(self.current_page)
    }

    pub fn form_data(&self) -> &Map<String, Value> {
        &self.form_data
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn exit_state(&self) -> Option<&ExitData> {
        self.exit_state.as_ref()
    }

    /// The confirmation prompt currently awaiting an answer.
    pub fn pending_confirmation(&self) -> Option<&ConfirmationData> {
        self.pending.as_ref().map(|p| &p.data)
    }

    /// Submit the current page's data.
    pub async fn submit(
        &mut self,
        form_data: Map<String, Value>,
        array_data: Map<String, Value>,
    ) -> Result<SubmitOutcome, SimulatorError> {
        if self.finished || self.exit_state.is_some() {
            return Err(SimulatorError::RunFinished);
        }

        let errors = self.validate_page(&form_data, &array_data);
        if !errors.is_empty() {
            debug!(page = self.current_page, errors = errors.len(), "validation failed");
            self.errors = errors.clone();
            return Ok(SubmitOutcome::Invalid(errors));
        }
        self.errors.clear();
        for (key, value) in form_data {
            self.form_data.insert(key, value);
        }
        for (key, value) in array_data {
            self.array_data.insert(key, value);
        }
        // Submitted fields land in form.* before the executor runs, so step
        // templates can reference this page's input.
        self.context = self
            .context
            .merged(serde_json::json!({ "form": Value::Object(self.form_data.clone()) }));

        let request = self.base_request();
        let response = self.executor.execute(request).await?;
        Ok(self.handle_response(response))
    }

    /// Answer a pending confirmation.
    pub async fn confirm(&mut self, answer: bool) -> Result<SubmitOutcome, SimulatorError> {
        let pending = self
            .pending
            .take()
            .ok_or(SimulatorError::NoPendingConfirmation)?;
        debug!(answer, "answering pending confirmation");

        let mut request = self.base_request();
        request.user_confirmation_response = Some(answer);
        request.pending_context_data = pending.context;
        let response = self.executor.execute(request).await?;
        Ok(self.handle_response(response))
    }

    /// Restart after an exit that offered it: page 0, fresh data, cleared
    /// context.
    pub fn restart(&mut self) {
        info!("restarting simulated run");
        self.current_page = 0;
        self.form_data.clear();
        self.array_data.clear();
        self.context = ExecutionContext::new();
        self.pending = None;
        self.exit_state = None;
        self.errors.clear();
        self.finished = false;
        self.apply_defaults(0);
    }

    // -----------------------------------------------------------------------
    // Envelope handling
    // -----------------------------------------------------------------------

    fn handle_response(&mut self, response: ExecuteResponse) -> SubmitOutcome {
        if response.wants_confirmation() {
            let Some(data) = response.confirmation_data else {
                // wants_confirmation() guarantees presence; fall through to
                // a terminal outcome if an executor violates that.
                return self.finish(response.success, response.results, response.error);
            };
            self.pending = Some(PendingConfirmation {
                data: data.clone(),
                context: response.pending_context_data,
            });
            return SubmitOutcome::AwaitingConfirmation(data);
        }

        if let Some(context_data) = response.context_data {
            self.context = self.context.merged(context_data);
        }

        if let Some(exit) = response.exit_data {
            info!(restartable = exit.show_restart_button, "run exited");
            self.exit_state = Some(exit.clone());
            return SubmitOutcome::Exited(exit);
        }

        if let Some(next) = response.next_group_node {
            let handle = self.context.edge_handle_taken();
            let Some(page) = self
                .pages
                .iter()
                .position(|p| p.contains_group(&next.group_id))
            else {
                debug!(group = %next.group_id, "jump target group not on any page");
                return self.finish(response.success, response.results, response.error);
            };
            debug!(page, ?handle, "advancing to branch target");
            self.current_page = page;
            self.apply_defaults(page);
            self.apply_field_mappings(page, handle);
            return SubmitOutcome::Advanced { page };
        }

        self.finish(response.success, response.results, response.error)
    }

    fn finish(
        &mut self,
        success: Option<bool>,
        results: Vec<StepResult>,
        error: Option<String>,
    ) -> SubmitOutcome {
        self.finished = true;
        let success = success.unwrap_or_else(|| error.is_none());
        info!(success, results = results.len(), "run finished");
        SubmitOutcome::Finished {
            success,
            results,
            error,
        }
    }

    fn base_request(&self) -> ExecuteRequest {
        let mut execute_parameters = self.form_data.clone();
        for (key, value) in &self.array_data {
            execute_parameters.insert(key.clone(), value.clone());
        }
        let current_group_node_id = self
            .pages
            .get(self.current_page)
            .and_then(Page::first_group_id)
            .and_then(|gid| self.graph.node_for_group(gid))
            .map(|n| n.id.clone());
        ExecuteRequest {
            button_id: self.button_id,
            execute_parameters,
            user_id: self.user_id.clone(),
            current_group_node_id,
            existing_context_data: Some(self.context.as_value()),
            user_confirmation_response: None,
            pending_context_data: None,
        }
    }

    // -----------------------------------------------------------------------
    // Page entry: defaults and field mappings
    // -----------------------------------------------------------------------

    /// Set literal field defaults for a page. Templated defaults (containing
    /// `{{`) are skipped; they need the run context and resolve through field
    /// mappings instead.
    fn apply_defaults(&mut self, page: usize) {
        let Some(page) = self.pages.get(page) else {
            return;
        };
        let mut defaults: Vec<(String, String)> = Vec::new();
        for group in &page.groups {
            for field in &group.fields {
                if let Some(default) = &field.default_value {
                    if !default.contains("{{") {
                        defaults.push((field.key.clone(), default.clone()));
                    }
                }
            }
        }
        for (key, value) in defaults {
            self.form_data.insert(key, Value::String(value));
        }
    }

    /// Apply every field mapping for groups on a page, gated on the branch
    /// handle that led here.
    fn apply_field_mappings(&mut self, page: usize, handle: BranchHandle) {
        let Some(page) = self.pages.get(page) else {
            return;
        };
        let mut writes: Vec<(String, Value)> = Vec::new();
        for group in &page.groups {
            let Some(node) = self.graph.node_for_group(&group.id) else {
                continue;
            };
            let NodePayload::Group { field_mappings, .. } = &node.payload else {
                continue;
            };
            for (field_key, mapping) in field_mappings {
                let applies = match mapping.apply_condition {
                    ApplyCondition::Always => true,
                    ApplyCondition::OnSuccess => handle == BranchHandle::Success,
                    ApplyCondition::OnFailure => handle == BranchHandle::Failure,
                };
                if !applies {
                    continue;
                }
                if let Some(value) = self.context.get_path(&mapping.variable_path) {
                    writes.push((field_key.clone(), value.clone()));
                }
            }
        }
        for (key, value) in writes {
            self.form_data.insert(key, value);
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    fn validate_page(
        &self,
        form_data: &Map<String, Value>,
        array_data: &Map<String, Value>,
    ) -> HashMap<String, String> {
        let mut errors = HashMap::new();
        let Some(page) = self.pages.get(self.current_page) else {
            return errors;
        };
        for group in &page.groups {
            if group.is_array_group {
                validate_array_group(group, array_data, &mut errors);
            } else {
                for field in &group.fields {
                    let value = form_data.get(&field.key);
                    if let Some(message) = validate_field(field, value) {
                        errors.insert(field.key.clone(), message);
                    }
                }
            }
        }
        errors
    }
}

fn validate_array_group(
    group: &FormGroup,
    array_data: &Map<String, Value>,
    errors: &mut HashMap<String, String>,
) {
    let array_key = group.array_field_name.as_deref().unwrap_or(&group.id);
    let rows = array_data
        .get(array_key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if let Some(min) = group.array_min_rows {
        if (rows.len() as u32) < min {
            errors.insert(
                array_key.to_string(),
                format!("{} requires at least {min} row(s)", group.name),
            );
        }
    }
    if let Some(max) = group.array_max_rows {
        if (rows.len() as u32) > max {
            errors.insert(
                array_key.to_string(),
                format!("{} allows at most {max} row(s)", group.name),
            );
        }
    }
    for (index, row) in rows.iter().enumerate() {
        for field in &group.fields {
            let value = row.get(&field.key);
            if let Some(message) = validate_field(field, value) {
                errors.insert(format!("{}.{index}", field.key), message);
            }
        }
    }
}

fn validate_field(
    field: &formflow_types::group::FormField,
    value: Option<&Value>,
) -> Option<String> {
    let text = value.map(value_to_string).unwrap_or_default();
    if field.required && text.trim().is_empty() {
        return Some(format!("{} is required", field.label));
    }
    if field.field_type == FieldType::Email && !text.is_empty() && !EMAIL_PATTERN.is_match(&text) {
        return Some(format!("{} is not a valid email address", field.label));
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
