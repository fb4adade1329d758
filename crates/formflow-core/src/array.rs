//! Array-processing call planner.
//!
//! An outbound-call step fed by an array group maps N form rows onto M
//! outbound calls depending on its mode. Planning is pure: given the config,
//! the run context, and the source group's rows, it produces the concrete
//! call list without performing any of them, so every mode is testable
//! without an executor.

use serde_json::{json, Value};
use tracing::debug;

use formflow_types::step::{
    ArrayProcessingMode, ConditionOperator, ConditionalArrayMapping, HardcodedFieldMapping,
    HttpCallConfig,
};

use crate::resolver::{lookup_path, resolve, resolve_escaped, resolve_path_params, value_to_string};

/// Placeholder receiving the full row array in `batch` mode when the config
/// does not name one.
const DEFAULT_BATCH_PLACEHOLDER: &str = "{{rows}}";

/// One concrete outbound call, fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Row index for `loop` mode; `None` for single-call modes.
    pub row_index: Option<usize>,
}

/// The full set of calls a step will issue, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallPlan {
    pub calls: Vec<PlannedCall>,
    /// `loop` mode only: abort remaining rows after a failed call instead of
    /// logging and skipping.
    pub stop_on_error: bool,
}

/// Plan the outbound calls for an HTTP step.
///
/// `rows` holds the source array group's submitted rows; single-call modes
/// ignore it.
pub fn plan_calls(config: &HttpCallConfig, context: &Value, rows: &[Value]) -> CallPlan {
    let mode = config.array_processing.mode;
    debug!(?mode, rows = rows.len(), "planning outbound calls");
    match mode {
        ArrayProcessingMode::None => CallPlan {
            calls: vec![single_call(config, context, None)],
            stop_on_error: false,
        },
        ArrayProcessingMode::Loop => plan_loop(config, context, rows),
        ArrayProcessingMode::Batch => plan_batch(config, context, rows),
        ArrayProcessingMode::SingleArray => plan_single_array(config, context),
        ArrayProcessingMode::ConditionalHardcode => plan_conditional(config, context),
    }
}

// ---------------------------------------------------------------------------
// Per-mode planning
// ---------------------------------------------------------------------------

fn plan_loop(config: &HttpCallConfig, context: &Value, rows: &[Value]) -> CallPlan {
    let wrap = config.array_processing.wrap_body_in_array;
    let calls = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let row_context = context_with_row(context, row);
            let mut call = single_call(config, &row_context, Some(index));
            if wrap {
                call.body = call.body.map(|b| format!("[{b}]"));
            }
            call
        })
        .collect();
    CallPlan {
        calls,
        stop_on_error: config.array_processing.stop_on_error,
    }
}

fn plan_batch(config: &HttpCallConfig, context: &Value, rows: &[Value]) -> CallPlan {
    let placeholder = config
        .array_processing
        .batch_placeholder
        .as_deref()
        .unwrap_or(DEFAULT_BATCH_PLACEHOLDER);
    let rows_json = serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string());

    let mut call = single_call(config, context, None);
    call.body = config
        .body_template
        .as_deref()
        .map(|template| resolve_body(config, template.replace(placeholder, &rows_json), context));
    CallPlan {
        calls: vec![call],
        stop_on_error: false,
    }
}

fn plan_single_array(config: &HttpCallConfig, context: &Value) -> CallPlan {
    let payload = hardcoded_payload(&config.array_processing.hardcoded_field_mappings, context);
    let mut call = single_call(config, context, None);
    call.body = serde_json::to_string(&json!([payload])).ok();
    CallPlan {
        calls: vec![call],
        stop_on_error: false,
    }
}

fn plan_conditional(config: &HttpCallConfig, context: &Value) -> CallPlan {
    let calls = config
        .array_processing
        .conditional_mappings
        .iter()
        .filter(|mapping| condition_matches(mapping, context))
        .map(|mapping| {
            let payload = hardcoded_payload(&mapping.field_mappings, context);
            let mut call = single_call(config, context, None);
            call.body = serde_json::to_string(&json!([payload])).ok();
            call
        })
        .collect();
    CallPlan {
        calls,
        stop_on_error: false,
    }
}

/// Evaluate one conditional mapping against the context.
///
/// Comparisons are case-sensitive string compares; a variable that fails to
/// resolve compares as the empty string.
fn condition_matches(mapping: &ConditionalArrayMapping, context: &Value) -> bool {
    let actual = lookup_path(context, &mapping.variable)
        .map(value_to_string)
        .unwrap_or_default();
    let expected = &mapping.expected_value;
    match mapping.operator {
        ConditionOperator::Equals => actual == *expected,
        ConditionOperator::NotEquals => actual != *expected,
        ConditionOperator::Contains => actual.contains(expected.as_str()),
        ConditionOperator::NotContains => !actual.contains(expected.as_str()),
    }
}

// ---------------------------------------------------------------------------
// Shared resolution helpers
// ---------------------------------------------------------------------------

/// Resolve a hardcoded mapping list into one payload object.
fn hardcoded_payload(mappings: &[HardcodedFieldMapping], context: &Value) -> Value {
    let mut payload = serde_json::Map::new();
    for mapping in mappings {
        payload.insert(
            mapping.field.clone(),
            Value::String(resolve(&mapping.value, context)),
        );
    }
    Value::Object(payload)
}

fn single_call(config: &HttpCallConfig, context: &Value, row_index: Option<usize>) -> PlannedCall {
    let url = resolve_path_params(&resolve(&config.url, context), context);
    let headers = config
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), resolve(value, context)))
        .collect();
    let body = config
        .body_template
        .as_deref()
        .map(|template| resolve_body(config, template.to_string(), context));
    PlannedCall {
        url,
        method: config.method.clone(),
        headers,
        body,
        row_index,
    }
}

fn resolve_body(config: &HttpCallConfig, template: String, context: &Value) -> String {
    if config.escape_single_quotes_in_body {
        resolve_escaped(&template, context)
    } else {
        resolve(&template, context)
    }
}

/// Merge one array row's fields into the `form` namespace so row templates
/// resolve through the same `{{form.*}}` paths as scalar fields.
fn context_with_row(context: &Value, row: &Value) -> Value {
    let mut merged = context.clone();
    if let (Value::Object(root), Value::Object(row_fields)) = (&mut merged, row) {
        let form = root.entry("form").or_insert_with(|| json!({}));
        if let Value::Object(form_map) = form {
            for (key, value) in row_fields {
                form_map.insert(key.clone(), value.clone());
            }
        }
        root.insert("row".to_string(), row.clone());
    }
    merged
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
