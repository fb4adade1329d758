//! Workflow step types.
//!
//! A `WorkflowStep` is one configured action in a workflow. Its `config` is a
//! tagged union keyed by the step type, with one variant struct per type so
//! every consumer (registry, simulator, persistence) matches exhaustively and
//! a new step type is a compile-time-checked addition.
//!
//! Wire format is camelCase; legacy field names from earlier schema versions
//! are accepted via serde aliases and normalized on save.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// A single step in a workflow.
///
/// Steps newly created client-side carry a temporary id (prefixed `temp-`)
/// until persisted; ids are opaque and stable afterwards. `order` is the sort
/// key within a workflow and uses the sparse 100-multiple scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Opaque step id. `temp-` prefixed until persisted.
    pub id: String,
    /// Owning workflow.
    pub workflow_id: Uuid,
    /// Sparse order value (unique within a workflow).
    pub order: i64,
    /// Human-readable step name.
    pub name: String,
    /// Step-type-specific configuration payload.
    pub config: StepConfig,
    /// Disabled steps are skipped by the executor but kept in sequence.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Legacy linear model: step taken on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_on_success: Option<String>,
    /// Legacy linear model: step taken on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_on_failure: Option<String>,
}

fn default_true() -> bool {
    true
}

/// The closed set of step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    ApiCall,
    ApiEndpoint,
    ConditionalCheck,
    DataTransform,
    SftpUpload,
    RenameFile,
    EmailAction,
    UserConfirmation,
    Exit,
    AiLookup,
    GooglePlacesLookup,
    MultipartFormUpload,
}

// ---------------------------------------------------------------------------
// StepConfig (tagged union keyed by step type)
// ---------------------------------------------------------------------------

/// Step-type-specific configuration payload, internally tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Outbound HTTP call whose response is not mapped into the context.
    ApiCall(HttpCallConfig),
    /// Outbound HTTP call whose response populates `response.*`.
    ApiEndpoint(HttpCallConfig),
    /// Branch on conditions evaluated against the execution context.
    ConditionalCheck(ConditionalCheckConfig),
    /// Copy/rename context paths without side effects.
    DataTransform(DataTransformConfig),
    /// Upload a generated file over SFTP.
    SftpUpload(SftpUploadConfig),
    /// Rename a remote file.
    RenameFile(RenameFileConfig),
    /// Send a templated email.
    EmailAction(EmailActionConfig),
    /// Pause for a yes/no confirmation from the user.
    UserConfirmation(UserConfirmationConfig),
    /// Terminal step: stop the run and show a message.
    Exit(ExitConfig),
    /// Free-text AI lookup populating `execute.ai.*`.
    AiLookup(AiLookupConfig),
    /// Places lookup populating `execute.places.*`.
    GooglePlacesLookup(GooglePlacesLookupConfig),
    /// Multipart form upload with ordered text/file parts.
    MultipartFormUpload(MultipartFormUploadConfig),
}

impl StepConfig {
    /// The step type this config belongs to.
    pub fn step_type(&self) -> StepType {
        match self {
            StepConfig::ApiCall(_) => StepType::ApiCall,
            StepConfig::ApiEndpoint(_) => StepType::ApiEndpoint,
            StepConfig::ConditionalCheck(_) => StepType::ConditionalCheck,
            StepConfig::DataTransform(_) => StepType::DataTransform,
            StepConfig::SftpUpload(_) => StepType::SftpUpload,
            StepConfig::RenameFile(_) => StepType::RenameFile,
            StepConfig::EmailAction(_) => StepType::EmailAction,
            StepConfig::UserConfirmation(_) => StepType::UserConfirmation,
            StepConfig::Exit(_) => StepType::Exit,
            StepConfig::AiLookup(_) => StepType::AiLookup,
            StepConfig::GooglePlacesLookup(_) => StepType::GooglePlacesLookup,
            StepConfig::MultipartFormUpload(_) => StepType::MultipartFormUpload,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP call config (api_call / api_endpoint)
// ---------------------------------------------------------------------------

/// Configuration shared by `api_call` and `api_endpoint` steps.
///
/// The URL may contain `{var}` path placeholders and/or `{{var}}` template
/// placeholders; the body template uses `{{var}}` only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCallConfig {
    #[serde(default = "default_method")]
    pub method: String,
    /// Request URL. Earlier schema versions called this `endpoint`.
    #[serde(alias = "endpoint")]
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Request body template. Earlier schema versions called this `requestBody`.
    #[serde(default, alias = "requestBody", skip_serializing_if = "Option::is_none")]
    pub body_template: Option<String>,
    /// Double single-quote characters inside substituted values (OData
    /// `$filter` literal escaping).
    #[serde(default)]
    pub escape_single_quotes_in_body: bool,
    /// Response-to-context mappings. Earlier schema versions called this
    /// `responseMappings`.
    #[serde(default, alias = "responseMappings", skip_serializing_if = "Vec::is_empty")]
    pub response_data_mappings: Vec<ResponseDataMapping>,
    /// Array-processing behavior for steps fed by an array group.
    #[serde(default)]
    pub array_processing: ArrayProcessingConfig,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Maps a path in the HTTP response onto a context path to update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDataMapping {
    #[serde(default)]
    pub response_path: String,
    #[serde(default)]
    pub update_path: String,
}

// ---------------------------------------------------------------------------
// Array processing
// ---------------------------------------------------------------------------

/// How an outbound-call step maps array-group rows onto outbound calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayProcessingMode {
    /// Single call, scalar field substitution only.
    #[default]
    None,
    /// One call per row.
    Loop,
    /// One call with the full row array at a designated placeholder.
    Batch,
    /// One call with hardcoded field mappings in a singleton array body.
    SingleArray,
    /// One call per matching conditional mapping.
    ConditionalHardcode,
}

/// Array-processing fields attached to an HTTP call config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayProcessingConfig {
    #[serde(default)]
    pub mode: ArrayProcessingMode,
    /// The array group feeding this step (`loop` / `batch` modes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_group_id: Option<String>,
    /// `loop` mode: abort remaining rows on the first failure.
    #[serde(default)]
    pub stop_on_error: bool,
    /// `loop` mode: wrap each row body in a singleton array.
    #[serde(default)]
    pub wrap_body_in_array: bool,
    /// `batch` mode: the `{{token}}` in the body template that receives the
    /// full row array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_placeholder: Option<String>,
    /// `single_array` mode: fields of the hardcoded singleton payload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hardcoded_field_mappings: Vec<HardcodedFieldMapping>,
    /// `conditional_hardcode` mode: one candidate call per condition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_mappings: Vec<ConditionalArrayMapping>,
}

/// A literal-or-templated field of a hardcoded payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardcodedFieldMapping {
    pub field: String,
    /// Value template (`{{path}}` tokens resolved against the context).
    pub value: String,
}

/// One conditional candidate call for `conditional_hardcode` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalArrayMapping {
    pub id: String,
    /// Dotted context path resolved before comparison.
    pub variable: String,
    pub operator: ConditionOperator,
    pub expected_value: String,
    #[serde(default)]
    pub field_mappings: Vec<HardcodedFieldMapping>,
}

// ---------------------------------------------------------------------------
// Conditional check
// ---------------------------------------------------------------------------

/// Comparison operators for conditions. String compares are case-sensitive;
/// `contains`/`not_contains` are substring compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
}

/// One condition evaluated against the execution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Dotted context path. Earlier schema versions called this `variable`.
    #[serde(alias = "variable")]
    pub json_path: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub expected_value: String,
}

/// How additional conditions combine with the primary one.
///
/// One flat operator across all additional conditions; there is no per-pair
/// precedence or grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Configuration for a `conditional_check` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalCheckConfig {
    #[serde(flatten)]
    pub primary: Condition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_conditions: Vec<Condition>,
    #[serde(default)]
    pub logical_operator: LogicalOperator,
}

// ---------------------------------------------------------------------------
// Remaining step configs
// ---------------------------------------------------------------------------

/// Configuration for a `data_transform` step: copy context paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTransformConfig {
    #[serde(default)]
    pub mappings: Vec<ResponseDataMapping>,
}

/// Configuration for an `sftp_upload` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SftpUploadConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    pub remote_path: String,
    /// Templated file name (`{{path}}` tokens allowed).
    pub file_name_template: String,
}

fn default_sftp_port() -> u16 {
    22
}

/// Configuration for a `rename_file` step. Both paths are templated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFileConfig {
    pub source_path: String,
    pub target_path: String,
}

/// Configuration for an `email_action` step. All fields are templated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailActionConfig {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    pub subject: String,
    #[serde(alias = "body")]
    pub body_template: String,
}

/// Configuration for a `user_confirmation` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfirmationConfig {
    /// Earlier schema versions called this `message`.
    #[serde(alias = "message")]
    pub prompt_message: String,
    #[serde(default = "default_yes_label")]
    pub yes_button_label: String,
    #[serde(default = "default_no_label")]
    pub no_button_label: String,
    /// Optional map pin shown alongside the prompt.
    #[serde(default)]
    pub show_location_map: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude_variable: Option<String>,
}

fn default_yes_label() -> String {
    "Yes".to_string()
}

fn default_no_label() -> String {
    "No".to_string()
}

/// Configuration for a terminal `exit` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitConfig {
    /// Templated exit message. Earlier schema versions called this `message`.
    #[serde(alias = "message")]
    pub exit_message: String,
    #[serde(default)]
    pub show_restart_button: bool,
}

/// Configuration for an `ai_lookup` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiLookupConfig {
    /// Free-text instruction for the lookup.
    pub instruction: String,
    /// Each mapping produces `execute.ai.<field_name>`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_mappings: Vec<AiResponseMapping>,
}

/// One field extracted from an AI lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponseMapping {
    pub field_name: String,
    pub source_instruction: String,
}

/// Configuration for a `google_places_lookup` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePlacesLookupConfig {
    /// Templated places query.
    pub query: String,
    /// Each mapping produces `execute.places.<field_name>`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_mappings: Vec<PlacesResponseMapping>,
}

/// One field extracted from a places lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacesResponseMapping {
    pub field_name: String,
    pub places_field: String,
}

/// Configuration for a `multipart_form_upload` step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartFormUploadConfig {
    pub url: String,
    #[serde(default = "default_post")]
    pub method: String,
    /// Ordered form parts.
    #[serde(default)]
    pub parts: Vec<FormPart>,
}

fn default_post() -> String {
    "POST".to_string()
}

/// One part of a multipart form upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FormPart {
    /// Text part; when `json_template` is set the value is a JSON template
    /// decomposable into flattened field mappings.
    Text {
        name: String,
        value: String,
        #[serde(default)]
        json_template: bool,
    },
    /// File part sourced from a context variable.
    File {
        name: String,
        file_variable: String,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_config_tagged_by_type() {
        let config = StepConfig::Exit(ExitConfig {
            exit_message: "Done: {{form.name}}".to_string(),
            show_restart_button: true,
        });
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"exit\""));
        let parsed: StepConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.step_type(), StepType::Exit);
    }

    #[test]
    fn test_http_call_legacy_endpoint_alias() {
        let raw = json!({
            "type": "api_endpoint",
            "method": "POST",
            "endpoint": "https://api.example.com/orders/{id}",
            "requestBody": "{\"name\": \"{{form.name}}\"}"
        });
        let config: StepConfig = serde_json::from_value(raw).unwrap();
        let StepConfig::ApiEndpoint(http) = config else {
            panic!("expected api_endpoint");
        };
        assert_eq!(http.url, "https://api.example.com/orders/{id}");
        assert_eq!(http.body_template.as_deref(), Some("{\"name\": \"{{form.name}}\"}"));
        assert_eq!(http.array_processing.mode, ArrayProcessingMode::None);
    }

    #[test]
    fn test_conditional_check_flattened_primary() {
        let raw = json!({
            "type": "conditional_check",
            "jsonPath": "response.status",
            "operator": "equals",
            "expectedValue": "ACTIVE",
            "additionalConditions": [
                { "variable": "form.region", "operator": "not_equals", "expectedValue": "EU" }
            ],
            "logicalOperator": "OR"
        });
        let config: StepConfig = serde_json::from_value(raw).unwrap();
        let StepConfig::ConditionalCheck(check) = config else {
            panic!("expected conditional_check");
        };
        assert_eq!(check.primary.json_path, "response.status");
        // `variable` is a legacy alias for jsonPath
        assert_eq!(check.additional_conditions[0].json_path, "form.region");
        assert_eq!(check.logical_operator, LogicalOperator::Or);
    }

    #[test]
    fn test_user_confirmation_defaults() {
        let raw = json!({
            "type": "user_confirmation",
            "message": "Proceed with {{form.count}} records?"
        });
        let config: StepConfig = serde_json::from_value(raw).unwrap();
        let StepConfig::UserConfirmation(confirm) = config else {
            panic!("expected user_confirmation");
        };
        assert_eq!(confirm.prompt_message, "Proceed with {{form.count}} records?");
        assert_eq!(confirm.yes_button_label, "Yes");
        assert_eq!(confirm.no_button_label, "No");
        assert!(!confirm.show_location_map);
    }

    #[test]
    fn test_workflow_step_roundtrip() {
        let step = WorkflowStep {
            id: "temp-1".to_string(),
            workflow_id: Uuid::now_v7(),
            order: 100,
            name: "Create order".to_string(),
            config: StepConfig::ApiCall(HttpCallConfig {
                method: "POST".to_string(),
                url: "https://api.example.com/orders".to_string(),
                ..Default::default()
            }),
            enabled: true,
            next_on_success: Some("step-2".to_string()),
            next_on_failure: None,
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"nextOnSuccess\":\"step-2\""));
        let parsed: WorkflowStep = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.order, 100);
        assert!(parsed.enabled);
    }

    #[test]
    fn test_form_part_variants() {
        let parts: Vec<FormPart> = serde_json::from_value(json!([
            { "type": "text", "name": "metadata", "value": "{\"id\": \"{{response.id}}\"}", "jsonTemplate": true },
            { "type": "file", "name": "document", "fileVariable": "form.attachment" }
        ]))
        .unwrap();
        assert!(matches!(parts[0], FormPart::Text { json_template: true, .. }));
        assert!(matches!(parts[1], FormPart::File { .. }));
    }

    #[test]
    fn test_array_processing_modes_serde() {
        for (mode, tag) in [
            (ArrayProcessingMode::None, "\"none\""),
            (ArrayProcessingMode::Loop, "\"loop\""),
            (ArrayProcessingMode::Batch, "\"batch\""),
            (ArrayProcessingMode::SingleArray, "\"single_array\""),
            (ArrayProcessingMode::ConditionalHardcode, "\"conditional_hardcode\""),
        ] {
            assert_eq!(serde_json::to_string(&mode).unwrap(), tag);
        }
    }
}
