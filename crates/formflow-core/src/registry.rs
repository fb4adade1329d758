//! Step config registry: per-step-type validation and normalization.
//!
//! `validate` turns a loosely-typed raw config (JSON straight from the config
//! form, possibly carrying legacy field names) into a normalized `StepConfig`
//! variant. The match over step types is exhaustive, so adding a step type is
//! a compile-time-checked change here and in every other consumer.
//!
//! JSON body/part templates are validated for well-formedness with `{{..}}`
//! tokens masked length-preservingly first, so the reported 1-based
//! line/column points at the real offset in the author's template.

use serde_json::Value;
use thiserror::Error;

use formflow_types::step::{FormPart, StepConfig, StepType};

use crate::resolver::value_to_string;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Validation failure for a raw step config. Surfaced as inline field errors
/// in the config form; never persisted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed JSON in a body or part template, with the position of the
    /// parse error in the original template text.
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    InvalidJson {
        line: usize,
        column: usize,
        message: String,
    },

    /// A required config field is empty or missing.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// The raw config does not deserialize into the step type's schema.
    #[error("invalid config for step type: {0}")]
    Schema(String),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate and normalize a raw config for the given step type.
pub fn validate(step_type: StepType, raw_config: Value) -> Result<StepConfig, ConfigError> {
    let mut tagged = match raw_config {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(ConfigError::Schema(format!(
                "expected a config object, got {other}"
            )));
        }
    };
    // The tag is implied by the step type; the form payload may omit it.
    tagged.insert(
        "type".to_string(),
        serde_json::to_value(step_type).map_err(|e| ConfigError::Schema(e.to_string()))?,
    );

    let config: StepConfig = serde_json::from_value(Value::Object(tagged))
        .map_err(|e| ConfigError::Schema(e.to_string()))?;
    normalize(config)
}

/// Type-specific checks and cleanup on an already-deserialized config.
fn normalize(config: StepConfig) -> Result<StepConfig, ConfigError> {
    match config {
        StepConfig::ApiCall(http) => Ok(StepConfig::ApiCall(normalize_http(http)?)),
        StepConfig::ApiEndpoint(http) => Ok(StepConfig::ApiEndpoint(normalize_http(http)?)),
        StepConfig::ConditionalCheck(check) => {
            if check.primary.json_path.is_empty() {
                return Err(ConfigError::MissingField("jsonPath"));
            }
            Ok(StepConfig::ConditionalCheck(check))
        }
        StepConfig::DataTransform(mut transform) => {
            transform
                .mappings
                .retain(|m| !m.response_path.is_empty() && !m.update_path.is_empty());
            Ok(StepConfig::DataTransform(transform))
        }
        StepConfig::SftpUpload(sftp) => {
            if sftp.host.is_empty() {
                return Err(ConfigError::MissingField("host"));
            }
            if sftp.remote_path.is_empty() {
                return Err(ConfigError::MissingField("remotePath"));
            }
            Ok(StepConfig::SftpUpload(sftp))
        }
        StepConfig::RenameFile(rename) => {
            if rename.source_path.is_empty() {
                return Err(ConfigError::MissingField("sourcePath"));
            }
            if rename.target_path.is_empty() {
                return Err(ConfigError::MissingField("targetPath"));
            }
            Ok(StepConfig::RenameFile(rename))
        }
        StepConfig::EmailAction(email) => {
            if email.to.is_empty() {
                return Err(ConfigError::MissingField("to"));
            }
            if email.subject.is_empty() {
                return Err(ConfigError::MissingField("subject"));
            }
            Ok(StepConfig::EmailAction(email))
        }
        StepConfig::UserConfirmation(confirm) => {
            if confirm.prompt_message.is_empty() {
                return Err(ConfigError::MissingField("promptMessage"));
            }
            if confirm.show_location_map
                && (confirm.latitude_variable.is_none() || confirm.longitude_variable.is_none())
            {
                return Err(ConfigError::MissingField("latitudeVariable"));
            }
            Ok(StepConfig::UserConfirmation(confirm))
        }
        StepConfig::Exit(exit) => Ok(StepConfig::Exit(exit)),
        StepConfig::AiLookup(mut lookup) => {
            if lookup.instruction.is_empty() {
                return Err(ConfigError::MissingField("instruction"));
            }
            lookup.response_mappings.retain(|m| !m.field_name.is_empty());
            Ok(StepConfig::AiLookup(lookup))
        }
        StepConfig::GooglePlacesLookup(mut lookup) => {
            if lookup.query.is_empty() {
                return Err(ConfigError::MissingField("query"));
            }
            lookup.response_mappings.retain(|m| !m.field_name.is_empty());
            Ok(StepConfig::GooglePlacesLookup(lookup))
        }
        StepConfig::MultipartFormUpload(multipart) => {
            if multipart.url.is_empty() {
                return Err(ConfigError::MissingField("url"));
            }
            for part in &multipart.parts {
                if let FormPart::Text {
                    value,
                    json_template: true,
                    ..
                } = part
                {
                    validate_json_template(value)?;
                }
            }
            Ok(StepConfig::MultipartFormUpload(multipart))
        }
    }
}

fn normalize_http(
    mut http: formflow_types::step::HttpCallConfig,
) -> Result<formflow_types::step::HttpCallConfig, ConfigError> {
    if http.url.is_empty() {
        return Err(ConfigError::MissingField("url"));
    }
    // Only keep mappings with both sides populated.
    http.response_data_mappings
        .retain(|m| !m.response_path.is_empty() && !m.update_path.is_empty());
    if let Some(body) = &http.body_template {
        let trimmed = body.trim_start();
        if trimmed.starts_with('{') && !trimmed.starts_with("{{") || trimmed.starts_with('[') {
            validate_json_template(body)?;
        }
    }
    Ok(http)
}

// ---------------------------------------------------------------------------
// JSON template validation
// ---------------------------------------------------------------------------

/// Check that a JSON template parses once its `{{..}}` tokens are masked.
///
/// The mask replaces each token with the same number of digit characters,
/// which is valid JSON both as a bare value and inside a string literal, so
/// the line/column of any parse error matches the original template.
pub fn validate_json_template(template: &str) -> Result<(), ConfigError> {
    let masked = mask_template_tokens(template);
    match serde_json::from_str::<Value>(&masked) {
        Ok(_) => Ok(()),
        Err(e) => Err(ConfigError::InvalidJson {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }),
    }
}

/// Replace each `{{..}}` token with an equal-length run of digits.
fn mask_template_tokens(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        match rest[start + 2..].find("}}") {
            Some(end) => {
                out.push_str(&rest[..start]);
                let token_len = 2 + end + 2;
                out.extend(std::iter::repeat_n('1', token_len));
                rest = &rest[start + token_len..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Template decomposition (multipart text parts)
// ---------------------------------------------------------------------------

/// One flattened field extracted from a JSON-templated text part.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedField {
    /// Dotted key path; array entries sampled from index 0 contribute `.0`.
    pub path: String,
    /// The raw leaf value as a string (may itself contain `{{..}}` tokens).
    pub value: String,
}

/// Decompose a JSON-templated text part into flattened field mappings.
///
/// Nested object keys join with `.`; arrays are sampled at index 0 only.
/// Accepts every template `validate_json_template` accepts: tokens in
/// bare-value position (`"count": {{form.count}}`) are parsed as strings, so
/// flattened values carry the original token text.
pub fn decompose_json_template(template: &str) -> Result<Vec<FlattenedField>, ConfigError> {
    validate_json_template(template)?;
    let parsed: Value = serde_json::from_str(&quote_bare_tokens(template)).map_err(|e| {
        ConfigError::InvalidJson {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    })?;
    let mut fields = Vec::new();
    flatten(&parsed, String::new(), &mut fields);
    Ok(fields)
}

/// Wrap `{{..}}` tokens that sit outside string literals in quotes, turning
/// a bare-value token into a JSON string holding the verbatim token text.
fn quote_bare_tokens(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = template;
    while let Some(c) = rest.chars().next() {
        if !in_string && rest.starts_with("{{") {
            if let Some(end) = rest[2..].find("}}") {
                let token = &rest[..end + 4];
                out.push('"');
                out.push_str(token);
                out.push('"');
                rest = &rest[end + 4..];
                continue;
            }
        }
        match c {
            '"' if !in_string => in_string = true,
            '"' if !escaped => in_string = false,
            _ => {}
        }
        escaped = in_string && c == '\\' && !escaped;
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn flatten(value: &Value, prefix: String, out: &mut Vec<FlattenedField>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(child, path, out);
            }
        }
        Value::Array(items) => {
            if let Some(first) = items.first() {
                let path = if prefix.is_empty() {
                    "0".to_string()
                } else {
                    format!("{prefix}.0")
                };
                flatten(first, path, out);
            }
        }
        leaf => out.push(FlattenedField {
            path: prefix,
            value: value_to_string(leaf),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -----------------------------------------------------------------------
    // validate: per-type schemas
    // -----------------------------------------------------------------------

    #[test]
    fn test_validate_api_endpoint_drops_half_empty_mappings() {
        let config = validate(
            StepType::ApiEndpoint,
            json!({
                "url": "https://api.example.com/orders",
                "responseDataMappings": [
                    { "responsePath": "data.id", "updatePath": "response.orderId" },
                    { "responsePath": "data.status", "updatePath": "" },
                    { "responsePath": "", "updatePath": "response.x" }
                ]
            }),
        )
        .unwrap();
        let StepConfig::ApiEndpoint(http) = config else {
            panic!("expected api_endpoint");
        };
        assert_eq!(http.response_data_mappings.len(), 1);
        assert_eq!(http.response_data_mappings[0].update_path, "response.orderId");
    }

    #[test]
    fn test_validate_accepts_legacy_aliases() {
        let config = validate(
            StepType::ApiCall,
            json!({
                "endpoint": "https://api.example.com/v1",
                "requestBody": "{\"name\": \"{{form.name}}\"}"
            }),
        )
        .unwrap();
        let StepConfig::ApiCall(http) = config else {
            panic!("expected api_call");
        };
        assert_eq!(http.url, "https://api.example.com/v1");
        assert!(http.body_template.is_some());
    }

    #[test]
    fn test_validate_requires_url() {
        let err = validate(StepType::ApiCall, json!({ "url": "" })).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("url")));
    }

    #[test]
    fn test_validate_conditional_check() {
        let config = validate(
            StepType::ConditionalCheck,
            json!({
                "jsonPath": "response.status",
                "operator": "equals",
                "expectedValue": "ACTIVE"
            }),
        )
        .unwrap();
        assert!(matches!(config, StepConfig::ConditionalCheck(_)));
    }

    #[test]
    fn test_validate_confirmation_map_pin_needs_coordinates() {
        let err = validate(
            StepType::UserConfirmation,
            json!({ "promptMessage": "Proceed?", "showLocationMap": true }),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_validate_rejects_non_object_config() {
        let err = validate(StepType::Exit, json!("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::Schema(_)));
    }

    #[test]
    fn test_validate_tag_implied_by_step_type() {
        // Raw payload with no "type" key still validates against the step type
        let config = validate(StepType::Exit, json!({ "exitMessage": "Done" })).unwrap();
        assert_eq!(config.step_type(), StepType::Exit);
    }

    // -----------------------------------------------------------------------
    // JSON template validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_json_template_with_tokens_is_valid() {
        let template = r#"{"name": "{{form.name}}", "count": {{form.count}}}"#;
        assert!(validate_json_template(template).is_ok());
    }

    #[test]
    fn test_json_template_error_reports_line_and_column() {
        // Missing comma after the first field, on line 3
        let template = "{\n  \"name\": \"{{form.name}}\"\n  \"extra\": 1\n}";
        let err = validate_json_template(template).unwrap_err();
        let ConfigError::InvalidJson { line, column, .. } = err else {
            panic!("expected InvalidJson, got {err}");
        };
        assert_eq!(line, 3, "error should point at the line after the missing comma");
        assert!(column >= 1);
    }

    #[test]
    fn test_mask_preserves_length_and_newlines() {
        let template = "{\"a\": {{form.x}},\n\"b\": \"{{form.y}}\"}";
        let masked = mask_template_tokens(template);
        assert_eq!(masked.len(), template.len());
        assert_eq!(
            masked.matches('\n').count(),
            template.matches('\n').count()
        );
        assert!(!masked.contains("{{"));
    }

    #[test]
    fn test_body_template_validated_in_http_config() {
        let err = validate(
            StepType::ApiCall,
            json!({
                "url": "https://api.example.com",
                "bodyTemplate": "{\"name\": }"
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }

    #[test]
    fn test_non_json_body_not_validated() {
        // Form-encoded body: not a JSON template, no validation applies
        let config = validate(
            StepType::ApiCall,
            json!({
                "url": "https://api.example.com",
                "bodyTemplate": "name={{form.name}}&count={{form.count}}"
            }),
        );
        assert!(config.is_ok());
    }

    // -----------------------------------------------------------------------
    // Decomposition
    // -----------------------------------------------------------------------

    #[test]
    fn test_decompose_flattens_nested_keys() {
        let fields = decompose_json_template(
            r#"{"order": {"id": "{{response.id}}", "customer": {"name": "{{form.name}}"}}}"#,
        )
        .unwrap();
        let paths: Vec<&str> = fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["order.customer.name", "order.id"]);
        assert_eq!(fields[1].value, "{{response.id}}");
    }

    #[test]
    fn test_decompose_keeps_bare_value_tokens() {
        // A token in bare-value position validates, so it must decompose too
        let fields = decompose_json_template(
            r#"{"count": {{form.count}}, "label": "{{form.name}} copies"}"#,
        )
        .unwrap();
        let pairs: Vec<(&str, &str)> = fields
            .iter()
            .map(|f| (f.path.as_str(), f.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("count", "{{form.count}}"),
                ("label", "{{form.name}} copies"),
            ]
        );
    }

    #[test]
    fn test_decompose_samples_array_index_zero() {
        let fields =
            decompose_json_template(r#"{"items": [{"sku": "A"}, {"sku": "B"}]}"#).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].path, "items.0.sku");
        assert_eq!(fields[0].value, "A");
    }

    #[test]
    fn test_decompose_malformed_reports_position() {
        let err = decompose_json_template("{\"a\": ").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { line: 1, .. }));
    }

    #[test]
    fn test_multipart_json_part_validated() {
        let err = validate(
            StepType::MultipartFormUpload,
            json!({
                "url": "https://api.example.com/upload",
                "parts": [
                    { "type": "text", "name": "meta", "value": "{broken", "jsonTemplate": true }
                ]
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }
}
