//! Form group types.
//!
//! Groups are a form-builder concern consumed read-only by the execution
//! simulator: each group is one logical unit of user input, optionally
//! array-typed (repeatable rows).

use serde::{Deserialize, Serialize};

/// A collection of input fields presented as one logical unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormGroup {
    pub id: String,
    pub name: String,
    /// Array groups collect repeatable rows of their fields.
    #[serde(default)]
    pub is_array_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_min_rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_max_rows: Option<u32>,
    /// Key under which the row array appears in the execute parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_field_name: Option<String>,
    /// Render this group on the same page as the previous one.
    #[serde(default)]
    pub display_with_previous: bool,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

/// One input field within a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// Key under which the value appears in form data.
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Default value; may contain `{{path}}` tokens resolved when the group's
    /// page is entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// Input field type. Validation in the simulator keys off this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Email,
    Number,
    Date,
    Select,
    Checkbox,
}
