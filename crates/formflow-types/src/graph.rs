//! Graph-model types: nodes, edges, branch handles, and field mappings.
//!
//! The graph representation coexists with the legacy `next_on_success` /
//! `next_on_failure` pointer chain on `WorkflowStep`. Conversion between the
//! two lives in `formflow-core`; this module is the data shape only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::step::{StepConfig, StepType};

// ---------------------------------------------------------------------------
// Branch handles
// ---------------------------------------------------------------------------

/// The labeled outgoing side of a node.
///
/// On the wire the default handle is the empty string (or an absent field),
/// matching the canvas edge records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchHandle {
    Success,
    Failure,
    #[serde(rename = "")]
    #[default]
    Default,
}

impl BranchHandle {
    /// Parse a raw handle string from a persisted edge record.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("success") => BranchHandle::Success,
            Some("failure") => BranchHandle::Failure,
            _ => BranchHandle::Default,
        }
    }

    /// Raw handle string for persistence; `None` for the default handle.
    pub fn as_raw(&self) -> Option<&'static str> {
        match self {
            BranchHandle::Success => Some("success"),
            BranchHandle::Failure => Some("failure"),
            BranchHandle::Default => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node in the workflow graph: either a form-input group or a workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Opaque node id. `temp-` prefixed until persisted.
    pub id: String,
    #[serde(default)]
    pub position: Position,
    pub label: String,
    #[serde(flatten)]
    pub payload: NodePayload,
}

/// The node-kind-specific payload, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum NodePayload {
    /// A form-input group node.
    Group {
        group_id: String,
        /// Pre-population rules for the group's fields, keyed by field key.
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        field_mappings: HashMap<String, FieldMapping>,
        /// Templated text shown above the group's fields.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header_content: Option<String>,
        /// Render this group on the same page as the previous one.
        #[serde(default)]
        display_with_previous: bool,
    },
    /// A workflow step node.
    Workflow {
        step_type: StepType,
        config: StepConfig,
    },
}

impl GraphNode {
    /// The group id, if this is a group node.
    pub fn group_id(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Group { group_id, .. } => Some(group_id),
            NodePayload::Workflow { .. } => None,
        }
    }
}

/// A directed edge between two nodes with an optional branch handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    #[serde(default)]
    pub source_handle: BranchHandle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

// ---------------------------------------------------------------------------
// Field mappings
// ---------------------------------------------------------------------------

/// Gate on a field mapping: apply always, or only when the group was reached
/// via a matching branch handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyCondition {
    #[default]
    Always,
    OnSuccess,
    OnFailure,
}

/// Pre-populates one input field of a group from a previously-resolved
/// context variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Dotted context path whose value fills the field.
    pub variable_path: String,
    #[serde(default)]
    pub apply_condition: ApplyCondition,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
