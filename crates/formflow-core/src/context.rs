//! Accumulating execution context for one workflow run.
//!
//! The context is a namespaced JSON bag: `form.*` holds raw user input,
//! `response.*` holds api_endpoint step outputs, `execute.ai.*` and
//! `execute.places.*` hold lookup outputs. Namespaces are append-only within
//! a run: a later step may overwrite a specific leaf path but never removes a
//! namespace.
//!
//! Transitions are modeled as pure value functions (`merged`, `with_path`,
//! `with_edge_handle`) rather than in-place mutation, so each state-machine
//! step is independently testable.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use formflow_types::graph::BranchHandle;

/// Context key recording which branch handle the last transition took.
pub const EDGE_HANDLE_TAKEN: &str = "edgeHandleTaken";

/// Context key recording the previous transition's handle.
pub const LAST_EDGE_HANDLE: &str = "lastEdgeHandle";

/// The accumulating namespaced data bag available to variable resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    root: Map<String, Value>,
}

impl ExecutionContext {
    /// Empty context for a fresh run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from an executor `contextData` object. Non-object
    /// values produce an empty context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// The context as a JSON value, for template resolution and the
    /// `existingContextData` request field.
    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Look up a dotted path. Returns `None` if any segment is missing.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current: Option<&Value> = None;
        for (i, segment) in path.split('.').enumerate() {
            current = if i == 0 {
                self.root.get(segment)
            } else {
                current?.get(segment)
            };
            current?;
        }
        current
    }

    /// Return a new context with `value` written at the dotted `path`,
    /// creating intermediate objects as needed.
    pub fn with_path(&self, path: &str, value: Value) -> Self {
        let mut next = self.clone();
        let segments: Vec<&str> = path.split('.').collect();
        set_path(&mut next.root, &segments, value);
        next
    }

    /// Return a new context with `incoming` deep-merged on top.
    ///
    /// Objects merge recursively; any other incoming value overwrites the
    /// existing leaf. Nothing is ever removed, keeping namespaces append-only.
    pub fn merged(&self, incoming: Value) -> Self {
        let mut next = self.clone();
        if let Value::Object(incoming) = incoming {
            merge_into(&mut next.root, incoming);
        }
        next
    }

    /// Return a new context recording the branch handle just taken. The
    /// previous handle shifts into `lastEdgeHandle`.
    pub fn with_edge_handle(&self, handle: BranchHandle) -> Self {
        let mut next = self.clone();
        if let Some(previous) = next.root.get(EDGE_HANDLE_TAKEN).cloned() {
            next.root.insert(LAST_EDGE_HANDLE.to_string(), previous);
        }
        next.root.insert(
            EDGE_HANDLE_TAKEN.to_string(),
            Value::String(handle.as_raw().unwrap_or("").to_string()),
        );
        next
    }

    /// The branch handle recorded by the most recent transition.
    pub fn edge_handle_taken(&self) -> BranchHandle {
        BranchHandle::from_raw(
            self.root
                .get(EDGE_HANDLE_TAKEN)
                .and_then(Value::as_str),
        )
    }
}

fn set_path(target: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            target.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = target
                .entry((*head).to_string())
                .or_insert_with(|| json!({}));
            if !entry.is_object() {
                // A scalar in the way of a namespace gets replaced.
                *entry = json!({});
            }
            if let Value::Object(map) = entry {
                set_path(map, rest, value);
            }
        }
    }
}

fn merge_into(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming_obj)) => {
                merge_into(existing, incoming_obj);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ExecutionContext {
        ExecutionContext::from_value(json!({
            "form": { "name": "Ann", "region": "EU" },
            "response": { "id": 42 }
        }))
    }

    #[test]
    fn test_get_path_walks_segments() {
        let ctx = seeded();
        assert_eq!(ctx.get_path("form.name"), Some(&json!("Ann")));
        assert_eq!(ctx.get_path("response.id"), Some(&json!(42)));
        assert_eq!(ctx.get_path("form.missing"), None);
        assert_eq!(ctx.get_path("execute.ai.category"), None);
    }

    #[test]
    fn test_with_path_creates_namespaces() {
        let ctx = seeded().with_path("execute.ai.category", json!("logistics"));
        assert_eq!(ctx.get_path("execute.ai.category"), Some(&json!("logistics")));
        // Original namespaces survive
        assert_eq!(ctx.get_path("form.name"), Some(&json!("Ann")));
    }

    #[test]
    fn test_merged_is_append_only() {
        let ctx = seeded().merged(json!({
            "response": { "status": "ACTIVE" },
            "execute": { "places": { "city": "Berlin" } }
        }));
        // New leaves added, old leaves kept
        assert_eq!(ctx.get_path("response.id"), Some(&json!(42)));
        assert_eq!(ctx.get_path("response.status"), Some(&json!("ACTIVE")));
        assert_eq!(ctx.get_path("execute.places.city"), Some(&json!("Berlin")));
    }

    #[test]
    fn test_merged_overwrites_leaf_not_namespace() {
        let ctx = seeded().merged(json!({ "form": { "name": "Bea" } }));
        assert_eq!(ctx.get_path("form.name"), Some(&json!("Bea")));
        assert_eq!(ctx.get_path("form.region"), Some(&json!("EU")));
    }

    #[test]
    fn test_transitions_leave_original_untouched() {
        let original = seeded();
        let _ = original.with_path("form.name", json!("Bea"));
        let _ = original.merged(json!({ "form": { "name": "Cid" } }));
        assert_eq!(original.get_path("form.name"), Some(&json!("Ann")));
    }

    #[test]
    fn test_edge_handle_bookkeeping() {
        let ctx = seeded()
            .with_edge_handle(BranchHandle::Success)
            .with_edge_handle(BranchHandle::Failure);
        assert_eq!(ctx.edge_handle_taken(), BranchHandle::Failure);
        assert_eq!(ctx.get_path(LAST_EDGE_HANDLE), Some(&json!("success")));
    }

    #[test]
    fn test_default_handle_reads_back_as_default() {
        let ctx = seeded().with_edge_handle(BranchHandle::Default);
        assert_eq!(ctx.edge_handle_taken(), BranchHandle::Default);
    }
}
