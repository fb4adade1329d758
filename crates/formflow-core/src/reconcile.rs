//! Set-difference save planning.
//!
//! Saving a workflow compares the persisted id set against the in-memory
//! step list: matches become updates, temporary ids become inserts, and
//! persisted ids no longer present become deletes. Newly inserted ids never
//! land in the delete set even though the persisted snapshot predates them,
//! because deletes are computed from the snapshot minus the current id set.

use std::collections::HashSet;

use formflow_types::step::WorkflowStep;

/// Prefix marking a client-assigned id that has not been persisted yet.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Mint a temporary id for a step created client-side.
pub fn temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", uuid::Uuid::now_v7())
}

/// Whether an id is temporary (not yet persisted).
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// The writes one save performs, computed before any of them run.
#[derive(Debug, Clone, Default)]
pub struct SavePlan {
    /// Steps with temporary ids; the store assigns permanent ones.
    pub inserts: Vec<WorkflowStep>,
    /// Steps whose ids already exist in the store.
    pub updates: Vec<WorkflowStep>,
    /// Persisted ids absent from the current step list.
    pub deletes: Vec<String>,
}

impl SavePlan {
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty() && self.updates.is_empty()
    }
}

/// Diff the current in-memory steps against the persisted id snapshot.
pub fn plan_save(persisted_ids: &HashSet<String>, current: &[WorkflowStep]) -> SavePlan {
    let current_ids: HashSet<&str> = current.iter().map(|s| s.id.as_str()).collect();

    let mut plan = SavePlan::default();
    for step in current {
        if is_temp_id(&step.id) {
            plan.inserts.push(step.clone());
        } else if persisted_ids.contains(&step.id) {
            plan.updates.push(step.clone());
        } else {
            // Unknown permanent id: treat as insert so the save is total.
            plan.inserts.push(step.clone());
        }
    }
    plan.deletes = persisted_ids
        .iter()
        .filter(|id| !current_ids.contains(id.as_str()))
        .cloned()
        .collect();
    plan.deletes.sort();
    plan
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
