//! Workflow step service: optimistic in-memory state with store-confirmed
//! mutations.
//!
//! Every mutation takes a snapshot of the step list, applies the change in
//! memory, persists it, and on a store failure restores the snapshot and
//! surfaces the error. Callers never observe a partially-applied mutation.
//!
//! One mutation is in flight at a time per service instance (`&mut self` on
//! every mutating method); the system assumes a single editor per workflow.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use formflow_types::error::RepositoryError;
use formflow_types::step::{StepConfig, WorkflowStep};

use crate::order::{self, Placement};
use crate::reconcile::{self, SavePlan};
use crate::repository::StepRepository;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store rejected the write: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("unknown step: {0}")]
    UnknownStep(String),

    #[error("invalid target position: {0}")]
    InvalidPosition(usize),
}

/// Manages one workflow's step list against a persistence store.
pub struct WorkflowService<R> {
    repository: R,
    workflow_id: Uuid,
    /// In-memory step list, ascending by order. Source of truth for reads;
    /// only committed after the store confirms each mutation.
    steps: Vec<WorkflowStep>,
}

impl<R: StepRepository> WorkflowService<R> {
    /// Load a workflow's steps, renumbering dense legacy orders once.
    pub async fn load(repository: R, workflow_id: Uuid) -> Result<Self, ServiceError> {
        let mut steps = repository.fetch_steps(workflow_id).await?;
        steps.sort_by_key(|s| s.order);

        let mut service = Self {
            repository,
            workflow_id,
            steps,
        };
        let orders: Vec<i64> = service.steps.iter().map(|s| s.order).collect();
        if order::needs_migration(&orders) {
            info!(%workflow_id, "migrating dense legacy orders to sparse scheme");
            service.renumber_all().await?;
        }
        Ok(service)
    }

    pub fn workflow_id(&self) -> Uuid {
        self.workflow_id
    }

    /// Steps in display order.
    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Append a new step with a temporary id; the store assigns the
    /// permanent one on success.
    pub async fn add_step(
        &mut self,
        name: &str,
        config: StepConfig,
    ) -> Result<WorkflowStep, ServiceError> {
        let orders: Vec<i64> = self.steps.iter().map(|s| s.order).collect();
        let step = WorkflowStep {
            id: reconcile::temp_id(),
            workflow_id: self.workflow_id,
            order: order::append_order(&orders),
            name: name.to_string(),
            config,
            enabled: true,
            next_on_success: None,
            next_on_failure: None,
        };

        let persisted = self.repository.insert_step(&step).await?;
        debug!(step = %persisted.id, order = persisted.order, "step added");
        self.steps.push(persisted.clone());
        Ok(persisted)
    }

    /// Move a step to `target_index` in the display order.
    pub async fn move_step(
        &mut self,
        step_id: &str,
        target_index: usize,
    ) -> Result<(), ServiceError> {
        let from = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| ServiceError::UnknownStep(step_id.to_string()))?;
        if target_index >= self.steps.len() {
            return Err(ServiceError::InvalidPosition(target_index));
        }
        if target_index == from {
            return Ok(());
        }

        let snapshot = self.steps.clone();

        let moved = self.steps.remove(from);
        let orders: Vec<i64> = self.steps.iter().map(|s| s.order).collect();
        match order::place_at(&orders, target_index) {
            Placement::At(new_order) => {
                let mut moved = moved;
                moved.order = new_order;
                self.steps.insert(target_index, moved);
                let step = self.steps[target_index].clone();
                if let Err(e) = self.repository.update_step(&step).await {
                    warn!(step = %step.id, error = %e, "move rejected, rolling back");
                    self.steps = snapshot;
                    return Err(e.into());
                }
            }
            Placement::Renumber => {
                self.steps.insert(target_index, moved);
                if let Err(e) = self.renumber_all().await {
                    self.steps = snapshot;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Delete a step and clear any pointers referencing it, in the store as
    /// well as in memory.
    pub async fn delete_step(&mut self, step_id: &str) -> Result<(), ServiceError> {
        if !self.steps.iter().any(|s| s.id == step_id) {
            return Err(ServiceError::UnknownStep(step_id.to_string()));
        }
        let snapshot = self.steps.clone();

        self.steps.retain(|s| s.id != step_id);
        let mut cleared: Vec<WorkflowStep> = Vec::new();
        for step in &mut self.steps {
            let mut changed = false;
            if step.next_on_success.as_deref() == Some(step_id) {
                step.next_on_success = None;
                changed = true;
            }
            if step.next_on_failure.as_deref() == Some(step_id) {
                step.next_on_failure = None;
                changed = true;
            }
            if changed {
                cleared.push(step.clone());
            }
        }

        // Pointer updates go first: if the sequence fails partway, the store
        // holds cleared pointers rather than references to a deleted step.
        for step in &cleared {
            if let Err(e) = self.repository.update_step(step).await {
                warn!(step = %step.id, error = %e, "pointer clear rejected, rolling back");
                self.steps = snapshot;
                return Err(e.into());
            }
        }
        if let Err(e) = self
            .repository
            .delete_step(self.workflow_id, step_id)
            .await
        {
            warn!(step = step_id, error = %e, "delete rejected, rolling back");
            self.steps = snapshot;
            return Err(e.into());
        }
        Ok(())
    }

    /// Replace a step's name and config.
    pub async fn update_step(
        &mut self,
        step_id: &str,
        name: &str,
        config: StepConfig,
    ) -> Result<(), ServiceError> {
        let index = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| ServiceError::UnknownStep(step_id.to_string()))?;
        let snapshot = self.steps[index].clone();

        self.steps[index].name = name.to_string();
        self.steps[index].config = config;

        let updated = self.steps[index].clone();
        if let Err(e) = self.repository.update_step(&updated).await {
            warn!(step = step_id, error = %e, "update rejected, rolling back");
            self.steps[index] = snapshot;
            return Err(e.into());
        }
        Ok(())
    }

    /// Persist the full step list via a reconciliation diff against the
    /// store's current id set.
    pub async fn save(&mut self) -> Result<SavePlan, ServiceError> {
        let persisted: HashSet<String> = self
            .repository
            .fetch_steps(self.workflow_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let plan = reconcile::plan_save(&persisted, &self.steps);
        debug!(
            inserts = plan.inserts.len(),
            updates = plan.updates.len(),
            deletes = plan.deletes.len(),
            "applying save plan"
        );

        let snapshot = self.steps.clone();
        if let Err(e) = self.apply_plan(&plan).await {
            warn!(error = %e, "save rejected, rolling back");
            self.steps = snapshot;
            return Err(e);
        }
        Ok(plan)
    }

    async fn apply_plan(&mut self, plan: &SavePlan) -> Result<(), ServiceError> {
        for step in &plan.inserts {
            let persisted = self.repository.insert_step(step).await?;
            if let Some(local) = self.steps.iter_mut().find(|s| s.id == step.id) {
                local.id = persisted.id;
            }
        }
        for step in &plan.updates {
            self.repository.update_step(step).await?;
        }
        for step_id in &plan.deletes {
            self.repository.delete_step(self.workflow_id, step_id).await?;
        }
        Ok(())
    }

    /// Reassign stride-spaced orders to every step and persist them.
    async fn renumber_all(&mut self) -> Result<(), ServiceError> {
        let orders = order::renumbered(self.steps.len());
        for (step, new_order) in self.steps.iter_mut().zip(orders) {
            step.order = new_order;
        }
        for step in self.steps.clone() {
            self.repository.update_step(&step).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
