//! Boundary to the persistence store.
//!
//! The service layer treats persistence as commands returning `Result`; the
//! in-memory step list only commits after a successful round trip.
//! `formflow-infra` provides the SQLite-backed implementation.

use uuid::Uuid;

use formflow_types::error::RepositoryError;
use formflow_types::step::WorkflowStep;

use crate::graph::WorkflowGraph;

/// Stores workflow steps and the node/edge graph.
pub trait StepRepository: Send + Sync {
    /// All steps of a workflow, unordered.
    fn fetch_steps(
        &self,
        workflow_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowStep>, RepositoryError>> + Send;

    /// Insert a new step. The returned step carries the permanent id
    /// assigned by the store (replacing a temporary one).
    fn insert_step(
        &self,
        step: &WorkflowStep,
    ) -> impl std::future::Future<Output = Result<WorkflowStep, RepositoryError>> + Send;

    fn update_step(
        &self,
        step: &WorkflowStep,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete_step(
        &self,
        workflow_id: Uuid,
        step_id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The node/edge graph of a workflow.
    fn fetch_graph(
        &self,
        workflow_id: Uuid,
    ) -> impl std::future::Future<Output = Result<WorkflowGraph, RepositoryError>> + Send;

    /// Replace the persisted node/edge graph of a workflow.
    fn save_graph(
        &self,
        workflow_id: Uuid,
        graph: &WorkflowGraph,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
