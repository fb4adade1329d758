//! SQLite step repository implementation.
//!
//! Implements `StepRepository` from `formflow-core` using sqlx with split
//! read/write pools. Step configs and node payloads are stored as tagged
//! JSON blobs; edges keep their branch handle as a plain text column with
//! `''` for the default handle.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use formflow_core::graph::WorkflowGraph;
use formflow_core::reconcile;
use formflow_core::repository::StepRepository;
use formflow_types::error::RepositoryError;
use formflow_types::graph::{BranchHandle, GraphEdge, GraphNode, NodePayload, Position};
use formflow_types::step::{StepConfig, WorkflowStep};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `StepRepository`.
pub struct SqliteStepRepository {
    pool: DatabasePool,
}

impl SqliteStepRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct StepRow {
    id: String,
    workflow_id: String,
    step_order: i64,
    name: String,
    config: String,
    enabled: bool,
    next_on_success: Option<String>,
    next_on_failure: Option<String>,
}

impl StepRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            step_order: row.try_get("step_order")?,
            name: row.try_get("name")?,
            config: row.try_get("config")?,
            enabled: row.try_get("enabled")?,
            next_on_success: row.try_get("next_on_success")?,
            next_on_failure: row.try_get("next_on_failure")?,
        })
    }

    fn into_step(self) -> Result<WorkflowStep, RepositoryError> {
        let workflow_id = parse_uuid(&self.workflow_id)?;
        let config: StepConfig = serde_json::from_str(&self.config)
            .map_err(|e| RepositoryError::Query(format!("invalid step config JSON: {e}")))?;
        Ok(WorkflowStep {
            id: self.id,
            workflow_id,
            order: self.step_order,
            name: self.name,
            config,
            enabled: self.enabled,
            next_on_success: self.next_on_success,
            next_on_failure: self.next_on_failure,
        })
    }
}

struct NodeRow {
    id: String,
    position_x: f64,
    position_y: f64,
    label: Option<String>,
    payload: String,
}

impl NodeRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            position_x: row.try_get("position_x")?,
            position_y: row.try_get("position_y")?,
            label: row.try_get("label")?,
            payload: row.try_get("payload")?,
        })
    }

    fn into_node(self) -> Result<GraphNode, RepositoryError> {
        let payload: NodePayload = serde_json::from_str(&self.payload)
            .map_err(|e| RepositoryError::Query(format!("invalid node payload JSON: {e}")))?;
        Ok(GraphNode {
            id: self.id,
            position: Position {
                x: self.position_x,
                y: self.position_y,
            },
            label: self.label.unwrap_or_default(),
            payload,
        })
    }
}

struct EdgeRow {
    id: String,
    source_node_id: String,
    target_node_id: String,
    source_handle: String,
    target_handle: Option<String>,
    label: Option<String>,
}

impl EdgeRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            source_node_id: row.try_get("source_node_id")?,
            target_node_id: row.try_get("target_node_id")?,
            source_handle: row.try_get("source_handle")?,
            target_handle: row.try_get("target_handle")?,
            label: row.try_get("label")?,
        })
    }

    fn into_edge(self) -> GraphEdge {
        GraphEdge {
            id: self.id,
            source_node_id: self.source_node_id,
            target_node_id: self.target_node_id,
            source_handle: BranchHandle::from_raw(Some(&self.source_handle)),
            target_handle: self.target_handle,
            label: self.label,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// StepRepository impl
// ---------------------------------------------------------------------------

impl StepRepository for SqliteStepRepository {
    async fn fetch_steps(&self, workflow_id: Uuid) -> Result<Vec<WorkflowStep>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, workflow_id, step_order, name, config, enabled,
                      next_on_success, next_on_failure
               FROM workflow_steps
               WHERE workflow_id = ?
               ORDER BY step_order"#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| StepRow::from_row(row).map_err(query_error)?.into_step())
            .collect()
    }

    async fn insert_step(&self, step: &WorkflowStep) -> Result<WorkflowStep, RepositoryError> {
        let mut persisted = step.clone();
        if reconcile::is_temp_id(&persisted.id) {
            persisted.id = Uuid::now_v7().to_string();
        }
        let config_json = serde_json::to_string(&persisted.config)
            .map_err(|e| RepositoryError::Query(format!("serialize step config: {e}")))?;
        let now = format_datetime(&Utc::now());

        sqlx::query(
            r#"INSERT INTO workflow_steps
                 (id, workflow_id, step_order, name, config, enabled,
                  next_on_success, next_on_failure, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&persisted.id)
        .bind(persisted.workflow_id.to_string())
        .bind(persisted.order)
        .bind(&persisted.name)
        .bind(&config_json)
        .bind(persisted.enabled)
        .bind(&persisted.next_on_success)
        .bind(&persisted.next_on_failure)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        debug!(step = %persisted.id, "step inserted");
        Ok(persisted)
    }

    async fn update_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        let config_json = serde_json::to_string(&step.config)
            .map_err(|e| RepositoryError::Query(format!("serialize step config: {e}")))?;
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            r#"UPDATE workflow_steps
               SET step_order = ?, name = ?, config = ?, enabled = ?,
                   next_on_success = ?, next_on_failure = ?, updated_at = ?
               WHERE id = ? AND workflow_id = ?"#,
        )
        .bind(step.order)
        .bind(&step.name)
        .bind(&config_json)
        .bind(step.enabled)
        .bind(&step.next_on_success)
        .bind(&step.next_on_failure)
        .bind(&now)
        .bind(&step.id)
        .bind(step.workflow_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_step(&self, workflow_id: Uuid, step_id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM workflow_steps WHERE id = ? AND workflow_id = ?")
            .bind(step_id)
            .bind(workflow_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        debug!(step = step_id, "step deleted");
        Ok(())
    }

    async fn fetch_graph(&self, workflow_id: Uuid) -> Result<WorkflowGraph, RepositoryError> {
        let node_rows = sqlx::query(
            r#"SELECT id, position_x, position_y, label, payload
               FROM workflow_nodes
               WHERE workflow_id = ?
               ORDER BY created_at"#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let edge_rows = sqlx::query(
            r#"SELECT id, source_node_id, target_node_id, source_handle, target_handle, label
               FROM workflow_edges
               WHERE workflow_id = ?"#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let nodes = node_rows
            .iter()
            .map(|row| NodeRow::from_row(row).map_err(query_error)?.into_node())
            .collect::<Result<Vec<_>, _>>()?;
        let edges = edge_rows
            .iter()
            .map(|row| Ok(EdgeRow::from_row(row).map_err(query_error)?.into_edge()))
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(WorkflowGraph::new(nodes, edges))
    }

    async fn save_graph(
        &self,
        workflow_id: Uuid,
        graph: &WorkflowGraph,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        let workflow_key = workflow_id.to_string();
        let now = format_datetime(&Utc::now());

        // Edges first: they reference nodes with ON DELETE CASCADE, but an
        // explicit delete keeps the write order obvious.
        sqlx::query("DELETE FROM workflow_edges WHERE workflow_id = ?")
            .bind(&workflow_key)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        sqlx::query("DELETE FROM workflow_nodes WHERE workflow_id = ?")
            .bind(&workflow_key)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        for node in &graph.nodes {
            let payload_json = serde_json::to_string(&node.payload)
                .map_err(|e| RepositoryError::Query(format!("serialize node payload: {e}")))?;
            sqlx::query(
                r#"INSERT INTO workflow_nodes
                     (id, workflow_id, position_x, position_y, label, payload,
                      created_at, updated_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&node.id)
            .bind(&workflow_key)
            .bind(node.position.x)
            .bind(node.position.y)
            .bind(&node.label)
            .bind(&payload_json)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        for edge in &graph.edges {
            sqlx::query(
                r#"INSERT INTO workflow_edges
                     (id, workflow_id, source_node_id, target_node_id,
                      source_handle, target_handle, label)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&edge.id)
            .bind(&workflow_key)
            .bind(&edge.source_node_id)
            .bind(&edge.target_node_id)
            .bind(edge.source_handle.as_raw().unwrap_or(""))
            .bind(&edge.target_handle)
            .bind(&edge.label)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        tx.commit().await.map_err(query_error)?;
        debug!(
            %workflow_id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "graph saved"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_types::step::{ExitConfig, HttpCallConfig};

    async fn test_repository() -> (tempfile::TempDir, SqliteStepRepository) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (dir, SqliteStepRepository::new(pool))
    }

    fn step(workflow_id: Uuid, order: i64) -> WorkflowStep {
        WorkflowStep {
            id: reconcile::temp_id(),
            workflow_id,
            order,
            name: "Create order".to_string(),
            config: StepConfig::ApiCall(HttpCallConfig {
                method: "POST".to_string(),
                url: "https://api.example.com/orders".to_string(),
                ..Default::default()
            }),
            enabled: true,
            next_on_success: None,
            next_on_failure: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_permanent_id_and_roundtrips() {
        let (_dir, repo) = test_repository().await;
        let workflow_id = Uuid::now_v7();

        let persisted = repo.insert_step(&step(workflow_id, 100)).await.unwrap();
        assert!(!reconcile::is_temp_id(&persisted.id));

        let steps = repo.fetch_steps(workflow_id).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].id, persisted.id);
        assert_eq!(steps[0].order, 100);
        let StepConfig::ApiCall(http) = &steps[0].config else {
            panic!("config survived as the wrong variant");
        };
        assert_eq!(http.method, "POST");
    }

    #[tokio::test]
    async fn test_fetch_orders_by_step_order() {
        let (_dir, repo) = test_repository().await;
        let workflow_id = Uuid::now_v7();
        repo.insert_step(&step(workflow_id, 300)).await.unwrap();
        repo.insert_step(&step(workflow_id, 100)).await.unwrap();
        repo.insert_step(&step(workflow_id, 200)).await.unwrap();

        let orders: Vec<i64> = repo
            .fetch_steps(workflow_id)
            .await
            .unwrap()
            .iter()
            .map(|s| s.order)
            .collect();
        assert_eq!(orders, vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn test_update_missing_step_is_not_found() {
        let (_dir, repo) = test_repository().await;
        let mut missing = step(Uuid::now_v7(), 100);
        missing.id = Uuid::now_v7().to_string();
        assert!(matches!(
            repo.update_step(&missing).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_step() {
        let (_dir, repo) = test_repository().await;
        let workflow_id = Uuid::now_v7();
        let persisted = repo.insert_step(&step(workflow_id, 100)).await.unwrap();

        repo.delete_step(workflow_id, &persisted.id).await.unwrap();
        assert!(repo.fetch_steps(workflow_id).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_step(workflow_id, &persisted.id).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_graph_save_and_fetch_roundtrip() {
        let (_dir, repo) = test_repository().await;
        let workflow_id = Uuid::now_v7();

        let mut graph = WorkflowGraph::default();
        graph.upsert_node(GraphNode {
            id: "n1".to_string(),
            position: Position { x: 10.0, y: 20.0 },
            label: "Customer details".to_string(),
            payload: NodePayload::Group {
                group_id: "g1".to_string(),
                field_mappings: Default::default(),
                header_content: Some("Order {{response.id}}".to_string()),
                display_with_previous: false,
            },
        });
        graph.upsert_node(GraphNode {
            id: "n2".to_string(),
            position: Position { x: 10.0, y: 140.0 },
            label: "Done".to_string(),
            payload: NodePayload::Workflow {
                step_type: formflow_types::step::StepType::Exit,
                config: StepConfig::Exit(ExitConfig {
                    exit_message: "All done".to_string(),
                    show_restart_button: true,
                }),
            },
        });
        graph.add_edge(GraphEdge {
            id: "e1".to_string(),
            source_node_id: "n1".to_string(),
            target_node_id: "n2".to_string(),
            source_handle: BranchHandle::Success,
            target_handle: None,
            label: None,
        });

        repo.save_graph(workflow_id, &graph).await.unwrap();
        let loaded = repo.fetch_graph(workflow_id).await.unwrap();

        assert_eq!(loaded.nodes.len(), 2);
        assert_eq!(loaded.edges.len(), 1);
        assert_eq!(loaded.edges[0].source_handle, BranchHandle::Success);
        let node = loaded.node("n1").unwrap();
        assert_eq!(node.group_id(), Some("g1"));
        assert_eq!(node.position.y, 20.0);
    }

    #[tokio::test]
    async fn test_save_graph_replaces_previous_graph() {
        let (_dir, repo) = test_repository().await;
        let workflow_id = Uuid::now_v7();

        let mut graph = WorkflowGraph::default();
        graph.upsert_node(GraphNode {
            id: "n1".to_string(),
            position: Position::default(),
            label: String::new(),
            payload: NodePayload::Group {
                group_id: "g1".to_string(),
                field_mappings: Default::default(),
                header_content: None,
                display_with_previous: false,
            },
        });
        repo.save_graph(workflow_id, &graph).await.unwrap();

        // Save a different graph; the old node must be gone
        let mut replacement = WorkflowGraph::default();
        replacement.upsert_node(GraphNode {
            id: "n9".to_string(),
            position: Position::default(),
            label: String::new(),
            payload: NodePayload::Group {
                group_id: "g9".to_string(),
                field_mappings: Default::default(),
                header_content: None,
                display_with_previous: false,
            },
        });
        repo.save_graph(workflow_id, &replacement).await.unwrap();

        let loaded = repo.fetch_graph(workflow_id).await.unwrap();
        assert_eq!(loaded.nodes.len(), 1);
        assert_eq!(loaded.nodes[0].id, "n9");
    }
}
