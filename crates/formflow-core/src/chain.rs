//! Adapters between the canonical graph and the legacy pointer chain.
//!
//! Older workflows store steps as a linear list where each step carries
//! `nextOnSuccess`/`nextOnFailure` pointers. Both representations stay
//! readable and writable: these two pure functions convert either way over
//! the one canonical `WorkflowGraph`, so traversal logic is never duplicated.

use std::collections::HashSet;

use uuid::Uuid;

use formflow_types::graph::{BranchHandle, GraphEdge, GraphNode, NodePayload, Position};
use formflow_types::step::WorkflowStep;

use crate::graph::WorkflowGraph;
use crate::order::STRIDE;

/// Vertical spacing between nodes laid out from a chain.
const LAYOUT_ROW_HEIGHT: f64 = 120.0;

/// Build a graph from a legacy pointer chain.
///
/// Each step becomes a workflow node. A step with only a success pointer is
/// a linear step and gets a default-handle edge; a step with a failure
/// pointer gets explicit `success`/`failure` edges.
pub fn graph_from_chain(steps: &[WorkflowStep]) -> WorkflowGraph {
    let mut ordered: Vec<&WorkflowStep> = steps.iter().collect();
    ordered.sort_by_key(|s| s.order);

    let mut graph = WorkflowGraph::default();
    for (index, step) in ordered.iter().enumerate() {
        graph.upsert_node(GraphNode {
            id: step.id.clone(),
            position: Position {
                x: 0.0,
                y: index as f64 * LAYOUT_ROW_HEIGHT,
            },
            label: step.name.clone(),
            payload: NodePayload::Workflow {
                step_type: step.config.step_type(),
                config: step.config.clone(),
            },
        });
    }
    for step in &ordered {
        let branching = step.next_on_failure.is_some();
        if let Some(target) = &step.next_on_success {
            let handle = if branching {
                BranchHandle::Success
            } else {
                BranchHandle::Default
            };
            graph.add_edge(chain_edge(&step.id, target, handle));
        }
        if let Some(target) = &step.next_on_failure {
            graph.add_edge(chain_edge(&step.id, target, BranchHandle::Failure));
        }
    }
    graph
}

fn chain_edge(source: &str, target: &str, handle: BranchHandle) -> GraphEdge {
    GraphEdge {
        id: format!("e-{source}-{}", handle.as_raw().unwrap_or("next")),
        source_node_id: source.to_string(),
        target_node_id: target.to_string(),
        source_handle: handle,
        target_handle: None,
        label: None,
    }
}

/// Flatten a graph back into a legacy pointer chain.
///
/// `nextOnSuccess` takes the success-handle edge target, falling back to the
/// default-handle edge; `nextOnFailure` takes the failure-handle edge target.
/// Orders are assigned along the success spine, then remaining branches, at
/// the standard stride. Group nodes have no chain counterpart and are
/// skipped.
pub fn chain_from_graph(graph: &WorkflowGraph, workflow_id: Uuid) -> Vec<WorkflowStep> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut sequence: Vec<&GraphNode> = Vec::new();

    // Depth-first along success/default edges first, so the primary path
    // keeps contiguous orders.
    let mut stack: Vec<&GraphNode> = graph
        .roots()
        .into_iter()
        .filter(|n| matches!(n.payload, NodePayload::Workflow { .. }))
        .rev()
        .collect();
    while let Some(node) = stack.pop() {
        if !visited.insert(node.id.as_str()) {
            continue;
        }
        sequence.push(node);
        for handle in [
            BranchHandle::Failure,
            BranchHandle::Default,
            BranchHandle::Success,
        ] {
            let target = graph
                .outgoing(&node.id)
                .find(|e| e.source_handle == handle)
                .and_then(|e| graph.node(&e.target_node_id));
            if let Some(next) = target {
                if matches!(next.payload, NodePayload::Workflow { .. }) {
                    stack.push(next);
                }
            }
        }
    }
    // Disconnected workflow nodes still persist, after the reachable ones.
    for node in &graph.nodes {
        if matches!(node.payload, NodePayload::Workflow { .. })
            && visited.insert(node.id.as_str())
        {
            sequence.push(node);
        }
    }

    sequence
        .iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let NodePayload::Workflow { config, .. } = &node.payload else {
                return None;
            };
            Some(WorkflowStep {
                id: node.id.clone(),
                workflow_id,
                order: (index as i64 + 1) * STRIDE,
                name: node.label.clone(),
                config: config.clone(),
                enabled: true,
                next_on_success: successor(graph, &node.id, BranchHandle::Success)
                    .or_else(|| successor(graph, &node.id, BranchHandle::Default)),
                next_on_failure: successor(graph, &node.id, BranchHandle::Failure),
            })
        })
        .collect()
}

/// Target of the exact-handle edge, when it points at a workflow step.
/// No default-edge fallback here: the chain records what is drawn, not what
/// traversal would do.
fn successor(graph: &WorkflowGraph, node_id: &str, handle: BranchHandle) -> Option<String> {
    let edge = graph
        .outgoing(node_id)
        .find(|e| e.source_handle == handle)?;
    let target = graph.node(&edge.target_node_id)?;
    match target.payload {
        NodePayload::Workflow { .. } => Some(target.id.clone()),
        NodePayload::Group { .. } => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_types::step::{
        Condition, ConditionOperator, ConditionalCheckConfig, ExitConfig, HttpCallConfig,
        LogicalOperator, StepConfig,
    };

    fn step(
        id: &str,
        order: i64,
        config: StepConfig,
        on_success: Option<&str>,
        on_failure: Option<&str>,
    ) -> WorkflowStep {
        WorkflowStep {
            id: id.to_string(),
            workflow_id: Uuid::nil(),
            order,
            name: format!("step {id}"),
            config,
            enabled: true,
            next_on_success: on_success.map(str::to_string),
            next_on_failure: on_failure.map(str::to_string),
        }
    }

    fn http() -> StepConfig {
        StepConfig::ApiCall(HttpCallConfig {
            url: "https://api.example.com".to_string(),
            ..Default::default()
        })
    }

    fn exit() -> StepConfig {
        StepConfig::Exit(ExitConfig {
            exit_message: "Done".to_string(),
            show_restart_button: false,
        })
    }

    fn check() -> StepConfig {
        StepConfig::ConditionalCheck(ConditionalCheckConfig {
            primary: Condition {
                json_path: "response.status".to_string(),
                operator: ConditionOperator::Equals,
                expected_value: "ACTIVE".to_string(),
            },
            additional_conditions: Vec::new(),
            logical_operator: LogicalOperator::And,
        })
    }

    #[test]
    fn test_linear_chain_produces_default_edges() {
        let steps = vec![
            step("s1", 100, http(), Some("s2"), None),
            step("s2", 200, exit(), None, None),
        ];
        let graph = graph_from_chain(&steps);
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source_handle, BranchHandle::Default);
    }

    #[test]
    fn test_branching_step_produces_labeled_edges() {
        let steps = vec![
            step("s1", 100, check(), Some("s2"), Some("s3")),
            step("s2", 200, exit(), None, None),
            step("s3", 300, exit(), None, None),
        ];
        let graph = graph_from_chain(&steps);
        let handles: Vec<BranchHandle> =
            graph.outgoing("s1").map(|e| e.source_handle).collect();
        assert!(handles.contains(&BranchHandle::Success));
        assert!(handles.contains(&BranchHandle::Failure));
    }

    #[test]
    fn test_round_trip_preserves_pointers() {
        let steps = vec![
            step("s1", 100, http(), Some("s2"), None),
            step("s2", 200, check(), Some("s3"), Some("s4")),
            step("s3", 300, exit(), None, None),
            step("s4", 400, exit(), None, None),
        ];
        let round_tripped = chain_from_graph(&graph_from_chain(&steps), Uuid::nil());
        assert_eq!(round_tripped.len(), steps.len());
        for original in &steps {
            let found = round_tripped
                .iter()
                .find(|s| s.id == original.id)
                .expect("step survives round trip");
            assert_eq!(found.next_on_success, original.next_on_success);
            assert_eq!(found.next_on_failure, original.next_on_failure);
        }
    }

    #[test]
    fn test_chain_orders_follow_success_spine() {
        let steps = vec![
            step("s1", 100, http(), Some("s2"), None),
            step("s2", 200, http(), Some("s3"), None),
            step("s3", 300, exit(), None, None),
        ];
        let chain = chain_from_graph(&graph_from_chain(&steps), Uuid::nil());
        let ids: Vec<&str> = chain.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        let orders: Vec<i64> = chain.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![100, 200, 300]);
    }

    #[test]
    fn test_disconnected_node_still_persists() {
        let steps = vec![
            step("s1", 100, http(), None, None),
            step("s2", 200, http(), None, None),
        ];
        let chain = chain_from_graph(&graph_from_chain(&steps), Uuid::nil());
        assert_eq!(chain.len(), 2);
    }
}
