//! Canonical in-memory workflow graph.
//!
//! One graph structure backs both persistence shapes: the node/edge records
//! and the legacy pointer chain (see `chain`). Traversal lives here so the
//! simulator and the adapters never duplicate branch-handle logic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use formflow_types::graph::{BranchHandle, GraphEdge, GraphNode};

/// Node/edge workflow graph with at most one outgoing edge per
/// `(source, handle)` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Add a node. An existing node with the same id is replaced in place,
    /// keeping its edges.
    pub fn upsert_node(&mut self, node: GraphNode) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    /// Add an edge, displacing any existing edge with the same
    /// `(source, handle)` pair so the single-successor invariant holds.
    pub fn add_edge(&mut self, edge: GraphEdge) {
        if let Some(existing) = self.edges.iter().position(|e| {
            e.source_node_id == edge.source_node_id && e.source_handle == edge.source_handle
        }) {
            debug!(
                source = %edge.source_node_id,
                handle = ?edge.source_handle,
                "replacing existing edge for handle"
            );
            self.edges[existing] = edge;
        } else {
            self.edges.push(edge);
        }
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, node_id: &str) {
        self.nodes.retain(|n| n.id != node_id);
        self.edges
            .retain(|e| e.source_node_id != node_id && e.target_node_id != node_id);
    }

    pub fn remove_edge(&mut self, edge_id: &str) {
        self.edges.retain(|e| e.id != edge_id);
    }

    /// All edges leaving a node.
    pub fn outgoing<'a>(&'a self, node_id: &str) -> impl Iterator<Item = &'a GraphEdge> {
        let node_id = node_id.to_string();
        self.edges.iter().filter(move |e| e.source_node_id == node_id)
    }

    /// The successor reached by taking `handle` from `node_id`.
    ///
    /// Falls back to the default-handle edge when no edge matches the exact
    /// handle, so a branchless node still advances after a success outcome.
    pub fn next_node(&self, node_id: &str, handle: BranchHandle) -> Option<&GraphNode> {
        let exact = self
            .edges
            .iter()
            .find(|e| e.source_node_id == node_id && e.source_handle == handle);
        let edge = match exact {
            Some(e) => Some(e),
            None if handle != BranchHandle::Default => self.edges.iter().find(|e| {
                e.source_node_id == node_id && e.source_handle == BranchHandle::Default
            }),
            None => None,
        }?;
        self.node(&edge.target_node_id)
    }

    /// The node whose payload refers to the given form group.
    pub fn node_for_group(&self, group_id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.group_id() == Some(group_id))
    }

    /// Nodes with no incoming edge, in node order. The first one is the
    /// graph's entry point.
    pub fn roots(&self) -> Vec<&GraphNode> {
        let mut incoming: HashMap<&str, usize> = HashMap::new();
        for edge in &self.edges {
            *incoming.entry(edge.target_node_id.as_str()).or_default() += 1;
        }
        self.nodes
            .iter()
            .filter(|n| !incoming.contains_key(n.id.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
