//! Graph comparison used to check export/import round trips

use crate::model::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Differences between two versions of a flow graph.
///
/// Positions are not compared; layout is not guaranteed to survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDiff {
    /// Nodes present before but not after.
    pub removed_nodes: Vec<NodeId>,
    /// Nodes present after but not before.
    pub added_nodes: Vec<NodeId>,
    /// Nodes whose label changed.
    pub relabeled_nodes: Vec<NodeId>,
    /// Nodes whose kind changed.
    pub rekinded_nodes: Vec<NodeId>,
    /// Nodes whose criteria labels differ.
    pub node_criteria_changed: Vec<NodeId>,
    pub removed_edges: Vec<EdgeId>,
    pub added_edges: Vec<EdgeId>,
    pub relabeled_edges: Vec<EdgeId>,
    /// Edges whose source or target changed.
    pub rewired_edges: Vec<EdgeId>,
    pub edge_criteria_changed: Vec<EdgeId>,
}

impl FlowDiff {
    /// Check if this diff is empty (no changes).
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }

    pub fn change_count(&self) -> usize {
        self.removed_nodes.len()
            + self.added_nodes.len()
            + self.relabeled_nodes.len()
            + self.rekinded_nodes.len()
            + self.node_criteria_changed.len()
            + self.removed_edges.len()
            + self.added_edges.len()
            + self.relabeled_edges.len()
            + self.rewired_edges.len()
            + self.edge_criteria_changed.len()
    }
}

/// Compare two graphs by node/edge id.
pub fn compare(before: &FlowGraph, after: &FlowGraph) -> FlowDiff {
    let mut diff = FlowDiff::default();

    let after_nodes: HashMap<&NodeId, &FlowNode> = after.nodes.iter().map(|n| (&n.id, n)).collect();
    for old in &before.nodes {
        let Some(new) = after_nodes.get(&old.id) else {
            diff.removed_nodes.push(old.id.clone());
            continue;
        };
        if old.label() != new.label() {
            diff.relabeled_nodes.push(old.id.clone());
        }
        if old.kind != new.kind {
            diff.rekinded_nodes.push(old.id.clone());
        }
        if sorted_labels(old.data.selected_criteria.iter()) != sorted_labels(new.data.selected_criteria.iter()) {
            diff.node_criteria_changed.push(old.id.clone());
        }
    }
    for new in &after.nodes {
        if before.node(&new.id).is_none() {
            diff.added_nodes.push(new.id.clone());
        }
    }

    let after_edges: HashMap<&EdgeId, &FlowEdge> = after.edges.iter().map(|e| (&e.id, e)).collect();
    for old in &before.edges {
        let Some(new) = after_edges.get(&old.id) else {
            diff.removed_edges.push(old.id.clone());
            continue;
        };
        if old.label() != new.label() {
            diff.relabeled_edges.push(old.id.clone());
        }
        if old.source != new.source || old.target != new.target {
            diff.rewired_edges.push(old.id.clone());
        }
        if sorted_labels(old.criteria()) != sorted_labels(new.criteria()) {
            diff.edge_criteria_changed.push(old.id.clone());
        }
    }
    for new in &after.edges {
        if before.edge(&new.id).is_none() {
            diff.added_edges.push(new.id.clone());
        }
    }

    diff
}

fn sorted_labels<'a>(criteria: impl Iterator<Item = &'a CriterionRef>) -> Vec<&'a str> {
    let mut labels: Vec<&str> = criteria.map(|c| c.label.as_str()).collect();
    labels.sort_unstable();
    labels
}
