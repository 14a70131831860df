//! Flow topology wrapper using petgraph::StableDiGraph keyed by NodeId

use crate::model::*;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Directed multigraph of node ids with labelled edges.
///
/// Children are reported in edge insertion order, which the layout relies on.
pub struct Topology {
    inner: StableDiGraph<NodeId, String>,
    index: HashMap<NodeId, NodeIndex>,
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Topology {
    pub fn new() -> Self {
        Topology {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build from an editor graph. Edges with an unknown endpoint are left out.
    pub fn from_flow(graph: &FlowGraph) -> Self {
        let mut topology = Topology::new();
        for node in &graph.nodes {
            topology.add_node(node.id.clone());
        }
        for edge in &graph.edges {
            topology.add_edge(&edge.source, &edge.target, edge.label());
        }
        topology
    }

    /// Add a node. Adding an existing id is a no-op returning `false`.
    pub fn add_node(&mut self, id: NodeId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        let idx = self.inner.add_node(id.clone());
        self.index.insert(id, idx);
        true
    }

    /// Add an edge between two known nodes. Returns `false` if either end is unknown.
    pub fn add_edge(&mut self, source: &NodeId, target: &NodeId, label: &str) -> bool {
        let (Some(&s), Some(&t)) = (self.index.get(source), self.index.get(target)) else {
            warn!("Edge {} -> {} references an unknown node", source, target);
            return false;
        };
        self.inner.add_edge(s, t, label.to_string());
        true
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Child ids of a node, one entry per outgoing edge, in edge insertion order.
    pub fn children(&self, id: &NodeId) -> Vec<&NodeId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut outgoing: Vec<_> = self
            .inner
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge_ref| (edge_ref.id().index(), edge_ref.target()))
            .collect();
        outgoing.sort_by_key(|(edge_idx, _)| *edge_idx);
        outgoing
            .into_iter()
            .filter_map(|(_, target)| self.inner.node_weight(target))
            .collect()
    }

    /// Label of the edge `source -> target`. The most recently added edge wins
    /// when several connect the same pair.
    pub fn edge_label(&self, source: &NodeId, target: &NodeId) -> Option<&str> {
        let (&s, &t) = (self.index.get(source)?, self.index.get(target)?);
        self.inner
            .edges_directed(s, Direction::Outgoing)
            .filter(|edge_ref| edge_ref.target() == t)
            .max_by_key(|edge_ref| edge_ref.id().index())
            .map(|edge_ref| edge_ref.weight().as_str())
    }

    /// Number of incoming edges.
    pub fn in_degree(&self, id: &NodeId) -> usize {
        self.index
            .get(id)
            .map_or(0, |&idx| self.inner.edges_directed(idx, Direction::Incoming).count())
    }

    /// All nodes reachable from `start` (including `start` itself).
    pub fn reachable_from(&self, start: &NodeId) -> HashSet<NodeId> {
        let mut reached = HashSet::new();
        let Some(&start_idx) = self.index.get(start) else {
            return reached;
        };
        let mut to_visit = vec![start_idx];

        while let Some(current) = to_visit.pop() {
            let Some(id) = self.inner.node_weight(current) else {
                continue;
            };
            if !reached.insert(id.clone()) {
                continue;
            }
            for edge_ref in self.inner.edges_directed(current, Direction::Outgoing) {
                to_visit.push(edge_ref.target());
            }
        }

        reached
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

/// Problems worth reporting before a graph is exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// No start-typed node. The exported graph record will have an empty `start`.
    MissingStart,
    /// More than one start-typed node; the last one ends up in the graph record.
    MultipleStarts(usize),
    /// More than one end-typed node; only the last one is recorded as `end`.
    MultipleEnds(usize),
    DuplicateNodeId(NodeId),
    DuplicateEdgeId(EdgeId),
    /// Edge whose source or target is not a node of the graph.
    DanglingEdge(EdgeId),
    /// Node that cannot be reached from the start node.
    Unreachable(NodeId),
}

impl std::fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphIssue::MissingStart => write!(f, "graph has no start node"),
            GraphIssue::MultipleStarts(n) => write!(f, "graph has {n} start nodes"),
            GraphIssue::MultipleEnds(n) => write!(f, "graph has {n} end nodes; only the last is recorded"),
            GraphIssue::DuplicateNodeId(id) => write!(f, "node id {id} is used more than once"),
            GraphIssue::DuplicateEdgeId(id) => write!(f, "edge id {id} is used more than once"),
            GraphIssue::DanglingEdge(id) => write!(f, "edge {id} references a missing node"),
            GraphIssue::Unreachable(id) => write!(f, "node {id} is not reachable from the start node"),
        }
    }
}

/// Check a graph for the issues above. An empty result means the graph is clean.
pub fn check_graph(graph: &FlowGraph) -> Vec<GraphIssue> {
    let mut issues = Vec::new();

    let starts = graph.nodes_of_kind(NodeKind::Start).count();
    match starts {
        0 => issues.push(GraphIssue::MissingStart),
        1 => {}
        n => issues.push(GraphIssue::MultipleStarts(n)),
    }
    let ends = graph.nodes_of_kind(NodeKind::End).count();
    if ends > 1 {
        issues.push(GraphIssue::MultipleEnds(ends));
    }

    let mut seen_nodes = HashSet::new();
    for node in &graph.nodes {
        if !seen_nodes.insert(&node.id) {
            issues.push(GraphIssue::DuplicateNodeId(node.id.clone()));
        }
    }
    let mut seen_edges = HashSet::new();
    for edge in &graph.edges {
        if !seen_edges.insert(&edge.id) {
            issues.push(GraphIssue::DuplicateEdgeId(edge.id.clone()));
        }
        if !seen_nodes.contains(&edge.source) || !seen_nodes.contains(&edge.target) {
            issues.push(GraphIssue::DanglingEdge(edge.id.clone()));
        }
    }

    if let Some(start) = graph.start_node() {
        let reached = Topology::from_flow(graph).reachable_from(&start.id);
        for node in &graph.nodes {
            if !reached.contains(&node.id) {
                issues.push(GraphIssue::Unreachable(node.id.clone()));
            }
        }
    }

    issues
}
