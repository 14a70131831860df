//! Layout inference for imported graphs
//!
//! Nodes are placed depth-first from a start node. A node's saved position
//! always wins over the proposed one, and its children are placed relative
//! to wherever it ended up. Nodes the traversal never reaches are laid out on
//! a grid below the tree, each seeding its own traversal.

use crate::config::LayoutConfig;
use flowform_core::{NodeId, Position, Topology};
use std::collections::HashMap;
use tracing::debug;

pub const YES_LABEL: &str = "Yes";
pub const NO_LABEL: &str = "No";

/// Where every node landed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub positions: HashMap<NodeId, Position>,
    /// Nodes in the order they were placed.
    pub placement: Vec<NodeId>,
    /// How many positions were computed rather than taken from saved layout.
    pub inferred: usize,
}

impl Layout {
    pub fn position(&self, id: &NodeId) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn is_placed(&self, id: &NodeId) -> bool {
        self.positions.contains_key(id)
    }

    /// The first node placed, which the importer treats as the start.
    pub fn first_placed(&self) -> Option<&NodeId> {
        self.placement.first()
    }

    fn place(&mut self, id: NodeId, position: Position, saved: bool) {
        if !saved {
            self.inferred += 1;
        }
        self.positions.insert(id.clone(), position);
        self.placement.push(id);
    }
}

pub struct LayoutInferencer<'a> {
    config: &'a LayoutConfig,
}

impl<'a> LayoutInferencer<'a> {
    pub fn new(config: &'a LayoutConfig) -> Self {
        LayoutInferencer { config }
    }

    /// Place every node of `order`, starting the traversal at `start`.
    ///
    /// `order` is the node record order; it decides the grid slots of
    /// unreachable nodes. Each node is placed exactly once, so cycles terminate.
    pub fn place(
        &self,
        topology: &Topology,
        start: Option<&NodeId>,
        order: &[NodeId],
        saved: &HashMap<NodeId, Position>,
    ) -> Layout {
        let mut layout = Layout::default();

        if let Some(start) = start {
            self.traverse(topology, start, Position::new(0.0, 0.0), saved, &mut layout);
        }

        let unplaced: Vec<&NodeId> = order.iter().filter(|id| !layout.is_placed(id)).collect();
        if !unplaced.is_empty() {
            debug!("{} nodes unreachable from the start node, using grid fallback", unplaced.len());
        }
        for (slot, id) in unplaced.into_iter().enumerate() {
            if layout.is_placed(id) {
                continue;
            }
            self.traverse(topology, id, self.grid_slot(slot), saved, &mut layout);
        }

        layout
    }

    fn traverse(
        &self,
        topology: &Topology,
        root: &NodeId,
        origin: Position,
        saved: &HashMap<NodeId, Position>,
        layout: &mut Layout,
    ) {
        let mut stack = vec![(root.clone(), origin)];

        while let Some((id, proposed)) = stack.pop() {
            if layout.is_placed(&id) {
                continue;
            }
            let saved_position = saved.get(&id).copied();
            let position = saved_position.unwrap_or(proposed);
            layout.place(id.clone(), position, saved_position.is_some());

            // Reverse so the first child is popped first, matching a recursive preorder.
            let children = self.child_positions(topology, &id, position);
            stack.extend(children.into_iter().rev());
        }
    }

    fn child_positions(&self, topology: &Topology, parent: &NodeId, at: Position) -> Vec<(NodeId, Position)> {
        let (sx, sy) = (self.config.spacing_x, self.config.spacing_y);
        let y = at.y + sy;

        match topology.children(parent).as_slice() {
            [] => Vec::new(),
            [only] => vec![((*only).clone(), Position::new(at.x, y))],
            [first, second] => {
                let (left, right) = split_pair(topology, parent, first, second);
                vec![
                    (left.clone(), Position::new(at.x - sx, y)),
                    (right.clone(), Position::new(at.x + sx, y)),
                ]
            }
            many => many
                .iter()
                .enumerate()
                .map(|(i, child)| ((*child).clone(), Position::new(at.x + i as f64 * sx, y)))
                .collect(),
        }
    }

    fn grid_slot(&self, slot: usize) -> Position {
        let columns = self.config.grid_columns.max(1);
        Position::new(
            (slot % columns) as f64 * self.config.spacing_x,
            (slot / columns) as f64 * self.config.spacing_y + self.config.grid_offset_y,
        )
    }
}

/// Order two children as (left, right): "No" goes left, "Yes" goes right.
/// Without either label the first child goes left.
pub fn split_pair<'n>(
    topology: &Topology,
    parent: &NodeId,
    first: &'n NodeId,
    second: &'n NodeId,
) -> (&'n NodeId, &'n NodeId) {
    let first_label = topology.edge_label(parent, first);
    let second_label = topology.edge_label(parent, second);
    if first_label == Some(YES_LABEL) || second_label == Some(NO_LABEL) {
        (second, first)
    } else {
        (first, second)
    }
}
