//! Flowform Core: flow graph model, relational record types and criteria catalog

pub mod catalog;
pub mod diff;
pub mod error;
pub mod graph;
pub mod model;
pub mod records;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use catalog::{CriteriaCatalog, Listener, SubscriptionId};
pub use diff::{FlowDiff, compare};
pub use error::{FlowError, Result};
pub use graph::{GraphIssue, Topology, check_graph};
pub use model::{
    CriteriaSet, CriterionRef, DEFAULT_EDGE_TYPE, EdgeData, EdgeId, FlowEdge, FlowGraph, FlowNode, NodeData,
    NodeId, NodeKind, Position,
};
pub use records::{
    EdgeFields, EdgeLayout, EdgeRecord, EdgeTriggerCriteriaFields, EdgeTriggerCriteriaRecord, GraphFields,
    GraphRecord, ModelKind, NodeFields, NodeLayout, NodeRecord, NodeTriggerCriteriaFields,
    NodeTriggerCriteriaRecord, Partition, Pk, QuestionFields, QuestionRecord, QuestionTagFields,
    QuestionTagRecord, QuestionType, Record, RecordBatch, strip_legacy_prefix,
};
