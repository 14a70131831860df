//! Graph-side data structures for the flow editor
//!
//! These types mirror the editor's own JSON shape (`nodes`/`edges` arrays with
//! a `data` payload per element), so a saved flow deserializes directly into
//! a [`FlowGraph`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::records::QuestionRecord;

/// Render type assigned to edges that do not name one.
pub const DEFAULT_EDGE_TYPE: &str = "straightEdge";

/// Identifier of a node, unique within one graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string(deserializer).map(NodeId)
    }
}

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

/// Identifier of an edge, unique within one graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl<'de> Deserialize<'de> for EdgeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_string(deserializer).map(EdgeId)
    }
}

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        EdgeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        EdgeId(id.to_string())
    }
}

/// What role a node plays in the questionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    /// Entry point. At most one per graph.
    Start,
    /// Ordinary question. Rendered by the editor as a `text` node.
    #[default]
    Question,
    /// Terminal node, exported as a dead-end question.
    End,
}

impl NodeKind {
    /// Name used for the `type` field of the editor shape.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Question => "text",
            NodeKind::End => "end",
        }
    }
}

impl From<String> for NodeKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "start" => NodeKind::Start,
            "end" => NodeKind::End,
            // "text", "question", "input" and anything the editor adds later
            _ => NodeKind::Question,
        }
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// A reference to one entry of the criteria catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CriterionRef {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
}

impl CriterionRef {
    pub fn new(id: impl Into<String>, value: impl Into<String>, label: impl Into<String>) -> Self {
        CriterionRef {
            id: id.into(),
            value: value.into(),
            label: label.into(),
        }
    }

    /// Identity used for deduplication. Falls back to the label when no value is set.
    fn dedup_key(&self) -> &str {
        if self.value.is_empty() {
            &self.label
        } else {
            &self.value
        }
    }
}

/// Ordered set of criteria, deduplicated by value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CriterionRef>", into = "Vec<CriterionRef>")]
pub struct CriteriaSet(Vec<CriterionRef>);

impl CriteriaSet {
    pub fn new() -> Self {
        CriteriaSet(Vec::new())
    }

    /// Append a criterion. Returns `false` (and changes nothing) if its value is already present.
    pub fn insert(&mut self, criterion: CriterionRef) -> bool {
        if self.contains_value(criterion.dedup_key()) {
            return false;
        }
        self.0.push(criterion);
        true
    }

    /// Remove the criterion with the given value.
    pub fn remove_value(&mut self, value: &str) -> Option<CriterionRef> {
        let idx = self.0.iter().position(|c| c.dedup_key() == value)?;
        Some(self.0.remove(idx))
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.0.iter().any(|c| c.dedup_key() == value)
    }

    pub fn first(&self) -> Option<&CriterionRef> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CriterionRef> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels in insertion order.
    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.label.as_str()).collect()
    }
}

impl From<Vec<CriterionRef>> for CriteriaSet {
    fn from(criteria: Vec<CriterionRef>) -> Self {
        criteria.into_iter().collect()
    }
}

impl From<CriteriaSet> for Vec<CriterionRef> {
    fn from(set: CriteriaSet) -> Self {
        set.0
    }
}

impl FromIterator<CriterionRef> for CriteriaSet {
    fn from_iter<I: IntoIterator<Item = CriterionRef>>(iter: I) -> Self {
        let mut set = CriteriaSet::new();
        for criterion in iter {
            set.insert(criterion);
        }
        set
    }
}

impl<'a> IntoIterator for &'a CriteriaSet {
    type Item = &'a CriterionRef;
    type IntoIter = std::slice::Iter<'a, CriterionRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Payload of a node: display text, attached criteria and data carried from a prior import.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(default, skip_serializing_if = "CriteriaSet::is_empty")]
    pub selected_criteria: CriteriaSet,
    /// Question record this node was imported from. Re-exported with a fresh title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionRecord>,
    /// Extra node-record fields, re-emitted verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

/// A node on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: Position,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: NodeData,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        FlowNode {
            id: NodeId::new(id),
            kind,
            position: Position::default(),
            data: NodeData {
                label: label.into(),
                ..NodeData::default()
            },
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn with_criterion(mut self, criterion: CriterionRef) -> Self {
        self.data.selected_criteria.insert(criterion);
        self
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }
}

/// Payload of an edge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeData {
    pub label: String,
    /// `None` means the edge never carried criteria; kept distinct from an empty set.
    pub selected_criteria: Option<CriteriaSet>,
    /// Extra edge-record fields, re-emitted verbatim.
    pub fields: Map<String, Value>,
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NativeEdge", into = "NativeEdge")]
pub struct FlowEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: String,
    pub animated: bool,
    pub data: EdgeData,
}

impl FlowEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        FlowEdge {
            id: EdgeId::new(id),
            source: NodeId::new(source),
            target: NodeId::new(target),
            edge_type: DEFAULT_EDGE_TYPE.to_string(),
            animated: true,
            data: EdgeData::default(),
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.data.label = label.into();
        self
    }

    /// Attach a criterion; the edge label follows the first criterion when it was blank.
    pub fn with_criterion(mut self, criterion: CriterionRef) -> Self {
        if self.data.label.is_empty() {
            self.data.label = criterion.label.clone();
        }
        self.data
            .selected_criteria
            .get_or_insert_with(CriteriaSet::new)
            .insert(criterion);
        self
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    /// Criteria attached to this edge, empty when none were ever set.
    pub fn criteria(&self) -> impl Iterator<Item = &CriterionRef> {
        self.data.selected_criteria.iter().flat_map(|set| set.iter())
    }
}

/// Editor-side edge shape. The label may live at the top level, in `data`, or both.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NativeEdge {
    id: EdgeId,
    source: NodeId,
    target: NodeId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    animated: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    data: NativeEdgeData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeEdgeData {
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_criteria: Option<CriteriaSet>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

impl From<NativeEdge> for FlowEdge {
    fn from(raw: NativeEdge) -> Self {
        let label = raw.data.label.or(raw.label).unwrap_or_default();
        FlowEdge {
            id: raw.id,
            source: raw.source,
            target: raw.target,
            edge_type: raw
                .edge_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_EDGE_TYPE.to_string()),
            animated: raw.animated.unwrap_or(true),
            data: EdgeData {
                label,
                selected_criteria: raw.data.selected_criteria.filter(|set| !set.is_empty()),
                fields: raw.data.fields,
            },
        }
    }
}

impl From<FlowEdge> for NativeEdge {
    fn from(edge: FlowEdge) -> Self {
        NativeEdge {
            id: edge.id,
            source: edge.source,
            target: edge.target,
            edge_type: Some(edge.edge_type),
            animated: Some(edge.animated),
            label: Some(edge.data.label.clone()),
            data: NativeEdgeData {
                label: Some(edge.data.label),
                selected_criteria: edge.data.selected_criteria,
                fields: edge.data.fields,
            },
        }
    }
}

/// The editor's working graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: FlowNode) {
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, edge: FlowEdge) {
        self.edges.push(edge);
    }

    pub fn node(&self, id: &NodeId) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&FlowEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// The first start-typed node, if any.
    pub fn start_node(&self) -> Option<&FlowNode> {
        self.nodes_of_kind(NodeKind::Start).next()
    }

    pub fn has_start(&self) -> bool {
        self.start_node().is_some()
    }
}

/// Accept any JSON value where a string is expected; `null` becomes empty and
/// other non-strings are rendered as JSON text.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

/// Treat an explicit `null` like a missing value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
