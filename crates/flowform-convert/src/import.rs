//! Importer: record batch (or native graph) -> flow graph

use crate::config::{ConvertConfig, LayoutConfig};
use crate::error::{ConvertError, Result};
use crate::layout::{Layout, LayoutInferencer};
use flowform_core::{
    CriteriaCatalog, CriteriaSet, CriterionRef, EdgeData, EdgeId, EdgeRecord, EdgeTriggerCriteriaRecord, FlowEdge,
    FlowGraph, FlowNode, GraphFields, GraphRecord, NodeData, NodeId, NodeKind, NodeRecord, Partition, Pk, Position,
    QuestionRecord, RecordBatch, Topology, DEFAULT_EDGE_TYPE, strip_legacy_prefix,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Title fragments that mark a likely start node, matched case-insensitively.
const START_HINTS: [&str; 2] = ["start", "welcome"];

/// An imported graph together with the graph record it came from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportedFlow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<Pk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<GraphFields>,
    #[serde(flatten)]
    pub graph: FlowGraph,
}

impl ImportedFlow {
    /// Graph name from the source record, if it had a non-blank one.
    pub fn name(&self) -> Option<&str> {
        self.fields
            .as_ref()
            .map(|fields| fields.name.as_str())
            .filter(|name| !name.trim().is_empty())
    }

    /// The source graph record, when the input carried one.
    pub fn record(&self) -> Option<GraphRecord> {
        let pk = self.pk.clone()?;
        Some(GraphRecord {
            pk,
            fields: self.fields.clone().unwrap_or_default(),
        })
    }

    pub fn into_graph(self) -> FlowGraph {
        self.graph
    }
}

/// Rebuilds flow graphs from either accepted input shape.
pub struct Importer<'c> {
    layout: LayoutConfig,
    prefer_declared_start: bool,
    catalog: Option<&'c CriteriaCatalog>,
}

impl Importer<'static> {
    pub fn new() -> Self {
        Importer {
            layout: LayoutConfig::default(),
            prefer_declared_start: false,
            catalog: None,
        }
    }

    pub fn with_config(config: &ConvertConfig) -> Self {
        Importer {
            layout: config.layout.clone(),
            prefer_declared_start: config.prefer_declared_start,
            catalog: None,
        }
    }
}

impl Default for Importer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> Importer<'c> {
    /// Resolve tag choices and id-less criteria through `catalog`.
    pub fn with_catalog<'d>(self, catalog: &'d CriteriaCatalog) -> Importer<'d> {
        Importer {
            layout: self.layout,
            prefer_declared_start: self.prefer_declared_start,
            catalog: Some(catalog),
        }
    }

    pub fn import_str(&self, json: &str) -> Result<ImportedFlow> {
        let value: Value = serde_json::from_str(json)?;
        self.import_value(value)
    }

    /// Dispatch on shape: an object with `nodes` and `edges` arrays is a native
    /// graph, an array is a record batch.
    pub fn import_value(&self, value: Value) -> Result<ImportedFlow> {
        let native = matches!(
            &value,
            Value::Object(map) if map.get("nodes").is_some_and(Value::is_array)
                && map.get("edges").is_some_and(Value::is_array)
        );
        if native {
            return self.import_native(value);
        }
        if !value.is_array() {
            return Err(ConvertError::UnrecognizedShape);
        }
        let batch = RecordBatch::from_value(value)?;
        self.import_batch(&batch)
    }

    /// Normalize a graph already in the editor's own shape.
    pub fn import_native(&self, value: Value) -> Result<ImportedFlow> {
        let mut flow: ImportedFlow = serde_json::from_value(value)?;
        flow.pk = flow.pk.filter(|pk| !pk.is_empty());
        debug!(
            "Imported native graph: {} nodes, {} edges",
            flow.graph.nodes.len(),
            flow.graph.edges.len()
        );
        Ok(flow)
    }

    /// Rebuild a graph from relational records, inferring layout where none was saved.
    pub fn import_batch(&self, batch: &RecordBatch) -> Result<ImportedFlow> {
        let parts = batch.partition();
        if parts.nodes.is_empty() {
            return Err(ConvertError::EmptyBatch);
        }

        let questions: HashMap<&Pk, &QuestionRecord> = parts.questions.iter().map(|q| (&q.pk, *q)).collect();
        let criteria_by_edge = group_edge_criteria(&parts.edge_criteria);
        let node_criteria = self.node_criteria(&parts, &questions);

        let mut seen = HashSet::new();
        let nodes: Vec<&NodeRecord> = parts
            .nodes
            .iter()
            .copied()
            .filter(|node| {
                let fresh = seen.insert(node.pk.to_string());
                if !fresh {
                    warn!("Duplicate node record {}, keeping the first", node.pk);
                }
                fresh
            })
            .collect();

        let order: Vec<NodeId> = nodes.iter().map(|node| NodeId::new(node.pk.to_string())).collect();
        let mut topology = Topology::new();
        for id in &order {
            topology.add_node(id.clone());
        }
        for edge in &parts.edges {
            let label = branch_label(edge, &criteria_by_edge);
            topology.add_edge(&endpoint(&edge.fields.start), &endpoint(&edge.fields.end), &label);
        }

        let saved: HashMap<NodeId, Position> = nodes
            .iter()
            .filter_map(|node| Some((NodeId::new(node.pk.to_string()), node.saved_position()?)))
            .collect();
        let start = self.pick_start(parts.graph, &nodes, &questions, &order);
        let layout = LayoutInferencer::new(&self.layout).place(&topology, start.as_ref(), &order, &saved);
        if layout.inferred > 0 {
            debug!("Inferred {} of {} node positions", layout.inferred, order.len());
        }

        let mut graph = FlowGraph::new();
        for (record, id) in nodes.iter().zip(&order) {
            let question = record.fields.question.as_ref().and_then(|pk| questions.get(pk)).copied();
            if question.is_none() {
                warn!("Node {} has no matching question record", id);
            }
            graph.add_node(build_node(record, id, question, &layout, &node_criteria));
        }
        for record in &parts.edges {
            let label = display_label(record, &criteria_by_edge);
            let criteria = criteria_by_edge.get(&record.pk.to_string()).map(Vec::as_slice).unwrap_or(&[]);
            graph.add_edge(self.build_edge(record, label, criteria));
        }

        info!(
            "Imported graph with {} nodes and {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(ImportedFlow {
            pk: parts.graph.map(|g| g.pk.clone()).filter(|pk| !pk.is_empty()),
            fields: parts.graph.map(|g| g.fields.clone()),
            graph,
        })
    }

    fn pick_start(
        &self,
        declared: Option<&GraphRecord>,
        nodes: &[&NodeRecord],
        questions: &HashMap<&Pk, &QuestionRecord>,
        order: &[NodeId],
    ) -> Option<NodeId> {
        if self.prefer_declared_start {
            let declared = declared.map(|g| g.fields.start.as_str()).unwrap_or_default();
            if let Some(id) = order.iter().find(|id| id.as_str() == declared && !declared.is_empty()) {
                return Some(id.clone());
            }
        }

        let hinted = nodes.iter().zip(order).find(|(node, _)| {
            let title = node
                .fields
                .question
                .as_ref()
                .and_then(|pk| questions.get(pk))
                .map(|q| q.fields.title.to_lowercase())
                .unwrap_or_default();
            START_HINTS.iter().any(|hint| title.contains(hint))
        });
        match hinted {
            Some((_, id)) => Some(id.clone()),
            None => {
                debug!("No start-like question title, laying out from the first node record");
                order.first().cloned()
            }
        }
    }

    /// Node criteria from legacy node trigger criteria and from question tags.
    fn node_criteria(
        &self,
        parts: &Partition<'_>,
        questions: &HashMap<&Pk, &QuestionRecord>,
    ) -> HashMap<String, CriteriaSet> {
        let mut by_node: HashMap<String, CriteriaSet> = HashMap::new();
        for record in &parts.node_criteria {
            let Some(node) = record.fields.node.as_ref() else {
                continue;
            };
            by_node.entry(node.to_string()).or_default().insert(record.criterion());
        }

        let mut tags_by_question: HashMap<String, Vec<CriterionRef>> = HashMap::new();
        for tag in &parts.question_tags {
            let Some(question) = tag.fields.question.as_ref() else {
                continue;
            };
            let criterion = self
                .catalog
                .and_then(|catalog| catalog.resolve(&tag.fields.choice))
                .unwrap_or_else(|| CriterionRef::new(tag.pk.to_string(), &tag.fields.choice, &tag.fields.choice));
            tags_by_question.entry(question.to_string()).or_default().push(criterion);
        }
        for node in &parts.nodes {
            let Some(question) = node.fields.question.as_ref().filter(|pk| questions.contains_key(pk)) else {
                continue;
            };
            let Some(tags) = tags_by_question.get(&question.to_string()) else {
                continue;
            };
            let set = by_node.entry(node.pk.to_string()).or_default();
            for criterion in tags {
                set.insert(criterion.clone());
            }
        }
        by_node
    }

    fn build_edge(&self, record: &EdgeRecord, label: String, criteria: &[&EdgeTriggerCriteriaRecord]) -> FlowEdge {
        let layout = record.reactflow.clone().unwrap_or_default();
        let selected: CriteriaSet = criteria.iter().map(|c| self.edge_criterion(c)).collect();

        FlowEdge {
            id: EdgeId::new(record.pk.to_string()),
            source: endpoint(&record.fields.start),
            target: endpoint(&record.fields.end),
            edge_type: layout
                .edge_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_EDGE_TYPE.to_string()),
            animated: layout.animated.unwrap_or(true),
            data: EdgeData {
                label,
                selected_criteria: (!selected.is_empty()).then_some(selected),
                fields: record.fields.extra.clone(),
            },
        }
    }

    fn edge_criterion(&self, record: &EdgeTriggerCriteriaRecord) -> CriterionRef {
        let mut criterion = record.criterion();
        if record.fields.criterion_id.is_empty() {
            if let Some(found) = self.catalog.and_then(|catalog| catalog.resolve(&criterion.value)) {
                criterion.id = found.id;
            }
        }
        criterion
    }
}

fn group_edge_criteria<'a>(
    records: &[&'a EdgeTriggerCriteriaRecord],
) -> HashMap<String, Vec<&'a EdgeTriggerCriteriaRecord>> {
    let mut by_edge: HashMap<String, Vec<&'a EdgeTriggerCriteriaRecord>> = HashMap::new();
    for record in records {
        match record.fields.edge.as_ref() {
            Some(edge) => by_edge.entry(edge.to_string()).or_default().push(*record),
            None => warn!("Edge trigger criteria {} names no edge", record.pk),
        }
    }
    by_edge
}

/// First criterion choice of an edge, without the legacy prefix.
fn first_choice<'a>(
    edge: &EdgeRecord,
    criteria_by_edge: &'a HashMap<String, Vec<&EdgeTriggerCriteriaRecord>>,
) -> Option<&'a str> {
    criteria_by_edge
        .get(&edge.pk.to_string())
        .and_then(|list| list.first())
        .map(|first| strip_legacy_prefix(&first.fields.choice))
}

/// Label deciding the Yes/No split: the first criterion's choice, else the display label.
fn branch_label(edge: &EdgeRecord, criteria_by_edge: &HashMap<String, Vec<&EdgeTriggerCriteriaRecord>>) -> String {
    match first_choice(edge, criteria_by_edge) {
        Some(choice) => choice.to_string(),
        None => display_label(edge, criteria_by_edge),
    }
}

/// Display label of an edge: the saved canvas label, then the record's own
/// label, then its first criterion's choice.
fn display_label(edge: &EdgeRecord, criteria_by_edge: &HashMap<String, Vec<&EdgeTriggerCriteriaRecord>>) -> String {
    edge.reactflow
        .as_ref()
        .and_then(|layout| layout.label.clone())
        .filter(|label| !label.is_empty())
        .or_else(|| Some(edge.fields.label.clone()).filter(|label| !label.is_empty()))
        .or_else(|| first_choice(edge, criteria_by_edge).map(str::to_string))
        .unwrap_or_default()
}

fn endpoint(id: &Option<String>) -> NodeId {
    NodeId::new(id.clone().unwrap_or_default())
}

fn build_node(
    record: &NodeRecord,
    id: &NodeId,
    question: Option<&QuestionRecord>,
    layout: &Layout,
    criteria: &HashMap<String, CriteriaSet>,
) -> FlowNode {
    let kind = if question.is_some_and(QuestionRecord::is_dead_end) {
        NodeKind::End
    } else if layout.first_placed() == Some(id) {
        NodeKind::Start
    } else {
        NodeKind::Question
    };

    FlowNode {
        id: id.clone(),
        kind,
        position: layout.position(id).unwrap_or_default(),
        data: NodeData {
            label: question.map(|q| q.fields.title.clone()).unwrap_or_default(),
            selected_criteria: criteria.get(id.as_str()).cloned().unwrap_or_default(),
            question: question.cloned(),
            fields: record.fields.extra.clone(),
        },
    }
}

/// Import with default settings.
pub fn import(json: &str) -> Result<ImportedFlow> {
    Importer::new().import_str(json)
}
