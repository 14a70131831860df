//! Exporter: flow graph -> relational record batch
//!
//! The batch starts with the graph record, followed by node, question and
//! question-tag records per node (input order), then edge and
//! trigger-criteria records per edge (input order).

use crate::error::Result;
use crate::pk::{PkGenerator, RandomPks};
use flowform_core::{
    CriteriaCatalog, CriterionRef, EdgeFields, EdgeLayout, EdgeRecord, EdgeTriggerCriteriaFields,
    EdgeTriggerCriteriaRecord, FlowEdge, FlowGraph, FlowNode, GraphRecord, NodeFields, NodeKind, NodeLayout,
    NodeRecord, Pk, QuestionRecord, QuestionTagFields, QuestionTagRecord, Record, RecordBatch,
};
use serde_json::Map;
use tracing::{debug, warn};

/// Node-record keys computed by the exporter; passthrough values never override them.
const NODE_OWNED_FIELDS: [&str; 2] = ["question", "parent_graph"];

/// Edge-record keys computed by the exporter.
const EDGE_OWNED_FIELDS: [&str; 3] = ["start", "end", "label"];

/// Converts flow graphs into record batches.
pub struct Exporter<'c, G = RandomPks> {
    pks: G,
    embed_layout: bool,
    catalog: Option<&'c CriteriaCatalog>,
}

impl Exporter<'static, RandomPks> {
    pub fn new() -> Self {
        Exporter {
            pks: RandomPks::new(),
            embed_layout: false,
            catalog: None,
        }
    }
}

impl Default for Exporter<'static, RandomPks> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c, G: PkGenerator> Exporter<'c, G> {
    /// Use a different key source.
    pub fn with_pks<H: PkGenerator>(self, pks: H) -> Exporter<'c, H> {
        Exporter {
            pks,
            embed_layout: self.embed_layout,
            catalog: self.catalog,
        }
    }

    /// Fill in blank criterion labels, values and ids from `catalog`.
    pub fn with_catalog<'d>(self, catalog: &'d CriteriaCatalog) -> Exporter<'d, G> {
        Exporter {
            pks: self.pks,
            embed_layout: self.embed_layout,
            catalog: Some(catalog),
        }
    }

    /// Write node positions and edge rendering hints into `reactflow` payloads.
    pub fn embed_layout(mut self, embed: bool) -> Self {
        self.embed_layout = embed;
        self
    }

    /// Convert nodes and edges into a batch. Never fails; empty input yields
    /// a batch holding only the graph record.
    pub fn export(&mut self, name: &str, nodes: &[FlowNode], edges: &[FlowEdge]) -> RecordBatch {
        let mut graph = GraphRecord::new(self.pks.uuid(), name);
        let mut body = Vec::with_capacity(nodes.len() * 2 + edges.len());

        for node in nodes {
            self.convert_node(node, &mut graph, &mut body);
        }
        for edge in edges {
            self.convert_edge(edge, &mut body);
        }

        debug!(
            "Exported '{}': {} nodes, {} edges, {} records",
            name,
            nodes.len(),
            edges.len(),
            body.len() + 1
        );
        std::iter::once(Record::Graph(graph)).chain(body).collect()
    }

    pub fn export_graph(&mut self, name: &str, graph: &FlowGraph) -> RecordBatch {
        self.export(name, &graph.nodes, &graph.edges)
    }

    /// Export and serialize as a pretty-printed JSON array.
    pub fn export_json(&mut self, name: &str, nodes: &[FlowNode], edges: &[FlowEdge]) -> Result<String> {
        Ok(self.export(name, nodes, edges).to_json_pretty()?)
    }

    fn convert_node(&mut self, node: &FlowNode, graph: &mut GraphRecord, out: &mut Vec<Record>) {
        let question = self.question_for(node);

        let mut extra = node.data.fields.clone();
        for key in NODE_OWNED_FIELDS {
            extra.remove(key);
        }
        let record = NodeRecord {
            pk: Pk::Str(node.id.to_string()),
            fields: NodeFields {
                question: Some(question.pk.clone()),
                parent_graph: Some(graph.pk.clone()),
                extra,
            },
            reactflow: self.embed_layout.then_some(NodeLayout {
                positions: node.position,
            }),
        };

        match node.kind {
            NodeKind::Start => graph.fields.start = node.id.to_string(),
            NodeKind::End => {
                if !graph.fields.end.is_empty() {
                    debug!("End node {} replaces {} in the graph record", node.id, graph.fields.end);
                }
                graph.fields.end = node.id.to_string();
            }
            NodeKind::Question => {}
        }

        let mut tags = Vec::with_capacity(node.data.selected_criteria.len());
        for criterion in &node.data.selected_criteria {
            let criterion = self.resolve(criterion);
            tags.push(Record::QuestionTag(QuestionTagRecord {
                pk: Pk::Int(self.pks.numeric()),
                fields: QuestionTagFields {
                    choice: criterion.label,
                    question: Some(question.pk.clone()),
                    extra: Map::new(),
                },
            }));
        }

        out.push(Record::Node(record));
        out.push(Record::Question(question));
        out.extend(tags);
    }

    /// Reuse the question carried from a prior import, or start a new one.
    fn question_for(&mut self, node: &FlowNode) -> QuestionRecord {
        let mut question = match &node.data.question {
            Some(prior) => {
                let mut question = prior.clone();
                if question.pk.is_empty() {
                    question.pk = Pk::Str(self.pks.uuid());
                }
                if !node.data.label.is_empty() {
                    question.fields.title = node.data.label.clone();
                }
                question
            }
            None => QuestionRecord::new(self.pks.uuid(), node.data.label.clone()),
        };

        if node.kind == NodeKind::End || question.is_dead_end() {
            question.mark_dead_end();
        }
        question
    }

    fn convert_edge(&mut self, edge: &FlowEdge, out: &mut Vec<Record>) {
        let pk = Pk::from_id(edge.id.as_str());

        let mut extra = edge.data.fields.clone();
        for key in EDGE_OWNED_FIELDS {
            extra.remove(key);
        }
        out.push(Record::Edge(EdgeRecord {
            pk: pk.clone(),
            fields: EdgeFields {
                start: Some(edge.source.to_string()),
                end: Some(edge.target.to_string()),
                label: edge.data.label.clone(),
                extra,
            },
            reactflow: self.embed_layout.then(|| EdgeLayout {
                animated: Some(edge.animated),
                edge_type: Some(edge.edge_type.clone()),
                label: None,
            }),
        }));

        let Some(criteria) = edge.data.selected_criteria.as_ref().filter(|set| !set.is_empty()) else {
            return;
        };
        if pk.as_int().is_none() {
            warn!("Edge id '{}' is not numeric; its trigger criteria reference it as a string", edge.id);
        }
        for criterion in criteria {
            let criterion = self.resolve(criterion);
            out.push(Record::EdgeTriggerCriteria(EdgeTriggerCriteriaRecord {
                pk: Pk::Int(self.pks.numeric()),
                fields: EdgeTriggerCriteriaFields {
                    edge: Some(pk.clone()),
                    choice: criterion.label,
                    value: criterion.value,
                    criterion_id: criterion.id,
                    extra: Map::new(),
                },
            }));
        }
    }

    /// Complete a criterion's blank parts from the catalog.
    fn resolve(&self, criterion: &CriterionRef) -> CriterionRef {
        let mut resolved = criterion.clone();
        let complete = !resolved.id.is_empty() && !resolved.value.is_empty() && !resolved.label.is_empty();
        if complete {
            return resolved;
        }
        let Some(found) = self.catalog.and_then(|catalog| {
            catalog
                .resolve(&criterion.id)
                .or_else(|| catalog.resolve(&criterion.value))
                .or_else(|| catalog.resolve(&criterion.label))
        })
        else {
            return resolved;
        };
        if resolved.id.is_empty() {
            resolved.id = found.id;
        }
        if resolved.value.is_empty() {
            resolved.value = found.value;
        }
        if resolved.label.is_empty() {
            resolved.label = found.label;
        }
        resolved
    }
}

/// Export with random keys and no layout payload.
pub fn export(name: &str, nodes: &[FlowNode], edges: &[FlowEdge]) -> Result<String> {
    Exporter::new().export_json(name, nodes, edges)
}
