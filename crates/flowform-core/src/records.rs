//! Record-side data structures: the flat, tagged relational format
//!
//! A record batch is a JSON array whose elements carry a `model`
//! discriminator, a primary key and a `fields` object. The discriminator
//! strings are fixed by the consuming system and must not change.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{FlowError, Result};
use crate::model::{CriterionRef, Position, lenient_opt_string, lenient_string};

/// Namespace prefixed to every model discriminator on the wire.
pub const MODEL_PREFIX: &str = "questionnaire.";

/// Status written on every exported graph record.
pub const GRAPH_STATUS_ACTIVE: &str = "active";

/// Prefix older exports put in front of trigger-criteria choices.
pub const LEGACY_CHOICE_PREFIX: &str = "Boolean ";

/// Closed set of model kinds found in record batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    QuestionnaireGraph,
    Node,
    Question,
    QuestionTag,
    Edge,
    EdgeTriggerCriteria,
    /// Read-only: produced by older exports, never written.
    NodeTriggerCriteria,
    // Known to the consuming system but not converted
    QuestionLabel,
    QuestionValidator,
    SubmissionAction,
}

impl ModelKind {
    pub const ALL: [ModelKind; 10] = [
        ModelKind::QuestionnaireGraph,
        ModelKind::Node,
        ModelKind::Question,
        ModelKind::QuestionTag,
        ModelKind::Edge,
        ModelKind::EdgeTriggerCriteria,
        ModelKind::NodeTriggerCriteria,
        ModelKind::QuestionLabel,
        ModelKind::QuestionValidator,
        ModelKind::SubmissionAction,
    ];

    /// Discriminator without the namespace prefix.
    pub fn short_name(self) -> &'static str {
        match self {
            ModelKind::QuestionnaireGraph => "questionnairegraph",
            ModelKind::Node => "node",
            ModelKind::Question => "question",
            ModelKind::QuestionTag => "questiontag",
            ModelKind::Edge => "edge",
            ModelKind::EdgeTriggerCriteria => "edgetriggercriteria",
            ModelKind::NodeTriggerCriteria => "nodetriggercriteria",
            ModelKind::QuestionLabel => "questionlabel",
            ModelKind::QuestionValidator => "questionvalidator",
            ModelKind::SubmissionAction => "questionnairegraphsubmissionaction",
        }
    }

    /// Full discriminator as written on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            ModelKind::QuestionnaireGraph => "questionnaire.questionnairegraph",
            ModelKind::Node => "questionnaire.node",
            ModelKind::Question => "questionnaire.question",
            ModelKind::QuestionTag => "questionnaire.questiontag",
            ModelKind::Edge => "questionnaire.edge",
            ModelKind::EdgeTriggerCriteria => "questionnaire.edgetriggercriteria",
            ModelKind::NodeTriggerCriteria => "questionnaire.nodetriggercriteria",
            ModelKind::QuestionLabel => "questionnaire.questionlabel",
            ModelKind::QuestionValidator => "questionnaire.questionvalidator",
            ModelKind::SubmissionAction => "questionnaire.questionnairegraphsubmissionaction",
        }
    }

    /// Parse a discriminator, with or without the namespace prefix.
    pub fn from_wire(model: &str) -> Option<Self> {
        let short = model.strip_prefix(MODEL_PREFIX).unwrap_or(model);
        ModelKind::ALL.into_iter().find(|kind| kind.short_name() == short)
    }

    /// Whether records of this kind are converted at all.
    pub fn is_supported(self) -> bool {
        !matches!(
            self,
            ModelKind::QuestionLabel | ModelKind::QuestionValidator | ModelKind::SubmissionAction
        )
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Primary key. The consuming system uses both integer and string keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pk {
    Int(i64),
    Str(String),
}

impl Pk {
    /// Integer key when `id` is a plain integer, otherwise the string itself.
    pub fn from_id(id: &str) -> Pk {
        match id.trim().parse::<i64>() {
            Ok(n) => Pk::Int(n),
            Err(_) => Pk::Str(id.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Pk::Int(n) => Some(*n),
            Pk::Str(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Pk::Str(s) if s.is_empty())
    }
}

impl Default for Pk {
    fn default() -> Self {
        Pk::Str(String::new())
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pk::Int(n) => write!(f, "{n}"),
            Pk::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Pk {
    fn from(s: &str) -> Self {
        Pk::Str(s.to_string())
    }
}

impl From<String> for Pk {
    fn from(s: String) -> Self {
        Pk::Str(s)
    }
}

impl From<i64> for Pk {
    fn from(n: i64) -> Self {
        Pk::Int(n)
    }
}

/// Question type. `DeadEnd` questions terminate the flow.
///
/// The exporter only ever synthesizes `Boolean` and `DeadEnd`; any other type
/// found on an imported question is kept as `Other` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    #[default]
    Boolean,
    DeadEnd,
    Other(String),
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::Boolean => "boolean",
            QuestionType::DeadEnd => "dead_end",
            QuestionType::Other(kind) => kind,
        }
    }
}

impl From<String> for QuestionType {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "" | "boolean" => QuestionType::Boolean,
            "dead_end" | "deadend" => QuestionType::DeadEnd,
            _ => QuestionType::Other(kind),
        }
    }
}

impl From<QuestionType> for String {
    fn from(kind: QuestionType) -> Self {
        match kind {
            QuestionType::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

fn lenient_question_type<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<QuestionType, D::Error> {
    lenient_string(deserializer).map(QuestionType::from)
}

/// A flag that defaults to `true` when missing or `null`.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) if text.eq_ignore_ascii_case("false") => false,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        _ => true,
    })
}

fn yes() -> bool {
    true
}

fn active() -> String {
    GRAPH_STATUS_ACTIVE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end: String,
    #[serde(default = "active")]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GraphFields {
    fn default() -> Self {
        GraphFields {
            name: String::new(),
            start: String::new(),
            end: String::new(),
            status: active(),
            extra: Map::new(),
        }
    }
}

/// The questionnaire graph itself. Always first in an exported batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphRecord {
    #[serde(default)]
    pub pk: Pk,
    #[serde(default)]
    pub fields: GraphFields,
}

impl GraphRecord {
    pub fn new(pk: impl Into<Pk>, name: impl Into<String>) -> Self {
        GraphRecord {
            pk: pk.into(),
            fields: GraphFields {
                name: name.into(),
                ..GraphFields::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeFields {
    #[serde(default)]
    pub question: Option<Pk>,
    #[serde(default)]
    pub parent_graph: Option<Pk>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Saved canvas layout of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLayout {
    pub positions: Position,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    pub pk: Pk,
    #[serde(default)]
    pub fields: NodeFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactflow: Option<NodeLayout>,
}

impl NodeRecord {
    pub fn saved_position(&self) -> Option<Position> {
        self.reactflow.map(|layout| layout.positions)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_question_type")]
    pub kind: QuestionType,
    #[serde(default = "yes", deserialize_with = "lenient_flag")]
    pub required: bool,
    #[serde(default = "yes", deserialize_with = "lenient_flag")]
    pub auto_next: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for QuestionFields {
    fn default() -> Self {
        QuestionFields {
            title: String::new(),
            kind: QuestionType::Boolean,
            required: true,
            auto_next: true,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub pk: Pk,
    #[serde(default)]
    pub fields: QuestionFields,
}

impl QuestionRecord {
    pub fn new(pk: impl Into<Pk>, title: impl Into<String>) -> Self {
        QuestionRecord {
            pk: pk.into(),
            fields: QuestionFields {
                title: title.into(),
                ..QuestionFields::default()
            },
        }
    }

    pub fn is_dead_end(&self) -> bool {
        self.fields.kind == QuestionType::DeadEnd
    }

    /// Turn this into a dead end. Dead ends never advance automatically.
    pub fn mark_dead_end(&mut self) {
        self.fields.kind = QuestionType::DeadEnd;
        self.fields.auto_next = false;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionTagFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub choice: String,
    #[serde(default)]
    pub question: Option<Pk>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One criterion attached to a question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionTagRecord {
    pub pk: Pk,
    #[serde(default)]
    pub fields: QuestionTagFields,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeFields {
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Saved rendering hints of an edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub pk: Pk,
    #[serde(default)]
    pub fields: EdgeFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactflow: Option<EdgeLayout>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeTriggerCriteriaFields {
    #[serde(default)]
    pub edge: Option<Pk>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub choice: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(rename = "criterionId", default, deserialize_with = "lenient_string")]
    pub criterion_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One criterion attached to an edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeTriggerCriteriaRecord {
    pub pk: Pk,
    #[serde(default)]
    pub fields: EdgeTriggerCriteriaFields,
}

impl EdgeTriggerCriteriaRecord {
    pub fn criterion(&self) -> CriterionRef {
        criterion_from(&self.pk, &self.fields.criterion_id, &self.fields.value, &self.fields.choice)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeTriggerCriteriaFields {
    #[serde(default)]
    pub node: Option<Pk>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub choice: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(rename = "criterionId", default, deserialize_with = "lenient_string")]
    pub criterion_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One criterion attached directly to a node (older exports only).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeTriggerCriteriaRecord {
    pub pk: Pk,
    #[serde(default)]
    pub fields: NodeTriggerCriteriaFields,
}

impl NodeTriggerCriteriaRecord {
    pub fn criterion(&self) -> CriterionRef {
        criterion_from(&self.pk, &self.fields.criterion_id, &self.fields.value, &self.fields.choice)
    }
}

fn criterion_from(pk: &Pk, criterion_id: &str, value: &str, choice: &str) -> CriterionRef {
    CriterionRef {
        id: if criterion_id.is_empty() { pk.to_string() } else { criterion_id.to_string() },
        value: if value.is_empty() { choice.to_string() } else { value.to_string() },
        label: choice.to_string(),
    }
}

/// Strip the legacy "Boolean " prefix from a trigger-criteria choice.
pub fn strip_legacy_prefix(choice: &str) -> &str {
    choice.strip_prefix(LEGACY_CHOICE_PREFIX).unwrap_or(choice)
}

/// A single typed record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Graph(GraphRecord),
    Node(NodeRecord),
    Question(QuestionRecord),
    QuestionTag(QuestionTagRecord),
    Edge(EdgeRecord),
    EdgeTriggerCriteria(EdgeTriggerCriteriaRecord),
    NodeTriggerCriteria(NodeTriggerCriteriaRecord),
}

impl Record {
    pub fn kind(&self) -> ModelKind {
        match self {
            Record::Graph(_) => ModelKind::QuestionnaireGraph,
            Record::Node(_) => ModelKind::Node,
            Record::Question(_) => ModelKind::Question,
            Record::QuestionTag(_) => ModelKind::QuestionTag,
            Record::Edge(_) => ModelKind::Edge,
            Record::EdgeTriggerCriteria(_) => ModelKind::EdgeTriggerCriteria,
            Record::NodeTriggerCriteria(_) => ModelKind::NodeTriggerCriteria,
        }
    }

    pub fn pk(&self) -> &Pk {
        match self {
            Record::Graph(r) => &r.pk,
            Record::Node(r) => &r.pk,
            Record::Question(r) => &r.pk,
            Record::QuestionTag(r) => &r.pk,
            Record::Edge(r) => &r.pk,
            Record::EdgeTriggerCriteria(r) => &r.pk,
            Record::NodeTriggerCriteria(r) => &r.pk,
        }
    }

    /// Decode one element of a batch.
    ///
    /// Returns `Ok(None)` for kinds that are recognised but not converted and
    /// for unknown discriminators.
    pub fn from_value(index: usize, value: Value) -> Result<Option<Record>> {
        let model = value
            .get("model")
            .and_then(Value::as_str)
            .ok_or(FlowError::MissingModel(index))?;

        let Some(kind) = ModelKind::from_wire(model) else {
            warn!("Skipping record {} with unknown model '{}'", index, model);
            return Ok(None);
        };

        fn decode<T: serde::de::DeserializeOwned>(kind: ModelKind, value: Value) -> Result<T> {
            serde_json::from_value(value).map_err(|source| FlowError::MalformedRecord {
                kind: kind.short_name(),
                source,
            })
        }

        let record = match kind {
            ModelKind::QuestionnaireGraph => Record::Graph(decode(kind, value)?),
            ModelKind::Node => Record::Node(decode(kind, value)?),
            ModelKind::Question => Record::Question(decode(kind, value)?),
            ModelKind::QuestionTag => Record::QuestionTag(decode(kind, value)?),
            ModelKind::Edge => Record::Edge(decode(kind, value)?),
            ModelKind::EdgeTriggerCriteria => Record::EdgeTriggerCriteria(decode(kind, value)?),
            ModelKind::NodeTriggerCriteria => Record::NodeTriggerCriteria(decode(kind, value)?),
            ModelKind::QuestionLabel | ModelKind::QuestionValidator | ModelKind::SubmissionAction => {
                debug!("Skipping unsupported {} record at index {}", kind, index);
                return Ok(None);
            }
        };
        Ok(Some(record))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T> {
            model: &'static str,
            #[serde(flatten)]
            record: &'a T,
        }

        let model = self.kind().wire_name();
        match self {
            Record::Graph(record) => Tagged { model, record }.serialize(serializer),
            Record::Node(record) => Tagged { model, record }.serialize(serializer),
            Record::Question(record) => Tagged { model, record }.serialize(serializer),
            Record::QuestionTag(record) => Tagged { model, record }.serialize(serializer),
            Record::Edge(record) => Tagged { model, record }.serialize(serializer),
            Record::EdgeTriggerCriteria(record) => Tagged { model, record }.serialize(serializer),
            Record::NodeTriggerCriteria(record) => Tagged { model, record }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Record::from_value(0, value)
            .map_err(D::Error::custom)?
            .ok_or_else(|| D::Error::custom("record kind is not converted"))
    }
}

/// Borrowed view of a batch, grouped by model kind. Input order is kept within each group.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub graph: Option<&'a GraphRecord>,
    pub nodes: Vec<&'a NodeRecord>,
    pub questions: Vec<&'a QuestionRecord>,
    pub question_tags: Vec<&'a QuestionTagRecord>,
    pub edges: Vec<&'a EdgeRecord>,
    pub edge_criteria: Vec<&'a EdgeTriggerCriteriaRecord>,
    pub node_criteria: Vec<&'a NodeTriggerCriteriaRecord>,
}

/// Ordered list of records, as exchanged with the consuming system.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct RecordBatch {
    records: Vec<Record>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count_of(&self, kind: ModelKind) -> usize {
        self.records.iter().filter(|r| r.kind() == kind).count()
    }

    /// Parse a batch from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Build a batch from a JSON array. Records that cannot be decoded are
    /// skipped with a warning; only a non-array top level is an error.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(FlowError::NotABatch);
        };

        let mut batch = RecordBatch::new();
        for (index, item) in items.into_iter().enumerate() {
            match Record::from_value(index, item) {
                Ok(Some(record)) => batch.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping record {}: {}", index, e),
            }
        }
        debug!("Decoded {} records", batch.len());
        Ok(batch)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Group records by kind. The first graph record wins if several are present.
    pub fn partition(&self) -> Partition<'_> {
        let mut parts = Partition::default();
        for record in &self.records {
            match record {
                Record::Graph(r) => {
                    if parts.graph.is_none() {
                        parts.graph = Some(r);
                    } else {
                        warn!("Ignoring additional graph record {}", r.pk);
                    }
                }
                Record::Node(r) => parts.nodes.push(r),
                Record::Question(r) => parts.questions.push(r),
                Record::QuestionTag(r) => parts.question_tags.push(r),
                Record::Edge(r) => parts.edges.push(r),
                Record::EdgeTriggerCriteria(r) => parts.edge_criteria.push(r),
                Record::NodeTriggerCriteria(r) => parts.node_criteria.push(r),
            }
        }
        parts
    }
}

impl FromIterator<Record> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        RecordBatch {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
