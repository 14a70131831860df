//! Test fixtures for conversion

use flowform_core::*;
use serde_json::{Value, json};

pub fn criterion(id: &str, value: &str, label: &str) -> CriterionRef {
    CriterionRef::new(id, value, label)
}

/// Welcome -> smoker? -> (No) ex-smoker? / (Yes) stop
pub fn yes_no_flow() -> FlowGraph {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("n-start", NodeKind::Start, "Welcome"));
    graph.add_node(
        FlowNode::new("n-smoker", NodeKind::Question, "Do you smoke?")
            .with_criterion(criterion("20", "observation_smoking", "Smoking Status")),
    );
    graph.add_node(FlowNode::new("n-former", NodeKind::Question, "Have you ever smoked?"));
    graph.add_node(FlowNode::new("n-stop", NodeKind::End, "Please see a doctor"));

    graph.add_edge(FlowEdge::new("1", "n-start", "n-smoker"));
    graph.add_edge(FlowEdge::new("2", "n-smoker", "n-former").with_criterion(criterion("b-no", "no", "No")));
    graph.add_edge(FlowEdge::new("3", "n-smoker", "n-stop").with_criterion(criterion("b-yes", "yes", "Yes")));
    graph
}

pub fn graph_record(pk: &str, name: &str) -> Value {
    json!({
        "model": "questionnaire.questionnairegraph",
        "pk": pk,
        "fields": {"name": name, "start": "", "end": "", "status": "active"}
    })
}

/// A node record plus its question record.
pub fn node_records(node: &str, question: &str, title: &str) -> [Value; 2] {
    [
        json!({
            "model": "questionnaire.node",
            "pk": node,
            "fields": {"question": question, "parent_graph": "g1"}
        }),
        json!({
            "model": "questionnaire.question",
            "pk": question,
            "fields": {"title": title, "type": "boolean", "required": true, "auto_next": true}
        }),
    ]
}

pub fn edge_record(pk: i64, start: &str, end: &str) -> Value {
    json!({
        "model": "questionnaire.edge",
        "pk": pk,
        "fields": {"start": start, "end": end, "label": ""}
    })
}

pub fn trigger_record(pk: i64, edge: i64, choice: &str) -> Value {
    json!({
        "model": "questionnaire.edgetriggercriteria",
        "pk": pk,
        "fields": {"edge": edge, "choice": choice, "value": choice.to_lowercase()}
    })
}

/// Two nodes ("Welcome" -> "Q1") joined by an edge with one "Yes" criterion.
pub fn welcome_batch() -> Value {
    let mut records = vec![graph_record("g1", "Intake")];
    records.extend(node_records("n1", "q1", "Welcome"));
    records.extend(node_records("n2", "q2", "Q1"));
    records.push(edge_record(1, "n1", "n2"));
    records.push(trigger_record(291001, 1, "Yes"));
    Value::Array(records)
}

/// Nodes without positions, in the given record order, joined by `edges`.
pub fn batch_of(nodes: &[(&str, &str)], edges: &[(i64, &str, &str)]) -> Value {
    let mut records = vec![graph_record("g1", "Test")];
    for (i, (id, title)) in nodes.iter().enumerate() {
        records.extend(node_records(id, &format!("q{i}"), title));
    }
    for (pk, start, end) in edges {
        records.push(edge_record(*pk, start, end));
    }
    Value::Array(records)
}
