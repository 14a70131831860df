//! Integration tests for Flowform
//!
//! These tests drive the exporter and importer together through JSON text,
//! the way a save/open cycle in the editor does.

use flowform_convert::{ConvertConfig, Exporter, Importer, SequentialPks, import};
use flowform_core::*;
use serde_json::{Value, json};

fn intake_flow() -> FlowGraph {
    let yes = CriterionRef::new("b-yes", "yes", "Yes");
    let no = CriterionRef::new("b-no", "no", "No");

    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("start", NodeKind::Start, "Welcome to the clinic").at(10.0, 10.0));
    graph.add_node(
        FlowNode::new("pregnant", NodeKind::Question, "Are you pregnant?")
            .at(10.0, 210.0)
            .with_criterion(CriterionRef::new("15", "pregnant", "Pregnant")),
    );
    graph.add_node(FlowNode::new("pill", NodeKind::Question, "Are you on the pill?").at(-290.0, 410.0));
    graph.add_node(FlowNode::new("refer", NodeKind::End, "Please call us").at(310.0, 410.0));
    graph.add_node(FlowNode::new("done", NodeKind::End, "Thank you").at(-290.0, 610.0));

    graph.add_edge(FlowEdge::new("1", "start", "pregnant"));
    graph.add_edge(FlowEdge::new("2", "pregnant", "pill").with_criterion(no.clone()));
    graph.add_edge(FlowEdge::new("3", "pregnant", "refer").with_criterion(yes.clone()));
    graph.add_edge(
        FlowEdge::new("4", "pill", "done")
            .with_criterion(yes)
            .with_criterion(no),
    );
    graph
}

/// Test a save/open/save cycle through JSON text
#[test]
fn test_save_open_save_is_stable() {
    let original = intake_flow();
    let first = Exporter::new().embed_layout(true).export_json("Intake", &original.nodes, &original.edges).unwrap();

    let opened = import(&first).unwrap();
    assert!(compare(&original, &opened.graph).is_empty());
    for node in &original.nodes {
        assert_eq!(opened.graph.node(&node.id).map(|n| n.position), Some(node.position));
    }

    let name = opened.name().unwrap().to_string();
    let second = Exporter::new().embed_layout(true).export_graph(&name, &opened.graph);
    let reopened = Importer::new().import_batch(&second).unwrap();
    assert!(compare(&opened.graph, &reopened.graph).is_empty());

    // Questions keep their identity across saves once imported
    let first_batch = RecordBatch::from_json(&first).unwrap();
    let question_pks = |batch: &RecordBatch| -> Vec<Pk> {
        batch.partition().questions.iter().map(|q| q.pk.clone()).collect()
    };
    assert_eq!(question_pks(&first_batch), question_pks(&second));
}

/// Test that a multi-criteria edge keeps every criterion
#[test]
fn test_multi_criteria_edge_survives() {
    let batch = Exporter::new()
        .with_pks(SequentialPks::new())
        .export_graph("Intake", &intake_flow());
    let parts = batch.partition();
    let for_edge_4 = parts
        .edge_criteria
        .iter()
        .filter(|c| c.fields.edge == Some(Pk::Int(4)))
        .count();
    assert_eq!(for_edge_4, 2);

    let flow = Importer::new().import_batch(&batch).unwrap();
    let edge = flow.graph.edge(&EdgeId::from("4")).unwrap();
    assert_eq!(edge.label(), "Yes");
    let labels: Vec<&str> = edge.criteria().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Yes", "No"]);
}

/// Test that a batch written by another tool, with legacy records, still opens
#[test]
fn test_legacy_batch_opens() {
    let batch = json!([
        {"model": "questionnaire.questionnairegraph", "pk": "g", "fields": {"name": "Legacy", "status": "active"}},
        {"model": "questionnaire.node", "pk": "n1", "fields": {"question": "q1", "parent_graph": "g"}},
        {"model": "questionnaire.question", "pk": "q1", "fields": {"title": "Start", "type": "boolean"}},
        {"model": "questionnaire.node", "pk": "n2", "fields": {"question": "q2", "parent_graph": "g"}},
        {"model": "questionnaire.question", "pk": "q2", "fields": {"title": "Stop", "type": "dead_end"}},
        {"model": "questionnaire.edge", "pk": 7, "fields": {"start": "n1", "end": "n2"}},
        {"model": "questionnaire.edgetriggercriteria", "pk": 291234, "fields": {"edge": 7, "choice": "Boolean No"}},
        {"model": "questionnaire.nodetriggercriteria", "pk": 3, "fields": {"node": "n1", "choice": "Allergies", "value": "allergies"}},
        {"model": "questionnaire.questionlabel", "pk": 4, "fields": {"text": "ignored"}},
        {"model": "questionnaire.questionnairegraphsubmissionaction", "pk": 5, "fields": {}}
    ]);

    let flow = Importer::new().import_value(batch).unwrap();
    assert_eq!(flow.name(), Some("Legacy"));
    assert_eq!(flow.graph.nodes[0].kind, NodeKind::Start);
    assert_eq!(flow.graph.nodes[1].kind, NodeKind::End);
    assert_eq!(flow.graph.nodes[1].position, Position::new(0.0, 200.0));
    assert_eq!(flow.graph.edges[0].label(), "No");
    assert_eq!(flow.graph.nodes[0].data.selected_criteria.labels(), vec!["Allergies"]);

    // Re-export writes a clean batch: the node criterion becomes a question tag
    let again = Exporter::new().export_graph("Legacy", &flow.graph);
    assert_eq!(again.count_of(ModelKind::NodeTriggerCriteria), 0);
    assert_eq!(again.count_of(ModelKind::QuestionTag), 1);
    let end = again.partition().questions[1].clone();
    assert!(end.is_dead_end());
    assert!(!end.fields.auto_next);
}

/// Test that a native graph export opens without a record batch
#[test]
fn test_native_graph_opens() {
    let original = intake_flow();
    let native: Value = serde_json::to_value(&original).unwrap();

    let flow = Importer::new().import_value(native).unwrap();
    assert_eq!(flow.graph, original);
}

/// Test that a config file drives import layout
#[test]
fn test_config_file_drives_layout() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("flowform.toml"), "[layout]\nspacing_y = 50.0\n").unwrap();
    let config = ConvertConfig::discover(dir.path()).unwrap();

    let batch = Exporter::new().export_graph("Intake", &intake_flow());
    let flow = Importer::with_config(&config).import_batch(&batch).unwrap();

    let pregnant = flow.graph.node(&NodeId::from("pregnant")).unwrap();
    assert_eq!(pregnant.position, Position::new(0.0, 50.0));
}
