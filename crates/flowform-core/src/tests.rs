//! Unit tests for flowform-core

use crate::test_utils::*;
use crate::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_criteria_set_dedupes_by_value() {
    let mut set = CriteriaSet::new();
    assert!(set.insert(criterion("1", "yes", "Yes")));
    assert!(!set.insert(criterion("2", "yes", "Yes again")));
    assert!(set.insert(criterion("3", "no", "No")));

    assert_eq!(set.len(), 2);
    assert_eq!(set.labels(), vec!["Yes", "No"]);

    assert_eq!(set.remove_value("yes").map(|c| c.id), Some("1".to_string()));
    assert_eq!(set.labels(), vec!["No"]);
}

#[test]
fn test_criteria_set_deserialize_drops_duplicates() {
    let set: CriteriaSet = serde_json::from_value(json!([
        {"id": "1", "value": "a", "label": "A"},
        {"id": "2", "value": "a", "label": "A"},
        {"id": 3, "value": "b", "label": "B"}
    ]))
    .unwrap();

    assert_eq!(set.len(), 2);
    assert_eq!(set.iter().nth(1).map(|c| c.id.as_str()), Some("3"));
}

#[test]
fn test_node_kind_from_editor_types() {
    let cases = vec![
        ("start", NodeKind::Start),
        ("end", NodeKind::End),
        ("text", NodeKind::Question),
        ("question", NodeKind::Question),
        ("input", NodeKind::Question),
    ];

    for (name, expected) in cases {
        assert_eq!(NodeKind::from(name.to_string()), expected, "Failed for {}", name);
    }
    assert_eq!(serde_json::to_value(NodeKind::Question).unwrap(), json!("text"));
}

#[test]
fn test_native_edge_label_normalization() {
    let edges: Vec<FlowEdge> = serde_json::from_value(json!([
        {"id": "1", "source": "a", "target": "b", "data": {"label": "from data"}, "label": "top"},
        {"id": "2", "source": "a", "target": "c", "label": "top only"},
        {"id": "3", "source": "b", "target": "c"}
    ]))
    .unwrap();

    assert_eq!(edges[0].label(), "from data");
    assert_eq!(edges[1].label(), "top only");
    assert_eq!(edges[2].label(), "");
    assert!(edges.iter().all(|e| e.edge_type == DEFAULT_EDGE_TYPE && e.animated));
}

#[test]
fn test_native_edge_keeps_explicit_type_and_animation() {
    let edge: FlowEdge = serde_json::from_value(json!({
        "id": "7", "source": "a", "target": "b", "type": "curvedEdge", "animated": false,
        "data": {"label": "Yes", "selectedCriteria": [], "fields": {"weight": 2}}
    }))
    .unwrap();

    assert_eq!(edge.edge_type, "curvedEdge");
    assert!(!edge.animated);
    assert!(edge.data.selected_criteria.is_none());
    assert_eq!(edge.data.fields.get("weight"), Some(&json!(2)));
}

#[test]
fn test_flow_edge_serializes_both_labels() {
    let edge = FlowEdge::new("1", "a", "b").labeled("Yes");
    let value = serde_json::to_value(&edge).unwrap();

    assert_eq!(value["label"], json!("Yes"));
    assert_eq!(value["data"]["label"], json!("Yes"));
    assert_eq!(value["type"], json!(DEFAULT_EDGE_TYPE));
    assert!(value["data"].get("selectedCriteria").is_none());
}

#[test]
fn test_node_label_accepts_non_string() {
    let node: FlowNode = serde_json::from_value(json!({
        "id": "n1", "type": "text", "position": {"x": 1.5, "y": 2.0},
        "data": {"label": null}
    }))
    .unwrap();

    assert_eq!(node.label(), "");
    assert_eq!(node.position, Position::new(1.5, 2.0));
}

#[test]
fn test_native_shape_tolerates_null_data_and_numeric_ids() {
    let graph: FlowGraph = serde_json::from_value(json!({
        "nodes": [
            {"id": 1, "type": "start", "position": null, "data": null},
            {"id": "2", "type": "end", "position": {"x": 0, "y": 200}, "data": {"label": "Bye"}}
        ],
        "edges": [
            {"id": 10, "source": 1, "target": "2", "data": null, "label": "L"}
        ]
    }))
    .unwrap();

    assert_eq!(graph.nodes[0].id, NodeId::from("1"));
    assert_eq!(graph.nodes[0].label(), "");
    assert_eq!(graph.nodes[0].position, Position::default());

    let edge = &graph.edges[0];
    assert_eq!(edge.id, EdgeId::from("10"));
    assert_eq!(edge.source, NodeId::from("1"));
    assert_eq!(edge.label(), "L");
    assert!(edge.data.selected_criteria.is_none());
}

#[test]
fn test_model_kind_wire_names() {
    assert_eq!(ModelKind::QuestionnaireGraph.wire_name(), "questionnaire.questionnairegraph");
    assert_eq!(ModelKind::EdgeTriggerCriteria.wire_name(), "questionnaire.edgetriggercriteria");
    assert_eq!(ModelKind::QuestionTag.wire_name(), "questionnaire.questiontag");

    for kind in ModelKind::ALL {
        assert_eq!(ModelKind::from_wire(kind.wire_name()), Some(kind));
        assert_eq!(ModelKind::from_wire(kind.short_name()), Some(kind));
    }
    assert_eq!(ModelKind::from_wire("questionnaire.unknown"), None);
    assert!(!ModelKind::QuestionValidator.is_supported());
}

#[test]
fn test_pk_from_id() {
    assert_eq!(Pk::from_id("42"), Pk::Int(42));
    assert_eq!(Pk::from_id("xy-edge__a-b"), Pk::Str("xy-edge__a-b".to_string()));
    assert_eq!(Pk::Int(7).to_string(), "7");
    assert!(Pk::default().is_empty());
}

#[test]
fn test_record_serializes_model_tag_first() {
    let record = Record::Question(QuestionRecord::new("q1", "Welcome"));
    let json = serde_json::to_string(&record).unwrap();

    assert!(json.starts_with(r#"{"model":"questionnaire.question","pk":"q1""#));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["fields"]["type"], json!("boolean"));
    assert_eq!(value["fields"]["required"], json!(true));
    assert_eq!(value["fields"]["auto_next"], json!(true));
}

#[test]
fn test_unknown_question_type_is_kept_verbatim() {
    let record: QuestionRecord = serde_json::from_value(json!({
        "pk": "q9",
        "fields": {"title": "Pick one", "type": "multiple_choice", "required": false, "auto_next": true}
    }))
    .unwrap();

    assert_eq!(record.fields.kind, QuestionType::Other("multiple_choice".to_string()));
    assert!(!record.is_dead_end());
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["fields"]["type"], json!("multiple_choice"));

    assert_eq!(QuestionType::from("deadend".to_string()), QuestionType::DeadEnd);
    assert_eq!(QuestionType::from("boolean".to_string()), QuestionType::Boolean);
}

#[test]
fn test_question_fields_tolerate_nulls() {
    let record: QuestionRecord = serde_json::from_value(json!({
        "pk": "q1",
        "fields": {"title": "Welcome", "type": null, "required": null, "auto_next": null}
    }))
    .unwrap();

    assert_eq!(record.fields.title, "Welcome");
    assert_eq!(record.fields.kind, QuestionType::Boolean);
    assert!(record.fields.required);
    assert!(record.fields.auto_next);

    let batch = RecordBatch::from_value(json!([
        {"model": "questionnaire.question", "pk": "q2", "fields": {"title": "Kept", "required": null}}
    ]))
    .unwrap();
    assert_eq!(batch.count_of(ModelKind::Question), 1);
}

#[test]
fn test_mark_dead_end_disables_auto_next() {
    let mut question = QuestionRecord::new("q", "Bye");
    question.mark_dead_end();

    assert!(question.is_dead_end());
    assert!(!question.fields.auto_next);
}

#[test]
fn test_batch_decoding_is_lenient() {
    let batch = RecordBatch::from_value(json!([
        {"model": "questionnaire.questionnairegraph", "pk": "g", "fields": {"name": "Demo"}},
        {"model": "questionnaire.node", "pk": "n1", "fields": {"question": "q1", "parent_graph": "g", "colour": "red"}},
        {"model": "questionnaire.question", "pk": "q1", "fields": {"title": "Welcome", "type": "boolean"}},
        {"model": "questionnaire.questionvalidator", "pk": 9, "fields": {}},
        {"model": "questionnaire.somethingnew", "pk": 10, "fields": {}},
        {"pk": 11},
        {"model": "questionnaire.edge", "pk": "broken", "fields": 5}
    ]))
    .unwrap();

    assert_eq!(batch.len(), 3);
    let parts = batch.partition();
    assert_eq!(parts.graph.map(|g| g.fields.name.as_str()), Some("Demo"));
    assert_eq!(parts.nodes.len(), 1);
    assert_eq!(parts.nodes[0].fields.extra.get("colour"), Some(&json!("red")));
    assert_eq!(parts.questions.len(), 1);
    assert!(parts.edges.is_empty());
}

#[test]
fn test_batch_rejects_non_array() {
    let err = RecordBatch::from_value(json!({"model": "questionnaire.node"})).unwrap_err();
    assert!(matches!(err, FlowError::NotABatch));

    let err = RecordBatch::from_json("[{").unwrap_err();
    assert!(matches!(err, FlowError::Json(_)));
}

#[test]
fn test_trigger_criteria_fallbacks() {
    let record: EdgeTriggerCriteriaRecord = serde_json::from_value(json!({
        "pk": 290_123, "fields": {"edge": 4, "choice": "Boolean Yes"}
    }))
    .unwrap();

    let criterion = record.criterion();
    assert_eq!(criterion.id, "290123");
    assert_eq!(criterion.value, "Boolean Yes");
    assert_eq!(strip_legacy_prefix(&criterion.label), "Yes");
    assert_eq!(record.fields.edge, Some(Pk::Int(4)));
}

#[test]
fn test_topology_children_in_insertion_order() {
    let graph = yes_no_flow();
    let topology = Topology::from_flow(&graph);

    let children: Vec<&str> = topology.children(&NodeId::from("n-smoker")).iter().map(|id| id.as_str()).collect();
    assert_eq!(children, vec!["n-former", "n-stop"]);
    assert_eq!(topology.edge_label(&NodeId::from("n-smoker"), &NodeId::from("n-stop")), Some("Yes"));
    assert_eq!(topology.in_degree(&NodeId::from("n-smoker")), 1);
}

#[test]
fn test_topology_skips_unknown_endpoints() {
    let mut topology = Topology::new();
    assert!(topology.add_node(NodeId::from("a")));
    assert!(!topology.add_node(NodeId::from("a")));
    assert!(!topology.add_edge(&NodeId::from("a"), &NodeId::from("ghost"), ""));
    assert_eq!(topology.edge_count(), 0);
}

#[test]
fn test_reachability_terminates_on_cycles() {
    let topology = Topology::from_flow(&cyclic_flow());
    let reached = topology.reachable_from(&NodeId::from("b"));
    assert_eq!(reached.len(), 3);
}

#[test]
fn test_check_graph_clean_flow() {
    assert!(check_graph(&yes_no_flow()).is_empty());
}

#[test]
fn test_check_graph_reports_issues() {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("a", NodeKind::Question, "A"));
    graph.add_node(FlowNode::new("b", NodeKind::End, "B"));
    graph.add_edge(FlowEdge::new("e9", "a", "missing"));

    let rendered = check_graph(&graph)
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(rendered, @r"
    graph has no start node
    edge e9 references a missing node
    ");
}

#[test]
fn test_check_graph_unreachable_and_multiple_ends() {
    let mut graph = yes_no_flow();
    graph.add_node(FlowNode::new("island", NodeKind::End, "Alone"));

    let issues = check_graph(&graph);
    assert!(issues.contains(&GraphIssue::MultipleEnds(2)));
    assert!(issues.contains(&GraphIssue::Unreachable(NodeId::from("island"))));
}

#[test]
fn test_catalog_crud_keeps_label_order() {
    let catalog = CriteriaCatalog::new();
    catalog.add(criterion("2", "yes", "Yes"));
    catalog.add(criterion("1", "no", "no"));
    let assigned = catalog.add(criterion("", "maybe", "Maybe"));

    assert!(!assigned.id.is_empty());
    let labels: Vec<String> = catalog.get_all().into_iter().map(|c| c.label).collect();
    assert_eq!(labels, vec!["Maybe", "no", "Yes"]);

    catalog.update(criterion("2", "yes", "Absolutely")).unwrap();
    assert_eq!(catalog.get("2").map(|c| c.label), Some("Absolutely".to_string()));
    assert!(matches!(
        catalog.update(criterion("404", "x", "X")),
        Err(FlowError::CriterionNotFound(_))
    ));

    assert!(catalog.delete("1").is_some());
    assert!(catalog.delete("1").is_none());
    assert_eq!(catalog.len(), 2);
}

#[test]
fn test_catalog_resolve_order() {
    let catalog = CriteriaCatalog::default_node_criteria();
    assert_eq!(catalog.len(), 26);

    assert_eq!(catalog.resolve("8").map(|c| c.value), Some("email".to_string()));
    assert_eq!(catalog.resolve("medicare").map(|c| c.id), Some("13".to_string()));
    assert_eq!(catalog.resolve("Smoking Status").map(|c| c.id), Some("20".to_string()));
    assert!(catalog.resolve("nothing").is_none());
    assert!(catalog.resolve("").is_none());
}

#[test]
fn test_catalog_listeners() {
    let catalog = CriteriaCatalog::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let subscription = catalog.subscribe(move |all| {
        seen.fetch_add(all.len(), Ordering::SeqCst);
    });

    catalog.add(criterion("1", "a", "A"));
    catalog.add(criterion("2", "b", "B"));
    assert_eq!(calls.load(Ordering::SeqCst), 1 + 2);

    assert!(catalog.unsubscribe(subscription));
    assert!(!catalog.unsubscribe(subscription));
    catalog.delete("1");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_catalog_json_round_trip() {
    let catalog = CriteriaCatalog::from_json(r#"[{"id": "5", "value": "v", "label": "L"}]"#).unwrap();
    let json = catalog.to_json_pretty().unwrap();
    let reloaded = CriteriaCatalog::from_json(&json).unwrap();
    assert_eq!(reloaded.get_all(), catalog.get_all());
}

#[test]
fn test_compare_identical_graphs() {
    let graph = yes_no_flow();
    assert!(compare(&graph, &graph.clone()).is_empty());
}

#[test]
fn test_compare_detects_changes() {
    let before = yes_no_flow();
    let mut after = before.clone();
    after.nodes[1].data.label = "Do you vape?".to_string();
    after.edges[2].data.selected_criteria = None;
    after.nodes.pop();

    let diff = compare(&before, &after);
    assert_eq!(diff.relabeled_nodes, vec![NodeId::from("n-smoker")]);
    assert_eq!(diff.edge_criteria_changed, vec![EdgeId::from("3")]);
    assert_eq!(diff.removed_nodes, vec![NodeId::from("n-stop")]);
    assert_eq!(diff.change_count(), 3);
}
