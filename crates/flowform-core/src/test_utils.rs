//! Test fixtures for flow graphs

use crate::model::*;

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

/// a -> b -> c -> a
pub fn cyclic_flow() -> FlowGraph {
    let mut graph = FlowGraph::new();
    graph.add_node(FlowNode::new("a", NodeKind::Start, "Start"));
    graph.add_node(FlowNode::new("b", NodeKind::Question, "B"));
    graph.add_node(FlowNode::new("c", NodeKind::Question, "C"));
    graph.add_edge(FlowEdge::new("1", "a", "b"));
    graph.add_edge(FlowEdge::new("2", "b", "c"));
    graph.add_edge(FlowEdge::new("3", "c", "a"));
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_no_flow_shape() {
        let graph = yes_no_flow();
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);
        assert_eq!(graph.start_node().map(|n| n.label()), Some("Welcome"));
        assert_eq!(graph.edges[1].label(), "No");
    }
}
