use serde::Serialize;
use tracing::{debug, warn};

use crate::concept::{ConceptId, ConceptRecord};
use crate::graph::ConceptGraph;

/// Roots and leaves of a normalized graph.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RootSummary {
    /// Display roots in node insertion order, with the pseudo-root last.
    pub roots: Vec<ConceptId>,
    /// Nodes without children, computed before any pseudo-root was added.
    pub leaves: Vec<ConceptId>,
    /// Concepts with neither parents nor children.
    pub unlinked: Vec<ConceptId>,
    /// The synthetic root grouping `unlinked`, if any were found.
    pub unlinked_pseudo_root: Option<ConceptRecord>,
}

/// Find roots and leaves, regrouping fully disconnected concepts under a
/// single synthetic `unlinked` root.
pub fn normalize(graph: &mut ConceptGraph) -> RootSummary {
    let mut roots = Vec::new();
    let mut leaves = Vec::new();
    let mut unlinked = Vec::new();

    for id in graph.node_ids() {
        let is_root = graph.in_degree(id.as_str()) == 0;
        let is_leaf = graph.out_degree(id.as_str()) == 0;
        if is_leaf {
            leaves.push(id.clone());
        }
        if is_root && is_leaf {
            unlinked.push(id.clone());
        } else if is_root {
            roots.push(id.clone());
        }
    }

    if unlinked.is_empty() {
        return RootSummary {
            roots,
            leaves,
            unlinked,
            unlinked_pseudo_root: None,
        };
    }

    let pseudo_root = ConceptRecord::unlinked_pseudo_root();
    if !graph.add_node(pseudo_root.clone()) {
        warn!(
            "A concept already uses the id '{}'; leaving {} unlinked concepts as roots",
            pseudo_root.concept_id,
            unlinked.len()
        );
        let roots = graph
            .node_ids()
            .filter(|id| graph.in_degree(id.as_str()) == 0)
            .cloned()
            .collect();
        return RootSummary {
            roots,
            leaves,
            unlinked,
            unlinked_pseudo_root: None,
        };
    }

    for id in &unlinked {
        graph.add_edge(&pseudo_root.concept_id, id);
    }
    roots.push(pseudo_root.concept_id.clone());
    debug!(
        "Grouped {} unlinked concepts under '{}'",
        unlinked.len(),
        pseudo_root.concept_id
    );

    RootSummary {
        roots,
        leaves,
        unlinked,
        unlinked_pseudo_root: Some(pseudo_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::Edge;

    fn ids(values: &[&str]) -> Vec<ConceptId> {
        values.iter().map(|v| ConceptId::from(*v)).collect()
    }

    #[test]
    fn test_connected_graph_has_no_pseudo_root() {
        let mut graph = ConceptGraph::build(
            vec![
                ConceptRecord::new("1"),
                ConceptRecord::new("2"),
                ConceptRecord::new("3"),
            ],
            &[Edge::new("1", "2"), Edge::new("1", "3")],
        );
        let summary = normalize(&mut graph);
        assert_eq!(summary.roots, ids(&["1"]));
        assert_eq!(summary.leaves, ids(&["2", "3"]));
        assert!(summary.unlinked_pseudo_root.is_none());
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn test_orphans_are_grouped_under_unlinked() {
        let mut graph = ConceptGraph::build(
            vec![
                ConceptRecord::new("1"),
                ConceptRecord::new("2"),
                ConceptRecord::new("3"),
                ConceptRecord::new("4"),
            ],
            &[Edge::new("1", "2")],
        );
        let summary = normalize(&mut graph);
        assert_eq!(summary.roots, ids(&["1", "unlinked"]));
        assert_eq!(summary.unlinked, ids(&["3", "4"]));
        assert_eq!(summary.leaves, ids(&["2", "3", "4"]));
        assert_eq!(graph.out_neighbors("unlinked"), ids(&["3", "4"]));
        assert!(graph.node("unlinked").unwrap().not_a_concept);
    }

    #[test]
    fn test_id_collision_leaves_orphans_as_roots() {
        let mut graph = ConceptGraph::build(
            vec![ConceptRecord::new("unlinked"), ConceptRecord::new("2")],
            &[],
        );
        let summary = normalize(&mut graph);
        assert!(summary.unlinked_pseudo_root.is_none());
        assert_eq!(summary.roots, ids(&["unlinked", "2"]));
    }
}
