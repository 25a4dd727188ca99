use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error};

use crate::concept::ConceptId;
use crate::errors::{GraphError, GraphResult};
use crate::graph::ConceptGraph;

/// Aggregate statistics for one node, computed once per dataset.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    pub child_ids: Vec<ConceptId>,
    pub has_children: bool,
    pub child_count: usize,
    /// Every node below this one, deduplicated.
    pub descendants: BTreeSet<ConceptId>,
    pub descendant_count: usize,
    /// Height of the subtree, 0 for leaves.
    pub levels_below: usize,
    /// Descendant record count: own `total_cnt` plus that of every descendant.
    /// Saturates at `u64::MAX`.
    pub drc: u64,
}

impl NodeAttributes {
    fn leaf(total_cnt: u64) -> Self {
        Self {
            child_ids: Vec::new(),
            has_children: false,
            child_count: 0,
            descendants: BTreeSet::new(),
            descendant_count: 0,
            levels_below: 0,
            drc: total_cnt,
        }
    }
}

/// Attribute records by concept id. A node reached through several parents
/// has a single shared record.
pub type AttributeMap = HashMap<ConceptId, Arc<NodeAttributes>>;

/// Post-order aggregation from every root.
///
/// Fails with `CycleDetected` if a node is re-entered while it is still on
/// the traversal stack, or if some node is unreachable from the roots (which
/// in a graph whose roots were computed from in-degrees only happens inside a
/// cycle).
pub fn compute_attributes(graph: &ConceptGraph, roots: &[ConceptId]) -> GraphResult<AttributeMap> {
    let mut aggregator = Aggregator {
        graph,
        computed: HashMap::with_capacity(graph.node_count()),
        on_stack: HashSet::new(),
        stack: Vec::new(),
    };

    for root in roots {
        if graph.contains(root.as_str()) {
            aggregator.visit(root)?;
        } else {
            debug!("Skipping root '{}' which is not in the graph", root);
        }
    }

    if aggregator.computed.len() < graph.node_count() {
        let unreached: Vec<String> = graph
            .node_ids()
            .filter(|id| !aggregator.computed.contains_key(*id))
            .take(10)
            .map(|id| id.to_string())
            .collect();
        error!("Nodes unreachable from any root: {}", unreached.join(", "));
        return Err(GraphError::CycleDetected(format!(
            "nodes unreachable from any root: {}",
            unreached.join(", ")
        )));
    }

    debug!("Computed attributes for {} nodes", aggregator.computed.len());
    Ok(aggregator.computed)
}

struct Aggregator<'a> {
    graph: &'a ConceptGraph,
    computed: AttributeMap,
    on_stack: HashSet<ConceptId>,
    stack: Vec<ConceptId>,
}

impl Aggregator<'_> {
    fn visit(&mut self, id: &ConceptId) -> GraphResult<Arc<NodeAttributes>> {
        if let Some(attrs) = self.computed.get(id) {
            return Ok(attrs.clone());
        }
        if self.on_stack.contains(id) {
            let start = self.stack.iter().position(|s| s == id).unwrap_or(0);
            let mut path: Vec<String> = self.stack[start..].iter().map(|s| s.to_string()).collect();
            path.push(id.to_string());
            error!("Cycle detected during aggregation: {}", path.join(" -> "));
            return Err(GraphError::CycleDetected(path.join(" -> ")));
        }

        let node = self
            .graph
            .node(id.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let total_cnt = node.total_cnt;
        let child_ids = self.graph.out_neighbors(id.as_str());

        let attrs = if child_ids.is_empty() {
            NodeAttributes::leaf(total_cnt)
        } else {
            self.on_stack.insert(id.clone());
            self.stack.push(id.clone());

            let mut descendants = BTreeSet::new();
            let mut max_child_levels = 0;
            for child in &child_ids {
                let child_attrs = self.visit(child)?;
                descendants.extend(child_attrs.descendants.iter().cloned());
                max_child_levels = max_child_levels.max(child_attrs.levels_below);
            }
            descendants.extend(child_ids.iter().cloned());

            self.stack.pop();
            self.on_stack.remove(id);

            let drc = descendants
                .iter()
                .filter_map(|d| self.graph.node(d.as_str()))
                .fold(total_cnt, |sum, n| sum.saturating_add(n.total_cnt));

            NodeAttributes {
                has_children: true,
                child_count: child_ids.len(),
                descendant_count: descendants.len(),
                levels_below: max_child_levels + 1,
                drc,
                child_ids,
                descendants,
            }
        };

        let attrs = Arc::new(attrs);
        self.computed.insert(id.clone(), attrs.clone());
        Ok(attrs)
    }
}
