use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::concept::{ConceptId, ConceptRecord, Edge};

/// Directed concept hierarchy keyed by concept id.
///
/// petgraph's `Graph` works in terms of the `NodeIndex` values handed out by
/// `add_node`, so this wrapper keeps an id to index map alongside it and lets
/// callers speak in concept ids only. The graph is append-only: it is built
/// once per dataset and read from thereafter.
#[derive(Clone, Debug, Default)]
pub struct ConceptGraph {
    graph: DiGraph<ConceptRecord, ()>,
    index: HashMap<ConceptId, NodeIndex>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from node and edge lists.
    ///
    /// Duplicate nodes keep their first record. Edges naming unknown nodes,
    /// self-loops and repeated edges are dropped.
    pub fn build(nodes: impl IntoIterator<Item = ConceptRecord>, edges: &[Edge]) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }

        let mut dangling = 0usize;
        for edge in edges {
            if !graph.add_edge(&edge.parent, &edge.child) && !graph.has_edge(&edge.parent, &edge.child)
            {
                dangling += 1;
            }
        }
        if dangling > 0 {
            warn!("Ignored {} edges that reference unknown concepts or loop on themselves", dangling);
        }
        debug!("Built concept graph: {}", graph.stats());
        graph
    }

    /// Add a node. Returns false if a node with this id already exists.
    pub fn add_node(&mut self, record: ConceptRecord) -> bool {
        if self.index.contains_key(&record.concept_id) {
            return false;
        }
        let id = record.concept_id.clone();
        let idx = self.graph.add_node(record);
        self.index.insert(id, idx);
        true
    }

    /// Add a parent to child edge. Returns true only if a new edge was added.
    pub fn add_edge(&mut self, parent: &ConceptId, child: &ConceptId) -> bool {
        if parent == child {
            return false;
        }
        let (Some(&source), Some(&target)) = (self.index.get(parent), self.index.get(child))
        else {
            return false;
        };
        if self.graph.find_edge(source, target).is_some() {
            return false;
        }
        self.graph.add_edge(source, target, ());
        true
    }

    pub fn has_edge(&self, parent: &ConceptId, child: &ConceptId) -> bool {
        match (self.index.get(parent), self.index.get(child)) {
            (Some(&source), Some(&target)) => self.graph.find_edge(source, target).is_some(),
            _ => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&ConceptRecord> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    /// All node records in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ConceptRecord> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &ConceptId> {
        self.nodes().map(|n| &n.concept_id)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<ConceptId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<ConceptId> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].concept_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Children of a node, sorted by id. Unknown ids have none.
    pub fn out_neighbors(&self, id: &str) -> Vec<ConceptId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Parents of a node, sorted by id. Unknown ids have none.
    pub fn in_neighbors(&self, id: &str) -> Vec<ConceptId> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|idx| self.graph.neighbors_directed(*idx, Direction::Incoming).count())
            .unwrap_or(0)
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|idx| self.graph.neighbors_directed(*idx, Direction::Outgoing).count())
            .unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Strongly connected components with more than one member, i.e. cycles.
    /// Self-loops never enter the graph so single nodes cannot form one.
    pub fn find_cycles(&self) -> Vec<Vec<ConceptId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<ConceptId> = scc
                    .into_iter()
                    .map(|idx| self.graph[idx].concept_id.clone())
                    .collect();
                ids.sort();
                ids
            })
            .collect()
    }

    pub fn stats(&self) -> String {
        format!("Nodes: {}, Edges: {}", self.node_count(), self.edge_count())
    }
}
