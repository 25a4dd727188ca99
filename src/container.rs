//! Graph container: everything derived from one loaded dataset.
//!
//! Building a container runs the expensive work once (graph build, root
//! normalization, attribute aggregation, category resolution, row
//! enumeration). The result is immutable; display recomputation only runs
//! the visibility cascade over the cached row skeleton.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use crate::attributes::{compute_attributes, AttributeMap, NodeAttributes};
use crate::categories::CategoryRegistry;
use crate::concept::{ConceptId, ConceptRecord, Dataset};
use crate::config::ViewerConfig;
use crate::errors::{GraphError, GraphResult};
use crate::graph::ConceptGraph;
use crate::options::DisplayOptions;
use crate::roots::{normalize, RootSummary};
use crate::rows::{expand_rows, summarize_categories, CategorySummary, Row, RowSet, RowSkeleton};

/// What the rendering layer receives.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOutput {
    /// Shown rows in display order.
    pub rows: Vec<Row>,
    pub total_rows: usize,
    pub hidden_rows: usize,
    pub categories: Vec<CategorySummary>,
}

pub struct GraphContainer {
    fingerprint: String,
    graph: ConceptGraph,
    roots: RootSummary,
    attributes: AttributeMap,
    registry: CategoryRegistry,
    skeleton: RowSkeleton,
}

impl GraphContainer {
    pub fn new(dataset: &Dataset, config: &ViewerConfig) -> GraphResult<Self> {
        let fingerprint = fingerprint(dataset, config)?;
        let mut graph = ConceptGraph::build(dataset.concepts.iter().cloned(), &dataset.edges);

        let cycles = graph.find_cycles();
        if let Some(cycle) = cycles.first() {
            let members: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
            return Err(GraphError::CycleDetected(format!(
                "{} cycle(s), first among: {}",
                cycles.len(),
                members.join(", ")
            )));
        }

        let roots = normalize(&mut graph);
        let attributes = compute_attributes(&graph, &roots.roots)?;
        let registry = CategoryRegistry::resolve(
            &config.categories,
            &dataset.special_concept_categories,
            &graph,
            &attributes,
        );
        let comparator = config.sibling_order.comparator();
        let skeleton = RowSkeleton::enumerate(&graph, &attributes, &roots.roots, comparator.as_ref())?;

        info!(
            "Built graph container: {}, Roots: {}, Leaves: {}, Rows: {}",
            graph.stats(),
            roots.roots.len(),
            roots.leaves.len(),
            skeleton.len()
        );

        Ok(Self {
            fingerprint,
            graph,
            roots,
            attributes,
            registry,
            skeleton,
        })
    }

    /// Every row with its resolved display, hidden ones included.
    pub fn expand_rows(&self, options: &DisplayOptions) -> RowSet {
        expand_rows(&self.skeleton, &self.registry, options)
    }

    pub fn display(&self, options: &DisplayOptions) -> DisplayOutput {
        let row_set = self.expand_rows(options);
        let categories = summarize_categories(&self.registry, &row_set, options);
        let total_rows = row_set.rows.len();
        let hidden_rows = row_set.hidden_count();
        DisplayOutput {
            rows: row_set.into_shown(),
            total_rows,
            hidden_rows,
            categories,
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn graph(&self) -> &ConceptGraph {
        &self.graph
    }

    pub fn roots(&self) -> &[ConceptId] {
        &self.roots.roots
    }

    pub fn leaves(&self) -> &[ConceptId] {
        &self.roots.leaves
    }

    pub fn root_summary(&self) -> &RootSummary {
        &self.roots
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn node(&self, id: &str) -> Option<&ConceptRecord> {
        self.graph.node(id)
    }

    /// Aggregated attributes of a node. Every node in the graph has them once
    /// the container exists; their absence is reported, never defaulted.
    pub fn attributes(&self, id: &str) -> GraphResult<&Arc<NodeAttributes>> {
        if !self.graph.contains(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        self.attributes
            .get(id)
            .ok_or_else(|| GraphError::MissingAttributes(id.to_string()))
    }

    pub fn stats(&self) -> String {
        format!(
            "{}, Roots: {}, Leaves: {}, Unlinked: {}, Rows: {}",
            self.graph.stats(),
            self.roots.roots.len(),
            self.roots.leaves.len(),
            self.roots.unlinked.len(),
            self.skeleton.len()
        )
    }
}

/// SHA-256 over the dataset and the configuration that shaped the container.
pub fn fingerprint(dataset: &Dataset, config: &ViewerConfig) -> GraphResult<String> {
    let mut hasher = Sha256::new();
    let data = serde_json::to_vec(dataset)
        .map_err(|e| GraphError::InvalidStructure(format!("dataset not serializable: {}", e)))?;
    let settings = serde_json::to_vec(config)
        .map_err(|e| GraphError::InvalidStructure(format!("config not serializable: {}", e)))?;
    hasher.update(&data);
    hasher.update(&settings);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Holds the container for the currently loaded dataset.
///
/// One cache per interaction session; nothing is process-global.
pub struct ContainerCache {
    config: ViewerConfig,
    current: Option<Arc<GraphContainer>>,
}

impl ContainerCache {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Reuse the current container if it was built from an identical dataset,
    /// otherwise build and keep a new one.
    pub fn get_or_build(&mut self, dataset: &Dataset) -> GraphResult<Arc<GraphContainer>> {
        let key = fingerprint(dataset, &self.config)?;
        if let Some(current) = &self.current {
            if current.fingerprint() == key {
                debug!("Reusing graph container {}", key.get(..12).unwrap_or(&key));
                return Ok(current.clone());
            }
        }
        let container = Arc::new(GraphContainer::new(dataset, &self.config)?);
        self.current = Some(container.clone());
        Ok(container)
    }

    pub fn current(&self) -> Option<Arc<GraphContainer>> {
        self.current.clone()
    }

    pub fn invalidate(&mut self) {
        if self.current.take().is_some() {
            debug!("Graph container invalidated");
        }
    }

    /// Rows for the loaded dataset, or nothing while no dataset is loaded.
    pub fn display(&self, options: &DisplayOptions) -> DisplayOutput {
        match &self.current {
            Some(container) => container.display(options),
            None => DisplayOutput::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::Edge;

    fn dataset() -> Dataset {
        Dataset::new(
            vec![
                ConceptRecord::new("1").with_total_cnt(3),
                ConceptRecord::new("2").with_total_cnt(2),
                ConceptRecord::new("3").with_total_cnt(1),
            ],
            vec![Edge::new("1", "2")],
        )
    }

    #[test]
    fn test_container_exposes_roots_and_attributes() {
        let container = GraphContainer::new(&dataset(), &ViewerConfig::default()).unwrap();
        assert_eq!(
            container.roots(),
            &[ConceptId::from("1"), ConceptId::from("unlinked")]
        );
        assert_eq!(container.attributes("1").unwrap().drc, 5);
        assert_eq!(container.attributes("unlinked").unwrap().descendant_count, 1);
        assert!(container.attributes("404").unwrap_err().is_not_found());
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut data = dataset();
        data.edges.push(Edge::new("2", "1"));
        let err = GraphContainer::new(&data, &ViewerConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::CycleDetected(_)));
    }

    #[test]
    fn test_cache_reuses_identical_dataset() {
        let mut cache = ContainerCache::new(ViewerConfig::default());
        let first = cache.get_or_build(&dataset()).unwrap();
        let second = cache.get_or_build(&dataset()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let mut changed = dataset();
        changed.edges.push(Edge::new("1", "3"));
        let third = cache.get_or_build(&changed).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_cache_is_empty_until_loaded_and_after_invalidate() {
        let mut cache = ContainerCache::new(ViewerConfig::default());
        let options = cache.config().default_options();
        assert!(cache.display(&options).rows.is_empty());

        cache.get_or_build(&dataset()).unwrap();
        assert_eq!(cache.display(&options).rows.len(), 2);

        cache.invalidate();
        assert!(cache.current().is_none());
        assert_eq!(cache.display(&options), DisplayOutput::default());
    }

    #[test]
    fn test_display_output_counts() {
        let container = GraphContainer::new(&dataset(), &ViewerConfig::default()).unwrap();
        let output = container.display(&ViewerConfig::default().default_options());
        // 1, 1/2, unlinked, unlinked/3
        assert_eq!(output.total_rows, 4);
        assert_eq!(output.hidden_rows, 2);
        assert_eq!(output.categories.len(), ViewerConfig::default().categories.len());
    }
}
