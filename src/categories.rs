//! Special concept categories
//!
//! A category is a named set of concept ids with a treatment rule that forces
//! its members visible or hidden regardless of the user's expand/collapse
//! state. Some categories are supplied with the dataset (definition items,
//! staged additions and removals, expansion-only members), some are derived
//! from node data here, and `allButFirstOccurrence` is filled in by the row
//! expander because it depends on the current display.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::attributes::AttributeMap;
use crate::concept::ConceptId;
use crate::graph::ConceptGraph;

pub const DEFINITION_CONCEPTS: &str = "definitionConcepts";
pub const ADDED: &str = "added";
pub const REMOVED: &str = "removed";
pub const EXPANSION_ONLY: &str = "expansionOnly";
pub const NON_STANDARD: &str = "nonStandard";
pub const ZERO_RECORD: &str = "zeroRecord";
pub const ALL_BUT_FIRST_OCCURRENCE: &str = "allButFirstOccurrence";

/// How an active category affects its members.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentRule {
    /// Force visible even when an ancestor is not expanded.
    ShowThoughCollapsed,
    /// Force invisible, together with descendants, even when expanded.
    HideThoughExpanded,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CategoryConfig {
    pub name: String,
    pub rule: TreatmentRule,
    #[serde(default)]
    pub default_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategoryConfig {
    pub fn new(name: &str, rule: TreatmentRule, default_active: bool) -> Self {
        Self {
            name: name.to_string(),
            rule,
            default_active,
            description: None,
        }
    }

    fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

pub fn default_categories() -> Vec<CategoryConfig> {
    use TreatmentRule::*;
    vec![
        CategoryConfig::new(DEFINITION_CONCEPTS, ShowThoughCollapsed, true)
            .describe("Concepts named explicitly in a concept set definition"),
        CategoryConfig::new(ADDED, ShowThoughCollapsed, true)
            .describe("Concepts staged for addition"),
        CategoryConfig::new(REMOVED, ShowThoughCollapsed, true)
            .describe("Concepts staged for removal"),
        CategoryConfig::new(EXPANSION_ONLY, HideThoughExpanded, false)
            .describe("Concepts present only through expansion of a definition"),
        CategoryConfig::new(NON_STANDARD, HideThoughExpanded, false)
            .describe("Concepts that are neither standard nor classification"),
        CategoryConfig::new(ZERO_RECORD, HideThoughExpanded, false)
            .describe("Concepts whose subtree has no records"),
        CategoryConfig::new(ALL_BUT_FIRST_OCCURRENCE, HideThoughExpanded, true)
            .describe("Repeated occurrences of a concept reached through another parent"),
    ]
}

/// A configured category with its resolved member set.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecialCategory {
    pub name: String,
    pub rule: TreatmentRule,
    /// Members present in the graph. Ids unknown to the graph are dropped.
    pub members: HashSet<ConceptId>,
}

impl SpecialCategory {
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }
}

/// Categories in configuration order.
#[derive(Clone, Debug, Default)]
pub struct CategoryRegistry {
    categories: IndexMap<String, SpecialCategory>,
}

impl CategoryRegistry {
    /// Resolve member sets for every configured category from the supplied
    /// id lists plus the categories derived from node data.
    pub fn resolve(
        configs: &[CategoryConfig],
        supplied: &BTreeMap<String, Vec<ConceptId>>,
        graph: &ConceptGraph,
        attributes: &AttributeMap,
    ) -> Self {
        let mut categories = IndexMap::new();

        for config in configs {
            let mut members = HashSet::new();
            let mut unknown = 0usize;
            for id in supplied.get(&config.name).into_iter().flatten() {
                if graph.contains(id.as_str()) {
                    members.insert(id.clone());
                } else {
                    unknown += 1;
                }
            }
            if unknown > 0 {
                debug!(
                    "Category '{}' names {} concepts that are not in the graph",
                    config.name, unknown
                );
            }
            members.extend(derived_members(&config.name, graph, attributes));

            categories.insert(
                config.name.clone(),
                SpecialCategory {
                    name: config.name.clone(),
                    rule: config.rule,
                    members,
                },
            );
        }

        for name in supplied.keys() {
            if !categories.contains_key(name) {
                warn!("Ignoring category '{}' which has no configured rule", name);
            }
        }

        Self { categories }
    }

    pub fn get(&self, name: &str) -> Option<&SpecialCategory> {
        self.categories.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpecialCategory> {
        self.categories.values()
    }

    pub fn with_rule(&self, rule: TreatmentRule) -> impl Iterator<Item = &SpecialCategory> {
        self.categories.values().filter(move |c| c.rule == rule)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn derived_members(name: &str, graph: &ConceptGraph, attributes: &AttributeMap) -> Vec<ConceptId> {
    let real_concepts = graph.nodes().filter(|n| !n.not_a_concept);
    match name {
        NON_STANDARD => real_concepts
            .filter(|n| n.standard_concept.is_non_standard())
            .map(|n| n.concept_id.clone())
            .collect(),
        ZERO_RECORD => real_concepts
            .filter(|n| {
                attributes
                    .get(&n.concept_id)
                    .map(|a| a.drc == 0)
                    .unwrap_or(n.total_cnt == 0)
            })
            .map(|n| n.concept_id.clone())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::compute_attributes;
    use crate::concept::{ConceptRecord, Edge, StandardConcept};
    use crate::roots::normalize;

    fn registry(supplied: BTreeMap<String, Vec<ConceptId>>) -> CategoryRegistry {
        let mut graph = ConceptGraph::build(
            vec![
                ConceptRecord::new("1").with_total_cnt(0),
                ConceptRecord::new("2")
                    .with_total_cnt(5)
                    .with_standard_concept(StandardConcept::NonStandard),
                ConceptRecord::new("3").with_total_cnt(0),
                ConceptRecord::new("4")
                    .with_total_cnt(0)
                    .with_standard_concept(StandardConcept::Classification),
            ],
            &[Edge::new("1", "2"), Edge::new("1", "3")],
        );
        let summary = normalize(&mut graph);
        let attrs = compute_attributes(&graph, &summary.roots).unwrap();
        CategoryRegistry::resolve(&default_categories(), &supplied, &graph, &attrs)
    }

    #[test]
    fn test_supplied_members_drop_unknown_ids() {
        let mut supplied = BTreeMap::new();
        supplied.insert(
            DEFINITION_CONCEPTS.to_string(),
            vec![ConceptId::from("1"), ConceptId::from("404")],
        );
        let registry = registry(supplied);
        let definition = registry.get(DEFINITION_CONCEPTS).unwrap();
        assert!(definition.contains("1"));
        assert!(!definition.contains("404"));
        assert_eq!(definition.members.len(), 1);
    }

    #[test]
    fn test_derived_categories() {
        let registry = registry(BTreeMap::new());
        let non_standard = registry.get(NON_STANDARD).unwrap();
        assert_eq!(non_standard.members, HashSet::from([ConceptId::from("2")]));

        // 1 has records below it; the unlinked pseudo-root is not a concept
        let zero = registry.get(ZERO_RECORD).unwrap();
        assert_eq!(
            zero.members,
            HashSet::from([ConceptId::from("3"), ConceptId::from("4")])
        );
    }

    #[test]
    fn test_unconfigured_category_is_ignored() {
        let mut supplied = BTreeMap::new();
        supplied.insert("mystery".to_string(), vec![ConceptId::from("1")]);
        let registry = registry(supplied);
        assert!(registry.get("mystery").is_none());
        assert_eq!(registry.len(), default_categories().len());
    }

    #[test]
    fn test_rules_round_trip_as_snake_case() {
        let yaml = serde_yaml::to_string(&TreatmentRule::HideThoughExpanded).unwrap();
        assert_eq!(yaml.trim(), "hide_though_expanded");
    }
}
