use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of the synthetic root that groups concepts with no relationships.
pub const UNLINKED_ID: &str = "unlinked";

/// Canonical concept identifier.
///
/// Concept ids arrive both as JSON numbers and as strings. They are converted
/// to their string form once, here, so `1` and `"1"` name the same node
/// everywhere else in the crate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "RawId", into = "String")]
pub struct ConceptId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl From<RawId> for ConceptId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Unsigned(n) => ConceptId(n.to_string()),
            RawId::Signed(n) => ConceptId(n.to_string()),
            RawId::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                ConceptId((f as i64).to_string())
            }
            RawId::Float(f) => ConceptId(f.to_string()),
            RawId::Text(s) => ConceptId(s.trim().to_string()),
        }
    }
}

impl From<ConceptId> for String {
    fn from(id: ConceptId) -> Self {
        id.0
    }
}

impl ConceptId {
    pub fn new(id: impl Into<String>) -> Self {
        ConceptId(id.into().trim().to_string())
    }

    pub fn unlinked() -> Self {
        ConceptId(UNLINKED_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unlinked(&self) -> bool {
        self.0 == UNLINKED_ID
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ConceptId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConceptId {
    fn from(s: &str) -> Self {
        ConceptId::new(s)
    }
}

impl From<String> for ConceptId {
    fn from(s: String) -> Self {
        ConceptId::new(s)
    }
}

impl From<i64> for ConceptId {
    fn from(n: i64) -> Self {
        ConceptId(n.to_string())
    }
}

impl From<i32> for ConceptId {
    fn from(n: i32) -> Self {
        ConceptId(n.to_string())
    }
}

impl From<u64> for ConceptId {
    fn from(n: u64) -> Self {
        ConceptId(n.to_string())
    }
}

/// Standard concept flag as carried by the vocabulary tables.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum StandardConcept {
    Standard,
    Classification,
    #[default]
    NonStandard,
}

impl From<Option<String>> for StandardConcept {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref().map(str::trim) {
            Some("S") | Some("s") => StandardConcept::Standard,
            Some("C") | Some("c") => StandardConcept::Classification,
            _ => StandardConcept::NonStandard,
        }
    }
}

impl From<StandardConcept> for Option<String> {
    fn from(flag: StandardConcept) -> Self {
        match flag {
            StandardConcept::Standard => Some("S".to_string()),
            StandardConcept::Classification => Some("C".to_string()),
            StandardConcept::NonStandard => None,
        }
    }
}

impl StandardConcept {
    pub fn is_non_standard(&self) -> bool {
        matches!(self, StandardConcept::NonStandard)
    }
}

/// Distinct person count, which the backend may report as a comma separated
/// list with one entry per domain. The effective count is the largest entry.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(from = "Option<RawCount>", into = "String")]
pub struct PersonCounts(Vec<u64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCount {
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl From<Option<RawCount>> for PersonCounts {
    fn from(raw: Option<RawCount>) -> Self {
        match raw {
            None => PersonCounts::default(),
            Some(RawCount::Unsigned(n)) => PersonCounts(vec![n]),
            Some(RawCount::Float(f)) if f >= 0.0 => PersonCounts(vec![f as u64]),
            Some(RawCount::Float(_)) => PersonCounts::default(),
            Some(RawCount::Text(s)) => PersonCounts::parse(&s),
        }
    }
}

impl From<PersonCounts> for String {
    fn from(counts: PersonCounts) -> Self {
        counts
            .0
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl PersonCounts {
    /// Parse a comma separated list, skipping entries that are not numbers.
    pub fn parse(s: &str) -> Self {
        PersonCounts(
            s.split(',')
                .filter_map(|part| part.trim().parse::<u64>().ok())
                .collect(),
        )
    }

    pub fn effective(&self) -> u64 {
        self.0.iter().copied().max().unwrap_or(0)
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<RawCount> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None => 0,
        Some(RawCount::Unsigned(n)) => n,
        Some(RawCount::Float(f)) if f >= 0.0 => f as u64,
        Some(RawCount::Float(_)) => 0,
        Some(RawCount::Text(s)) => s.trim().parse().unwrap_or(0),
    })
}

/// One concept as supplied by the data-fetching layer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConceptRecord {
    pub concept_id: ConceptId,
    #[serde(default)]
    pub concept_name: Option<String>,
    #[serde(default)]
    pub vocabulary_id: Option<String>,
    #[serde(default)]
    pub standard_concept: StandardConcept,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub total_cnt: u64,
    #[serde(default)]
    pub distinct_person_cnt: PersonCounts,
    /// Set only on synthetic nodes such as the unlinked pseudo-root.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub not_a_concept: bool,
}

impl ConceptRecord {
    /// Bare record with zero counts, mostly useful for tests and fixtures.
    pub fn new(concept_id: impl Into<ConceptId>) -> Self {
        Self {
            concept_id: concept_id.into(),
            concept_name: None,
            vocabulary_id: None,
            standard_concept: StandardConcept::Standard,
            total_cnt: 0,
            distinct_person_cnt: PersonCounts::default(),
            not_a_concept: false,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.concept_name = Some(name.to_string());
        self
    }

    pub fn with_total_cnt(mut self, total_cnt: u64) -> Self {
        self.total_cnt = total_cnt;
        self
    }

    pub fn with_standard_concept(mut self, flag: StandardConcept) -> Self {
        self.standard_concept = flag;
        self
    }

    pub fn unlinked_pseudo_root() -> Self {
        Self {
            concept_id: ConceptId::unlinked(),
            concept_name: Some("Concepts without hierarchy relationships".to_string()),
            vocabulary_id: None,
            standard_concept: StandardConcept::NonStandard,
            total_cnt: 0,
            distinct_person_cnt: PersonCounts::default(),
            not_a_concept: true,
        }
    }

    pub fn distinct_person_count(&self) -> u64 {
        self.distinct_person_cnt.effective()
    }

    pub fn display_name(&self) -> &str {
        self.concept_name
            .as_deref()
            .unwrap_or_else(|| self.concept_id.as_str())
    }
}

/// Directed parent to child relationship. Deserializes from `[parent, child]`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(from = "(ConceptId, ConceptId)", into = "(ConceptId, ConceptId)")]
pub struct Edge {
    pub parent: ConceptId,
    pub child: ConceptId,
}

impl Edge {
    pub fn new(parent: impl Into<ConceptId>, child: impl Into<ConceptId>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

impl From<(ConceptId, ConceptId)> for Edge {
    fn from((parent, child): (ConceptId, ConceptId)) -> Self {
        Edge { parent, child }
    }
}

impl From<Edge> for (ConceptId, ConceptId) {
    fn from(edge: Edge) -> Self {
        (edge.parent, edge.child)
    }
}

/// Everything the graph container needs for one loaded concept set comparison.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub concepts: Vec<ConceptRecord>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub special_concept_categories: BTreeMap<String, Vec<ConceptId>>,
}

impl Dataset {
    pub fn new(concepts: Vec<ConceptRecord>, edges: Vec<Edge>) -> Self {
        Self {
            concepts,
            edges,
            special_concept_categories: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, name: &str, ids: Vec<ConceptId>) -> Self {
        self.special_concept_categories.insert(name.to_string(), ids);
        self
    }

    pub fn stats(&self) -> String {
        format!(
            "Concepts: {}, Edges: {}, Categories: {}",
            self.concepts.len(),
            self.edges.len(),
            self.special_concept_categories.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_ids_compare_equal() {
        let a: ConceptId = serde_json::from_value(json!(4182210)).unwrap();
        let b: ConceptId = serde_json::from_value(json!("4182210")).unwrap();
        let c: ConceptId = serde_json::from_value(json!(4182210.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(serde_json::to_value(&a).unwrap(), json!("4182210"));
    }

    #[test]
    fn distinct_person_count_takes_max_of_list() {
        let record: ConceptRecord = serde_json::from_value(json!({
            "concept_id": 1,
            "distinct_person_cnt": "12, 300,x,7"
        }))
        .unwrap();
        assert_eq!(record.distinct_person_count(), 300);

        let record: ConceptRecord = serde_json::from_value(json!({
            "concept_id": 1,
            "distinct_person_cnt": 42
        }))
        .unwrap();
        assert_eq!(record.distinct_person_count(), 42);

        let record: ConceptRecord =
            serde_json::from_value(json!({ "concept_id": 1 })).unwrap();
        assert_eq!(record.distinct_person_count(), 0);
    }

    #[test]
    fn standard_concept_flags() {
        let record: ConceptRecord = serde_json::from_value(json!({
            "concept_id": "9",
            "standard_concept": "C",
            "total_cnt": null
        }))
        .unwrap();
        assert_eq!(record.standard_concept, StandardConcept::Classification);
        assert_eq!(record.total_cnt, 0);

        let record: ConceptRecord = serde_json::from_value(json!({
            "concept_id": "9",
            "standard_concept": null,
            "total_cnt": "15"
        }))
        .unwrap();
        assert!(record.standard_concept.is_non_standard());
        assert_eq!(record.total_cnt, 15);
    }

    #[test]
    fn edges_deserialize_from_pairs() {
        let edges: Vec<Edge> = serde_json::from_value(json!([[1, 2], ["1", 3]])).unwrap();
        assert_eq!(edges[0], Edge::new("1", "2"));
        assert_eq!(edges[1], Edge::new("1", "3"));
    }

    #[test]
    fn dataset_uses_camel_case_categories() {
        let dataset: Dataset = serde_json::from_value(json!({
            "concepts": [{ "concept_id": 5 }],
            "edges": [],
            "specialConceptCategories": { "expansionOnly": [5] }
        }))
        .unwrap();
        assert_eq!(
            dataset.special_concept_categories["expansionOnly"],
            vec![ConceptId::from("5")]
        );
    }

    #[test]
    fn pseudo_root_is_not_a_concept() {
        let root = ConceptRecord::unlinked_pseudo_root();
        assert!(root.not_a_concept);
        assert!(root.concept_id.is_unlinked());
        assert_eq!(root.total_cnt, 0);
    }
}
