use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::attributes::NodeAttributes;
use crate::concept::ConceptRecord;

/// What the sibling comparator gets to look at.
pub struct SiblingKey<'a> {
    pub record: &'a ConceptRecord,
    pub attributes: &'a NodeAttributes,
}

/// Orders sibling rows. Implementations must be total so that row output
/// never depends on map iteration order.
pub trait SiblingOrder: Send + Sync {
    fn compare(&self, a: &SiblingKey<'_>, b: &SiblingKey<'_>) -> Ordering;
}

fn real_concepts_first(a: &SiblingKey<'_>, b: &SiblingKey<'_>) -> Ordering {
    a.record.not_a_concept.cmp(&b.record.not_a_concept)
}

fn by_name_then_id(a: &SiblingKey<'_>, b: &SiblingKey<'_>) -> Ordering {
    a.record
        .display_name()
        .to_lowercase()
        .cmp(&b.record.display_name().to_lowercase())
        .then_with(|| a.record.concept_id.cmp(&b.record.concept_id))
}

/// Pseudo nodes last, then descending descendant record count.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordCountOrder;

impl SiblingOrder for RecordCountOrder {
    fn compare(&self, a: &SiblingKey<'_>, b: &SiblingKey<'_>) -> Ordering {
        real_concepts_first(a, b)
            .then_with(|| b.attributes.drc.cmp(&a.attributes.drc))
            .then_with(|| by_name_then_id(a, b))
    }
}

/// Pseudo nodes last, then case-insensitive concept name.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameOrder;

impl SiblingOrder for NameOrder {
    fn compare(&self, a: &SiblingKey<'_>, b: &SiblingKey<'_>) -> Ordering {
        real_concepts_first(a, b).then_with(|| by_name_then_id(a, b))
    }
}

/// Configurable choice of built-in comparator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SiblingOrderKind {
    #[default]
    RecordCount,
    Name,
}

impl SiblingOrderKind {
    pub fn comparator(&self) -> Box<dyn SiblingOrder> {
        match self {
            SiblingOrderKind::RecordCount => Box::new(RecordCountOrder),
            SiblingOrderKind::Name => Box::new(NameOrder),
        }
    }
}
