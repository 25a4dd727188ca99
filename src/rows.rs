//! Row expansion and visibility resolution.
//!
//! The forest is enumerated once per dataset into a [`RowSkeleton`]: one entry
//! per root-to-node path, in display order. Every display recomputation clones
//! the skeleton into fresh [`Row`]s and runs a fixed cascade of linear passes
//! over them. Each pass only records reasons; the final result of a row is
//! derived from the reasons it collected, so the decision is always traceable.
//!
//! Precedence, first match wins:
//!
//! 1. an active hide-though-expanded category (`<name>` or `descendantOf_<name>`)
//! 2. `parentHidden`
//! 3. an active show-though-collapsed category (`<name>` or `ancestorOf_<name>`)
//! 4. `descendantOfCollapsed`
//! 5. `childOfExpanded`
//! 6. `nonRoot`
//! 7. shown
//!
//! Collapsing a node therefore hides only what a category does not force
//! visible, and collapsing right after an expand restores the earlier rows.
//!
//! Deduplication (`duplicate`, `descendantOf_duplicate`) runs last over the
//! rows that survived the cascade.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::attributes::AttributeMap;
use crate::categories::{CategoryRegistry, TreatmentRule, ALL_BUT_FIRST_OCCURRENCE};
use crate::concept::ConceptId;
use crate::errors::{GraphError, GraphResult};
use crate::graph::ConceptGraph;
use crate::options::DisplayOptions;
use crate::ordering::{SiblingKey, SiblingOrder};

pub const NON_ROOT: &str = "nonRoot";
pub const CHILD_OF_EXPANDED: &str = "childOfExpanded";
pub const DESCENDANT_OF_COLLAPSED: &str = "descendantOfCollapsed";
pub const PARENT_HIDDEN: &str = "parentHidden";
pub const DUPLICATE: &str = "duplicate";

pub fn descendant_of(category: &str) -> String {
    format!("descendantOf_{}", category)
}

pub fn ancestor_of(category: &str) -> String {
    format!("ancestorOf_{}", category)
}

/// Separator between ids in a row path.
pub const PATH_SEPARATOR: char = '/';

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    #[serde(rename = "")]
    Undecided,
    Show,
    Hide,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RowDisplay {
    pub hide_reasons: BTreeMap<String, bool>,
    pub show_reasons: BTreeMap<String, bool>,
    pub result: Visibility,
}

/// One occurrence of a concept along one path from a display root.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub concept_id: ConceptId,
    pub depth: usize,
    pub row_path: String,
    /// Position among the displayed occurrences of this concept. Only rows
    /// that were still shown when deduplication ran get one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_occurrence: Option<usize>,
    #[serde(skip)]
    pub parent_row: Option<usize>,
    pub has_children: bool,
    pub child_count: usize,
    pub descendant_count: usize,
    pub drc: u64,
    /// True when at least one child row is shown.
    pub children_shown: bool,
    pub display: RowDisplay,
}

impl Row {
    fn hide(&mut self, reason: &str) {
        self.display.hide_reasons.insert(reason.to_string(), true);
    }

    fn show(&mut self, reason: &str) {
        self.display.show_reasons.insert(reason.to_string(), true);
    }

    pub fn has_hide_reason(&self, reason: &str) -> bool {
        self.display.hide_reasons.contains_key(reason)
    }

    pub fn has_show_reason(&self, reason: &str) -> bool {
        self.display.show_reasons.contains_key(reason)
    }

    /// Shown by a category rule rather than by an expand.
    pub fn is_forced_shown(&self) -> bool {
        self.display
            .show_reasons
            .keys()
            .any(|reason| reason != CHILD_OF_EXPANDED)
    }

    pub fn is_shown(&self) -> bool {
        self.display.result == Visibility::Show
    }

    /// An options entry targets this row by concept id or by exact path.
    fn targeted_by(&self, entries: &BTreeSet<String>) -> bool {
        entries.contains(self.concept_id.as_str()) || entries.contains(&self.row_path)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct SkeletonEntry {
    concept_id: ConceptId,
    depth: usize,
    row_path: String,
    parent_row: Option<usize>,
    has_children: bool,
    child_count: usize,
    descendant_count: usize,
    drc: u64,
}

/// Every root-to-node path in display order. Independent of display options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowSkeleton {
    entries: Vec<SkeletonEntry>,
}

impl RowSkeleton {
    /// Depth-first enumeration from each root with siblings sorted by `order`.
    pub fn enumerate(
        graph: &ConceptGraph,
        attributes: &AttributeMap,
        roots: &[ConceptId],
        order: &dyn SiblingOrder,
    ) -> GraphResult<Self> {
        let mut sorted_children: HashMap<&ConceptId, Vec<ConceptId>> = HashMap::new();
        for (id, attrs) in attributes {
            if attrs.child_ids.is_empty() {
                continue;
            }
            sorted_children.insert(id, sort_siblings(graph, attributes, &attrs.child_ids, order)?);
        }
        let sorted_roots = sort_siblings(graph, attributes, roots, order)?;

        let mut entries = Vec::new();
        // (id, depth, parent row index)
        let mut stack: Vec<(ConceptId, usize, Option<usize>)> = sorted_roots
            .into_iter()
            .rev()
            .map(|id| (id, 0, None))
            .collect();

        while let Some((id, depth, parent_row)) = stack.pop() {
            let attrs = attributes
                .get(&id)
                .ok_or_else(|| GraphError::MissingAttributes(id.to_string()))?;
            let row_path = match parent_row {
                Some(p) => {
                    let parent: &SkeletonEntry = &entries[p];
                    format!("{}{}{}", parent.row_path, PATH_SEPARATOR, id)
                }
                None => id.to_string(),
            };
            let row_index = entries.len();
            if let Some(children) = sorted_children.get(&id) {
                for child in children.iter().rev() {
                    stack.push((child.clone(), depth + 1, Some(row_index)));
                }
            }
            entries.push(SkeletonEntry {
                concept_id: id,
                depth,
                row_path,
                parent_row,
                has_children: attrs.has_children,
                child_count: attrs.child_count,
                descendant_count: attrs.descendant_count,
                drc: attrs.drc,
            });
        }

        debug!("Enumerated {} rows from {} roots", entries.len(), roots.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh_rows(&self) -> Vec<Row> {
        self.entries
            .iter()
            .map(|e| Row {
                concept_id: e.concept_id.clone(),
                depth: e.depth,
                row_path: e.row_path.clone(),
                node_occurrence: None,
                parent_row: e.parent_row,
                has_children: e.has_children,
                child_count: e.child_count,
                descendant_count: e.descendant_count,
                drc: e.drc,
                children_shown: false,
                display: RowDisplay::default(),
            })
            .collect()
    }
}

fn sort_siblings(
    graph: &ConceptGraph,
    attributes: &AttributeMap,
    ids: &[ConceptId],
    order: &dyn SiblingOrder,
) -> GraphResult<Vec<ConceptId>> {
    let mut keyed = Vec::with_capacity(ids.len());
    for id in ids {
        let record = graph
            .node(id.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let attrs = attributes
            .get(id)
            .ok_or_else(|| GraphError::MissingAttributes(id.to_string()))?;
        keyed.push((id, SiblingKey { record, attributes: attrs }));
    }
    keyed.sort_by(|(_, a), (_, b)| order.compare(a, b));
    Ok(keyed.into_iter().map(|(id, _)| id.clone()).collect())
}

/// Every row with its resolved display, plus the concepts found repeated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub repeated_concepts: BTreeSet<ConceptId>,
}

impl RowSet {
    pub fn shown(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| r.is_shown())
    }

    pub fn hidden_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_shown()).count()
    }

    pub fn into_shown(self) -> Vec<Row> {
        self.rows.into_iter().filter(|r| r.is_shown()).collect()
    }
}

/// Run the visibility cascade over a fresh copy of the skeleton.
pub fn expand_rows(
    skeleton: &RowSkeleton,
    registry: &CategoryRegistry,
    options: &DisplayOptions,
) -> RowSet {
    let mut rows = skeleton.fresh_rows();

    apply_root_default(&mut rows, options);
    apply_node_overrides(&mut rows, options);
    apply_show_categories(&mut rows, registry, options);
    let hide_categories = apply_hide_categories(&mut rows, registry, options);
    resolve(&mut rows, &hide_categories);
    let repeated_concepts = deduplicate(&mut rows, options.is_active(ALL_BUT_FIRST_OCCURRENCE));
    mark_children_shown(&mut rows);

    let shown = rows.iter().filter(|r| r.is_shown()).count();
    debug!("Resolved {} rows, {} shown", rows.len(), shown);

    RowSet {
        rows,
        repeated_concepts,
    }
}

fn apply_root_default(rows: &mut [Row], options: &DisplayOptions) {
    if options.expand_all {
        return;
    }
    for row in rows.iter_mut().filter(|r| r.depth > 0) {
        row.hide(NON_ROOT);
    }
}

fn apply_node_overrides(rows: &mut [Row], options: &DisplayOptions) {
    let expanded = &options.specific_nodes_expanded;
    let collapsed = &options.specific_nodes_collapsed;
    if expanded.is_empty() && collapsed.is_empty() {
        return;
    }
    for i in 0..rows.len() {
        let Some(p) = rows[i].parent_row else {
            continue;
        };
        let parent = &rows[p];
        let under_collapse =
            parent.has_hide_reason(DESCENDANT_OF_COLLAPSED) || parent.targeted_by(collapsed);
        let parent_expanded = parent.targeted_by(expanded);

        if under_collapse {
            rows[i].hide(DESCENDANT_OF_COLLAPSED);
        } else if parent_expanded {
            rows[i].show(CHILD_OF_EXPANDED);
        }
    }
}

fn apply_show_categories(rows: &mut [Row], registry: &CategoryRegistry, options: &DisplayOptions) {
    for category in registry.with_rule(TreatmentRule::ShowThoughCollapsed) {
        if !options.is_active(&category.name) || category.members.is_empty() {
            continue;
        }
        let ancestor_reason = ancestor_of(&category.name);
        for i in 0..rows.len() {
            if !category.contains(rows[i].concept_id.as_str()) {
                continue;
            }
            rows[i].show(&category.name);
            let mut parent = rows[i].parent_row;
            while let Some(p) = parent {
                if rows[p].has_show_reason(&ancestor_reason) {
                    break;
                }
                rows[p].show(&ancestor_reason);
                parent = rows[p].parent_row;
            }
        }
    }
}

/// Returns the (reason, cascade reason) pairs of the categories applied.
fn apply_hide_categories(
    rows: &mut [Row],
    registry: &CategoryRegistry,
    options: &DisplayOptions,
) -> Vec<(String, String)> {
    let active: Vec<(&str, String)> = registry
        .with_rule(TreatmentRule::HideThoughExpanded)
        .filter(|c| c.name != ALL_BUT_FIRST_OCCURRENCE && options.is_active(&c.name))
        .map(|c| (c.name.as_str(), descendant_of(&c.name)))
        .collect();

    for (name, cascade) in &active {
        let Some(category) = registry.get(name) else {
            continue;
        };
        for i in 0..rows.len() {
            if category.contains(rows[i].concept_id.as_str()) {
                rows[i].hide(name);
            }
            if let Some(p) = rows[i].parent_row {
                if rows[p].has_hide_reason(name) || rows[p].has_hide_reason(cascade) {
                    rows[i].hide(cascade);
                }
            }
        }
    }

    active
        .into_iter()
        .map(|(name, cascade)| (name.to_string(), cascade))
        .collect()
}

fn resolve(rows: &mut [Row], hide_categories: &[(String, String)]) {
    for i in 0..rows.len() {
        let parent_hidden = rows[i]
            .parent_row
            .map(|p| rows[p].display.result == Visibility::Hide)
            .unwrap_or(false);

        let row = &mut rows[i];
        let category_hidden = hide_categories
            .iter()
            .any(|(name, cascade)| row.has_hide_reason(name) || row.has_hide_reason(cascade));

        row.display.result = if category_hidden {
            Visibility::Hide
        } else if parent_hidden {
            row.hide(PARENT_HIDDEN);
            Visibility::Hide
        } else if row.is_forced_shown() {
            Visibility::Show
        } else if row.has_hide_reason(DESCENDANT_OF_COLLAPSED) {
            Visibility::Hide
        } else if row.has_show_reason(CHILD_OF_EXPANDED) {
            Visibility::Show
        } else if row.has_hide_reason(NON_ROOT) {
            Visibility::Hide
        } else {
            Visibility::Show
        };
    }
}

fn deduplicate(rows: &mut [Row], hide_repeats: bool) -> BTreeSet<ConceptId> {
    let descendant_of_duplicate = descendant_of(DUPLICATE);
    let mut seen: HashMap<ConceptId, usize> = HashMap::new();
    let mut repeated = BTreeSet::new();

    for i in 0..rows.len() {
        if !rows[i].is_shown() {
            continue;
        }
        let under_duplicate = rows[i]
            .parent_row
            .map(|p| {
                rows[p].has_hide_reason(DUPLICATE) || rows[p].has_hide_reason(&descendant_of_duplicate)
            })
            .unwrap_or(false);

        let row = &mut rows[i];
        if under_duplicate {
            row.hide(&descendant_of_duplicate);
            row.display.result = Visibility::Hide;
            continue;
        }

        let count = seen.entry(row.concept_id.clone()).or_insert(0);
        let occurrence = *count;
        *count += 1;
        row.node_occurrence = Some(occurrence);

        if occurrence > 0 {
            repeated.insert(row.concept_id.clone());
            if hide_repeats {
                row.hide(DUPLICATE);
                row.display.result = Visibility::Hide;
            }
        }
    }
    repeated
}

fn mark_children_shown(rows: &mut [Row]) {
    for i in 0..rows.len() {
        if !rows[i].is_shown() {
            continue;
        }
        if let Some(p) = rows[i].parent_row {
            rows[p].children_shown = true;
        }
    }
}

/// Per-category counts for toggle labels.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub name: String,
    pub rule: TreatmentRule,
    pub active: bool,
    /// Distinct member concepts present in the graph.
    pub members: usize,
    /// Rows of member concepts currently shown.
    pub shown_rows: usize,
    /// Rows of member concepts currently hidden.
    pub hidden_rows: usize,
    /// Rows the rule itself hid (hide rules) or forced visible (show rules).
    pub affected_rows: usize,
}

pub fn summarize_categories(
    registry: &CategoryRegistry,
    row_set: &RowSet,
    options: &DisplayOptions,
) -> Vec<CategorySummary> {
    registry
        .iter()
        .map(|category| {
            let is_repeats = category.name == ALL_BUT_FIRST_OCCURRENCE;
            let is_member = |row: &Row| {
                if is_repeats {
                    row.node_occurrence.map(|n| n > 0).unwrap_or(false)
                } else {
                    category.contains(row.concept_id.as_str())
                }
            };

            let mut shown_rows = 0;
            let mut hidden_rows = 0;
            let mut affected_rows = 0;
            let cascade = if is_repeats {
                descendant_of(DUPLICATE)
            } else {
                descendant_of(&category.name)
            };
            let own_reason = if is_repeats { DUPLICATE } else { category.name.as_str() };

            for row in &row_set.rows {
                if is_member(row) {
                    if row.is_shown() {
                        shown_rows += 1;
                    } else {
                        hidden_rows += 1;
                    }
                }
                let affected = match category.rule {
                    TreatmentRule::HideThoughExpanded => {
                        !row.is_shown()
                            && (row.has_hide_reason(own_reason) || row.has_hide_reason(&cascade))
                    }
                    TreatmentRule::ShowThoughCollapsed => {
                        row.is_shown() && row.has_show_reason(&category.name)
                    }
                };
                if affected {
                    affected_rows += 1;
                }
            }

            let members = if is_repeats {
                row_set.repeated_concepts.len()
            } else {
                category.members.len()
            };

            CategorySummary {
                name: category.name.clone(),
                rule: category.rule,
                active: options.is_active(&category.name),
                members,
                shown_rows,
                hidden_rows,
                affected_rows,
            }
        })
        .collect()
}
