//! Display options and the reducer that applies user actions to them.
//!
//! Options are immutable once built. The reducer takes shared options and
//! returns either the very same `Arc` (nothing changed) or a fresh one, so
//! callers can detect changes with `Arc::ptr_eq`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::categories::CategoryConfig;
use crate::concept::ConceptId;
use crate::errors::{OptionsError, OptionsResult};

/// User session state consumed by the row expander.
///
/// Entries in the expanded/collapsed sets are concept ids (every occurrence)
/// or row paths (one occurrence). An entry is never in both sets.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    #[serde(default)]
    pub expand_all: bool,
    #[serde(default)]
    pub specific_nodes_expanded: BTreeSet<String>,
    #[serde(default)]
    pub specific_nodes_collapsed: BTreeSet<String>,
    #[serde(default)]
    pub special_concept_treatment: BTreeMap<String, bool>,
}

impl DisplayOptions {
    /// Options with every category at its configured default.
    pub fn from_config(categories: &[CategoryConfig]) -> Self {
        Self {
            special_concept_treatment: categories
                .iter()
                .map(|c| (c.name.clone(), c.default_active))
                .collect(),
            ..Self::default()
        }
    }

    pub fn is_active(&self, category: &str) -> bool {
        self.special_concept_treatment
            .get(category)
            .copied()
            .unwrap_or(false)
    }

    pub fn with_expand_all(mut self, expand_all: bool) -> Self {
        self.expand_all = expand_all;
        self
    }

    pub fn with_treatment(mut self, category: &str, active: bool) -> Self {
        self.special_concept_treatment
            .insert(category.to_string(), active);
        self
    }

    pub fn from_json(json: &str) -> OptionsResult<Self> {
        let options: DisplayOptions = serde_json::from_str(json)?;
        if let Some(both) = options
            .specific_nodes_expanded
            .intersection(&options.specific_nodes_collapsed)
            .next()
        {
            return Err(OptionsError::InvalidAction(format!(
                "'{}' is both expanded and collapsed",
                both
            )));
        }
        Ok(options)
    }

    pub fn to_json(&self) -> OptionsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpandDirection {
    Expand,
    Collapse,
}

fn deserialize_node_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    ConceptId::deserialize(deserializer).map(String::from)
}

/// Actions dispatched by the interaction layer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayAction {
    #[serde(rename_all = "camelCase")]
    ToggleNodeExpanded {
        #[serde(deserialize_with = "deserialize_node_key")]
        node_id: String,
        direction: ExpandDirection,
    },
    #[serde(rename_all = "camelCase")]
    ToggleOption { special_concept_type: String },
    ToggleExpandAll,
    /// Any action type this reducer does not know.
    #[serde(other)]
    Unknown,
}

impl DisplayAction {
    pub fn expand(node_id: impl Into<String>) -> Self {
        DisplayAction::ToggleNodeExpanded {
            node_id: node_id.into(),
            direction: ExpandDirection::Expand,
        }
    }

    pub fn collapse(node_id: impl Into<String>) -> Self {
        DisplayAction::ToggleNodeExpanded {
            node_id: node_id.into(),
            direction: ExpandDirection::Collapse,
        }
    }

    pub fn toggle_option(category: &str) -> Self {
        DisplayAction::ToggleOption {
            special_concept_type: category.to_string(),
        }
    }

    /// Parse and validate an action coming from the UI.
    pub fn parse(json: &str) -> OptionsResult<Self> {
        let action: DisplayAction = serde_json::from_str(json)?;
        action.validate()?;
        Ok(action)
    }

    pub fn validate(&self) -> OptionsResult<()> {
        match self {
            DisplayAction::ToggleNodeExpanded { node_id, .. } if node_id.trim().is_empty() => {
                Err(OptionsError::EmptyNodeId)
            }
            DisplayAction::ToggleOption {
                special_concept_type,
            } if special_concept_type.trim().is_empty() => Err(OptionsError::EmptyCategory),
            _ => Ok(()),
        }
    }
}

/// Apply one action. Never mutates `state`.
pub fn reduce(state: &Arc<DisplayOptions>, action: &DisplayAction) -> Arc<DisplayOptions> {
    match action {
        DisplayAction::ToggleNodeExpanded { node_id, direction } => {
            let (add_to, remove_from) = match direction {
                ExpandDirection::Expand => (
                    &state.specific_nodes_expanded,
                    &state.specific_nodes_collapsed,
                ),
                ExpandDirection::Collapse => (
                    &state.specific_nodes_collapsed,
                    &state.specific_nodes_expanded,
                ),
            };
            if add_to.contains(node_id) && !remove_from.contains(node_id) {
                return state.clone();
            }

            let mut next = DisplayOptions::clone(state);
            let (add_to, remove_from) = match direction {
                ExpandDirection::Expand => (
                    &mut next.specific_nodes_expanded,
                    &mut next.specific_nodes_collapsed,
                ),
                ExpandDirection::Collapse => (
                    &mut next.specific_nodes_collapsed,
                    &mut next.specific_nodes_expanded,
                ),
            };
            add_to.insert(node_id.clone());
            remove_from.remove(node_id);
            debug!("{:?} node {}", direction, node_id);
            Arc::new(next)
        }
        DisplayAction::ToggleOption {
            special_concept_type,
        } => match state.special_concept_treatment.get(special_concept_type) {
            Some(active) => {
                let mut next = DisplayOptions::clone(state);
                next.special_concept_treatment
                    .insert(special_concept_type.clone(), !active);
                debug!("Category {} now {}", special_concept_type, !active);
                Arc::new(next)
            }
            None => {
                warn!(
                    "Ignoring toggle of unconfigured category '{}'",
                    special_concept_type
                );
                state.clone()
            }
        },
        DisplayAction::ToggleExpandAll => {
            let mut next = DisplayOptions::clone(state);
            next.expand_all = !state.expand_all;
            Arc::new(next)
        }
        DisplayAction::Unknown => {
            warn!("Ignoring unknown display action");
            state.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{default_categories, ALL_BUT_FIRST_OCCURRENCE, NON_STANDARD};

    fn initial() -> Arc<DisplayOptions> {
        Arc::new(DisplayOptions::from_config(&default_categories()))
    }

    #[test]
    fn test_defaults_follow_config() {
        let state = initial();
        assert!(!state.expand_all);
        assert!(state.is_active(ALL_BUT_FIRST_OCCURRENCE));
        assert!(!state.is_active(NON_STANDARD));
        assert!(!state.is_active("unheard-of"));
    }

    #[test]
    fn test_expand_then_collapse_moves_between_sets() {
        let state = initial();
        let expanded = reduce(&state, &DisplayAction::expand("42"));
        assert!(expanded.specific_nodes_expanded.contains("42"));
        assert!(!state.specific_nodes_expanded.contains("42"));

        let collapsed = reduce(&expanded, &DisplayAction::collapse("42"));
        assert!(collapsed.specific_nodes_collapsed.contains("42"));
        assert!(!collapsed.specific_nodes_expanded.contains("42"));
        assert!(expanded.specific_nodes_expanded.contains("42"));
    }

    #[test]
    fn test_repeated_expand_returns_same_reference() {
        let state = reduce(&initial(), &DisplayAction::expand("42"));
        let again = reduce(&state, &DisplayAction::expand("42"));
        assert!(Arc::ptr_eq(&state, &again));
    }

    #[test]
    fn test_toggle_option_flips_only_known_categories() {
        let state = initial();
        let toggled = reduce(&state, &DisplayAction::toggle_option(NON_STANDARD));
        assert!(toggled.is_active(NON_STANDARD));
        assert!(!Arc::ptr_eq(&state, &toggled));

        let unknown = reduce(&state, &DisplayAction::toggle_option("unheard-of"));
        assert!(Arc::ptr_eq(&state, &unknown));
    }

    #[test]
    fn test_toggle_expand_all() {
        let state = initial();
        let toggled = reduce(&state, &DisplayAction::ToggleExpandAll);
        assert!(toggled.expand_all);
        assert!(!reduce(&toggled, &DisplayAction::ToggleExpandAll).expand_all);
    }

    #[test]
    fn test_unknown_action_type_is_a_no_op() {
        let action = DisplayAction::parse(r#"{"type": "SORT_BY_NAME"}"#).unwrap();
        assert_eq!(action, DisplayAction::Unknown);
        let state = initial();
        assert!(Arc::ptr_eq(&state, &reduce(&state, &action)));
    }

    #[test]
    fn test_parse_actions_from_json() {
        let action =
            DisplayAction::parse(r#"{"type": "TOGGLE_NODE_EXPANDED", "nodeId": 123, "direction": "expand"}"#)
                .unwrap();
        assert_eq!(action, DisplayAction::expand("123"));

        let action =
            DisplayAction::parse(r#"{"type": "TOGGLE_OPTION", "specialConceptType": "nonStandard"}"#)
                .unwrap();
        assert_eq!(action, DisplayAction::toggle_option("nonStandard"));

        let err = DisplayAction::parse(
            r#"{"type": "TOGGLE_NODE_EXPANDED", "nodeId": " ", "direction": "collapse"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, OptionsError::EmptyNodeId));
    }

    #[test]
    fn test_options_json_round_trip() {
        let state = reduce(&initial(), &DisplayAction::collapse("7"));
        let json = state.to_json().unwrap();
        assert!(json.contains("specificNodesCollapsed"));
        assert_eq!(DisplayOptions::from_json(&json).unwrap(), *state);
    }

    #[test]
    fn test_options_rejecting_overlapping_sets() {
        let json = r#"{"specificNodesExpanded": ["1"], "specificNodesCollapsed": ["1"]}"#;
        assert!(DisplayOptions::from_json(json).is_err());
    }
}
