use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::categories::{default_categories, CategoryConfig};
use crate::errors::{DataLoadError, DataLoadResult};
use crate::options::DisplayOptions;
use crate::ordering::SiblingOrderKind;

/// ## Structure
///
/// ```text
/// ViewerConfig
///   ├── sibling_order: SiblingOrderKind
///   │   ├── record_count
///   │   └── name
///   └── categories: Vec<CategoryConfig>
///       ├── name: String
///       ├── rule: TreatmentRule
///       │   ├── show_though_collapsed
///       │   └── hide_though_expanded
///       ├── default_active: bool
///       └── description: Option<String>
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    #[serde(default)]
    pub sibling_order: SiblingOrderKind,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            sibling_order: SiblingOrderKind::default(),
            categories: default_categories(),
        }
    }
}

impl ViewerConfig {
    pub fn from_yaml(yaml: &str) -> DataLoadResult<Self> {
        let config: ViewerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> DataLoadResult<Self> {
        let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> DataLoadResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> DataLoadResult<()> {
        let mut names = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(DataLoadError::InvalidConfig(
                    "category name cannot be empty".to_string(),
                ));
            }
            if !names.insert(category.name.as_str()) {
                return Err(DataLoadError::InvalidConfig(format!(
                    "category '{}' is configured twice",
                    category.name
                )));
            }
        }
        Ok(())
    }

    /// Display options with every category at its configured default.
    pub fn default_options(&self) -> DisplayOptions {
        DisplayOptions::from_config(&self.categories)
    }
}
