pub mod attributes;
pub mod categories;
pub mod concept;
pub mod config;
pub mod container;
pub mod data_loader;
pub mod errors;
pub mod graph;
pub mod options;
pub mod ordering;
pub mod roots;
pub mod rows;

pub use concept::{ConceptId, ConceptRecord, Dataset, Edge};
pub use config::ViewerConfig;
pub use container::{ContainerCache, DisplayOutput, GraphContainer};
pub use options::{reduce, DisplayAction, DisplayOptions};
