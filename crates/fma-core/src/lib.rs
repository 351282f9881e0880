//! FMA Core - shared data model for the failure-mode analysis pipeline
//!
//! Defines the types that flow between pipeline stages:
//! - Node trees loaded from journal snapshots
//! - Two-level taxonomies (level1 -> level2 -> examples)
//! - Classification entries and taxonomy files
//! - Stage configuration with observed defaults

pub mod config;
pub mod error;
pub mod taxonomy;
pub mod tree;
pub mod types;

// Re-exports for convenience
pub use config::{AnalysisConfig, ClassifyConfig};
pub use error::{TaxonomyError, TreeError};
pub use taxonomy::Taxonomy;
pub use tree::{NodeIndex, NodeTree};
pub use types::{ClassificationEntry, FeedbackItem, MergedResult, Node, TaxonomyFile};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
