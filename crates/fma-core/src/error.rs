//! Error types for FMA core
//!
//! Covers loading and validation failures for the two external inputs:
//! node tree snapshots and taxonomy definition files. These are
//! configuration-class errors and always surface to the caller.

use std::path::PathBuf;

/// Taxonomy validation errors
#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    /// File missing on disk
    #[error("taxonomy file not found: {0}")]
    NotFound(PathBuf),

    /// File exists but could not be read
    #[error("failed to read taxonomy: {0}")]
    Io(#[from] std::io::Error),

    /// Document failed to parse as JSON
    #[error("taxonomy is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Top level must be a single name -> categories mapping
    #[error("taxonomy must contain exactly one top-level name mapping to categories")]
    NotSingleRoot,

    /// The root value must be an object of categories
    #[error("taxonomy '{name}' must map to an object of categories")]
    RootNotObject { name: String },

    /// A level1 category must map to an object of subcategories
    #[error("category '{category}' must map to an object of subcategories")]
    CategoryNotObject { category: String },

    /// A level2 subcategory must map to a list of example strings
    #[error("subcategory '{subcategory}' under '{category}' must map to a list of example strings")]
    ExamplesNotList {
        category: String,
        subcategory: String,
    },
}

/// Node tree loading errors
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// File missing on disk
    #[error("node tree file not found: {0}")]
    NotFound(PathBuf),

    /// File exists but could not be read
    #[error("failed to read node tree: {0}")]
    Io(#[from] std::io::Error),

    /// Document failed to parse into the expected shape
    #[error("node tree is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    /// A node is missing its identifier
    #[error("node at index {index} has an empty id")]
    EmptyNodeId { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_error_display() {
        let err = TaxonomyError::ExamplesNotList {
            category: "Bugs".to_string(),
            subcategory: "OffByOne".to_string(),
        };
        assert!(err.to_string().contains("OffByOne"));
        assert!(err.to_string().contains("Bugs"));
    }

    #[test]
    fn tree_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = TreeError::from(json_err);
        assert!(matches!(err, TreeError::Json(_)));
    }
}
