//! Error types for taxonomy merging

use std::path::PathBuf;

/// Failure of a merge run
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// An input file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// An input file is not valid JSON
    #[error("invalid json in {}: {source}", .path.display())]
    Json {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// An input file does not have the taxonomy file shape
    #[error("invalid taxonomy file format: {}", .path.display())]
    InvalidShape {
        /// Offending file
        path: PathBuf,
    },

    /// No input validated successfully
    #[error("no valid taxonomy files found to merge")]
    NothingValid,

    /// The merged output could not be written
    #[error("failed to write merged output: {0}")]
    WriteFailed(#[from] std::io::Error),
}
