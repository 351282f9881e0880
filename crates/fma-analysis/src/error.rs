//! Error types for the analysis stage
//!
//! Only structural failures surface here; per-node completion failures
//! are recorded into the node's output artifact instead.

/// Failure of an analysis run
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Artifact directory or file could not be written
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
