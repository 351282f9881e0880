//! Error types for the classification stage

use std::path::PathBuf;

/// Feedback collection failures - always a misconfigured run, raised
/// immediately
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// Root path is not a directory
    #[error("feedback path not found: {0}")]
    RootNotFound(PathBuf),

    /// Nothing non-empty was found at either scan depth
    #[error("no feedbacks found under {}/*/output.txt{}", .root.display(), .hint)]
    NoFeedback {
        /// Scanned root
        root: PathBuf,
        /// ". Did you mean: <dir>?" when a likely subdirectory exists
        hint: String,
    },
}

/// Classification output write failures
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// Output file could not be written
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be serialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_feedback_message_includes_hint() {
        let err = CollectError::NoFeedback {
            root: PathBuf::from("/tmp/feedback"),
            hint: ". Did you mean: /tmp/feedback/llm_node_analysis?".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("/tmp/feedback/*/output.txt"));
        assert!(text.contains("Did you mean"));
    }

    #[test]
    fn no_feedback_message_without_hint() {
        let err = CollectError::NoFeedback {
            root: PathBuf::from("/tmp/feedback"),
            hint: String::new(),
        };
        assert!(err.to_string().ends_with("output.txt"));
    }
}
