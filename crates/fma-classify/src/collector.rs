//! Feedback collection
//!
//! Reads `<root>/<node_id>/output.txt` artifacts back into an ordered
//! list of feedback items. When the root has no direct matches the scan
//! falls back one directory level deeper (`<root>/<group>/<node_id>/
//! output.txt`) and flattens. Empty or unreadable outputs are dropped;
//! finding nothing at all is a configuration error with a best-guess
//! hint at the intended subdirectory.

use crate::error::CollectError;
use fma_core::FeedbackItem;
use std::path::{Path, PathBuf};

const OUTPUT_FILE: &str = "output.txt";

/// Collect (node_id, feedback_text) pairs under `root`, sorted by node id
pub fn collect(root: impl AsRef<Path>) -> Result<Vec<FeedbackItem>, CollectError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CollectError::RootNotFound(root.to_path_buf()));
    }

    // Immediate children first, one level deeper only as a fallback
    let mut candidates = gather_candidates_at(root);
    if candidates.is_empty() {
        for group in subdirectories(root) {
            candidates.extend(gather_candidates_at(&group));
        }
    }

    candidates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut collected = Vec::new();
    for (node_id, output_path) in candidates {
        let Ok(raw) = std::fs::read_to_string(&output_path) else {
            tracing::debug!(path = %output_path.display(), "skipping unreadable feedback file");
            continue;
        };
        let text = raw.trim();
        if !text.is_empty() {
            collected.push(FeedbackItem::new(node_id, text));
        }
    }

    if collected.is_empty() {
        return Err(CollectError::NoFeedback {
            root: root.to_path_buf(),
            hint: likely_subdirectory_hint(root),
        });
    }

    Ok(collected)
}

/// Node directories directly under `path` that carry an output artifact
fn gather_candidates_at(path: &Path) -> Vec<(String, PathBuf)> {
    let mut results = Vec::new();
    let Ok(entries) = std::fs::read_dir(path) else {
        return results;
    };
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let output = dir.join(OUTPUT_FILE);
        if output.is_file() {
            results.push((entry.file_name().to_string_lossy().into_owned(), output));
        }
    }
    results
}

fn subdirectories(path: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(path) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect()
}

/// ". Did you mean: <dir>?" when a subdirectory looks like an analysis root
fn likely_subdirectory_hint(root: &Path) -> String {
    let likely = subdirectories(root).into_iter().find(|dir| {
        dir.file_name()
            .map(|name| {
                let name = name.to_string_lossy().to_lowercase();
                name.ends_with("analysis") || name.contains("llm_node")
            })
            .unwrap_or(false)
    });
    match likely {
        Some(dir) => format!(". Did you mean: {}?", dir.display()),
        None => String::new(),
    }
}
