//! Core types shared by the pipeline stages
//!
//! - [`Node`]: one work item in an analyzed tree
//! - [`FeedbackItem`]: one collected per-node finding
//! - [`ClassificationEntry`] / [`TaxonomyFile`]: classifier output
//! - [`MergedResult`]: single-taxonomy or aggregate merge output

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One work item in an analyzed tree.
///
/// Nodes are read-only input: loaded once from a snapshot and never
/// mutated by the pipeline. The `parent` field is a reference by id, not
/// ownership - a node never owns its parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Identifier, unique within a tree
    pub id: String,
    /// Optional parent identifier
    #[serde(default)]
    pub parent: Option<String>,
    /// Plan text
    #[serde(default)]
    pub plan: String,
    /// Code text
    #[serde(default)]
    pub code: String,
    /// Run-analysis text (outcome of executing the node)
    #[serde(default)]
    pub analysis: String,
    /// Step number within the run, when recorded
    #[serde(default)]
    pub step: Option<u64>,
}

impl Node {
    /// Parent id, treating an empty string the same as no parent
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref().filter(|p| !p.is_empty())
    }
}

/// One collected per-node finding.
///
/// Only items with non-empty text exist; empty or unreadable outputs are
/// dropped at collection time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Node the finding belongs to
    pub node_id: String,
    /// Finding text, non-empty after trimming
    pub text: String,
}

impl FeedbackItem {
    /// Create a new feedback item
    #[inline]
    #[must_use]
    pub fn new(node_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            text: text.into(),
        }
    }
}

/// One (issue, node, level1, level2) assignment produced by the classifier.
///
/// Fields beyond the four known ones are preserved verbatim so a merge
/// never strips information a producer attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEntry {
    /// The issue extracted from the feedback
    pub issue: String,
    /// Node the feedback belonged to
    pub node_id: String,
    /// Top-level category, constrained to the taxonomy's known set
    pub level1: String,
    /// Subcategory, free text ("Uncategorized" when none fits)
    pub level2: String,
    /// Any additional fields carried by the producing file
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClassificationEntry {
    /// Create an entry with the four known fields
    #[must_use]
    pub fn new(
        issue: impl Into<String>,
        node_id: impl Into<String>,
        level1: impl Into<String>,
        level2: impl Into<String>,
    ) -> Self {
        Self {
            issue: issue.into(),
            node_id: node_id.into(),
            level1: level1.into(),
            level2: level2.into(),
            extra: Map::new(),
        }
    }

    /// De-duplication key: (node_id, issue, level1, level2)
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, String, String) {
        (
            self.node_id.clone(),
            self.issue.clone(),
            self.level1.clone(),
            self.level2.clone(),
        )
    }
}

/// A taxonomy name together with its classification entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyFile {
    /// Name of the taxonomy the entries were classified under
    pub taxonomy_name: String,
    /// Classification entries, in producer order
    pub classifications: Vec<ClassificationEntry>,
}

impl TaxonomyFile {
    /// Create an empty file for a taxonomy name
    #[inline]
    #[must_use]
    pub fn empty(taxonomy_name: impl Into<String>) -> Self {
        Self {
            taxonomy_name: taxonomy_name.into(),
            classifications: Vec::new(),
        }
    }
}

/// Result of merging one or more taxonomy files.
///
/// The single-taxonomy case keeps the `{taxonomy_name, classifications}`
/// shape so downstream consumers of individual classifier outputs can read
/// merged files unchanged; distinct taxonomy names produce the aggregate
/// `{taxonomies: [...]}` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MergedResult {
    /// All inputs shared one taxonomy name
    Single(TaxonomyFile),
    /// Inputs referenced more than one taxonomy
    Aggregate {
        /// One file per distinct taxonomy name, sorted by name
        taxonomies: Vec<TaxonomyFile>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn node_parent_id_empty_is_none() {
        let node: Node = serde_json::from_str(r#"{"id": "a", "parent": ""}"#).unwrap();
        assert_eq!(node.parent_id(), None);

        let node: Node = serde_json::from_str(r#"{"id": "a", "parent": "root"}"#).unwrap();
        assert_eq!(node.parent_id(), Some("root"));

        let node: Node = serde_json::from_str(r#"{"id": "a"}"#).unwrap();
        assert_eq!(node.parent_id(), None);
    }

    #[test]
    fn node_defaults_for_missing_fields() {
        let node: Node = serde_json::from_str(r#"{"id": "n1"}"#).unwrap();
        assert_eq!(node.plan, "");
        assert_eq!(node.code, "");
        assert_eq!(node.analysis, "");
        assert_eq!(node.step, None);
    }

    #[test]
    fn classification_entry_preserves_extra_fields() {
        let raw = r#"{"issue": "slow loop", "node_id": "n1", "level1": "Perf", "level2": "Loops", "confidence": 0.9}"#;
        let entry: ClassificationEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.extra.get("confidence"), Some(&serde_json::json!(0.9)));

        let round = serde_json::to_value(&entry).unwrap();
        assert_eq!(round["confidence"], serde_json::json!(0.9));
    }

    #[test]
    fn classification_entry_dedup_key() {
        let a = ClassificationEntry::new("i", "n", "l1", "l2");
        let mut b = a.clone();
        b.extra.insert("note".into(), serde_json::json!("x"));
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn merged_result_single_shape() {
        let merged = MergedResult::Single(TaxonomyFile::empty("Failure Modes"));
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value["taxonomy_name"], "Failure Modes");
        assert!(value.get("taxonomies").is_none());
    }

    #[test]
    fn merged_result_aggregate_shape() {
        let merged = MergedResult::Aggregate {
            taxonomies: vec![TaxonomyFile::empty("A"), TaxonomyFile::empty("B")],
        };
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value["taxonomies"][0]["taxonomy_name"], "A");
        assert_eq!(value["taxonomies"][1]["taxonomy_name"], "B");
    }
}
