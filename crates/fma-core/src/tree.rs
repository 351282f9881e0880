//! Node tree snapshots
//!
//! A tree is loaded once from a JSON document with a `nodes` array and is
//! read-only afterwards. The id -> node index is built up front and shared
//! by all concurrent analysis units without locking.

use crate::error::TreeError;
use crate::types::Node;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Lookup of every node in a tree by identifier
pub type NodeIndex = HashMap<String, Node>;

/// A read-only snapshot of a node tree
#[derive(Debug, Clone, Deserialize)]
pub struct NodeTree {
    #[serde(default)]
    nodes: Vec<Node>,
}

impl NodeTree {
    /// Load a tree from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TreeError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse a tree from a JSON string
    pub fn from_json_str(raw: &str) -> Result<Self, TreeError> {
        let tree: NodeTree = serde_json::from_str(raw)?;
        for (index, node) in tree.nodes.iter().enumerate() {
            if node.id.is_empty() {
                return Err(TreeError::EmptyNodeId { index });
            }
        }
        Ok(tree)
    }

    /// All nodes, in snapshot order
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes in the snapshot
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot holds no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build the id -> node lookup covering the whole tree.
    ///
    /// Built once per run; later duplicates of an id win, matching the
    /// snapshot producer's own semantics.
    #[must_use]
    pub fn index(&self) -> NodeIndex {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.clone()))
            .collect()
    }
}
