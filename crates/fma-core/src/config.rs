//! Stage configuration
//!
//! Plain scalar parameters for the two pipeline stages. Defaults match the
//! observed production values: node analysis runs 5 calls in flight with a
//! 30-node sample cap, classification runs batches of 3 with 4 calls in
//! flight. The two stages deliberately carry independent concurrency
//! limits - each has its own call-rate allowance against the same
//! external service.

use serde::{Deserialize, Serialize};

/// Configuration for the node-analysis stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum concurrent completion calls
    pub concurrency: usize,
    /// Sample cap; trees larger than this are sampled down (0 disables)
    pub max_nodes: usize,
}

impl AnalysisConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With concurrency limit
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With sample cap
    #[inline]
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_nodes: 30,
        }
    }
}

/// Configuration for the batch-classification stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Feedback items per completion call
    pub batch_size: usize,
    /// Maximum concurrent completion calls
    pub concurrency: usize,
}

impl ClassifyConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With batch size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// With concurrency limit
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Batch size clamped to at least one item
    #[inline]
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Concurrency clamped to at least one call in flight
    #[inline]
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            concurrency: 4,
        }
    }
}
