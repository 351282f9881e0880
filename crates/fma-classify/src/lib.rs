//! FMA feedback classification
//!
//! Second pipeline stage:
//! - [`collector`]: reads per-node analysis outputs back into ordered
//!   feedback items
//! - [`classifier`]: batches feedback through schema-validated completion
//!   calls, classifying every mentioned issue into a two-level taxonomy

pub mod classifier;
pub mod collector;
pub mod error;

pub use classifier::{
    chunk_batches, write_classification, BatchClassifier, ClassifyOutput, CLASSIFY_INSTRUCTION,
    SCHEMA_NAME, UNCATEGORIZED,
};
pub use collector::collect;
pub use error::{ClassifyError, CollectError};
