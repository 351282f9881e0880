//! FMA taxonomy merging
//!
//! Combines one or more taxonomy classification files into a single
//! de-duplicated, deterministically ordered result. Merging is idempotent:
//! re-merging overlapping or rerun outputs never duplicates an entry.

pub mod error;
pub mod merger;

pub use error::MergeError;
pub use merger::{gather_input_files, merge, write_merged};
