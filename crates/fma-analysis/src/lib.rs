//! FMA node analysis
//!
//! Walks a node tree and asks the completion service to judge each node
//! for unintended defects:
//! - [`context`]: assembles the per-node analysis context (plan, code,
//!   run analysis, parent finding or sentinel)
//! - [`analyzer`]: samples, schedules, and records per-node artifacts

pub mod analyzer;
pub mod context;
pub mod error;

pub use analyzer::{AnalysisSummary, NodeAnalyzer, ANALYSIS_INSTRUCTION, ERROR_PREFIX};
pub use context::{build_context, NodeContext, NO_PARENT_ANALYSIS, TERM_OUT_MAX_CHARS};
pub use error::AnalysisError;
