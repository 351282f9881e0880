//! FMA completion client
//!
//! The single external boundary of the pipeline: given a developer
//! instruction and a user prompt, return either free text or a JSON value
//! validated against a supplied schema. Callers decide what a failure
//! means; this crate only classifies it ([`LlmError`]) and, for transient
//! transport faults, retries with exponential backoff.

pub mod client;
pub mod error;

pub use client::{CompletionClient, OpenAiClient, OpenAiConfig};
pub use error::LlmError;
