//! Testing utilities for the FMA workspace
//!
//! Shared fixtures and a scripted completion client.

#![allow(missing_docs)]

use async_trait::async_trait;
use fma_core::{Node, NodeTree, Taxonomy};
use fma_llm::client::validate_against;
use fma_llm::{CompletionClient, LlmError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply from the mock client
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text (serialized for json calls)
    Text(String),
    /// Return this value (json calls validate it like the real boundary)
    Json(Value),
    /// Fail with a transport error carrying this cause
    Fail(String),
}

/// A completion call observed by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub instruction: String,
    pub prompt: String,
    pub schema_name: Option<String>,
}

/// Scripted stand-in for the completion service.
///
/// Replies are popped from the script in call order; when the script is
/// exhausted the fallback reply repeats. Structured replies are validated
/// against the caller's schema exactly like the real client, so schema
/// violations surface at the boundary in tests too.
pub struct MockCompletionClient {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockCompletionClient {
    pub fn scripted(script: Vec<MockReply>, fallback: MockReply) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_text(text: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), MockReply::Text(text.into()))
    }

    pub fn always_json(value: Value) -> Self {
        Self::scripted(Vec::new(), MockReply::Json(value))
    }

    pub fn always_fail(cause: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), MockReply::Fail(cause.into()))
    }

    /// Calls observed so far, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self) -> MockReply {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn record(&self, instruction: &str, prompt: &str, schema_name: Option<&str>) {
        self.calls.lock().unwrap().push(RecordedCall {
            instruction: instruction.to_string(),
            prompt: prompt.to_string(),
            schema_name: schema_name.map(str::to_string),
        });
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete_text(&self, instruction: &str, prompt: &str) -> Result<String, LlmError> {
        self.record(instruction, prompt, None);
        match self.next_reply() {
            MockReply::Text(text) => Ok(text),
            MockReply::Json(value) => Ok(value.to_string()),
            MockReply::Fail(cause) => Err(LlmError::Transport(cause)),
        }
    }

    async fn complete_json(
        &self,
        instruction: &str,
        prompt: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        self.record(instruction, prompt, Some(schema_name));
        let value = match self.next_reply() {
            MockReply::Json(value) => value,
            MockReply::Text(text) => serde_json::from_str(&text)
                .map_err(|e| LlmError::Schema(format!("output is not valid json: {e}")))?,
            MockReply::Fail(cause) => return Err(LlmError::Transport(cause)),
        };
        validate_against(schema, &value)?;
        Ok(value)
    }
}

/// Build a node with the given links and texts
pub fn make_node(id: &str, parent: Option<&str>, plan: &str, code: &str, analysis: &str) -> Node {
    Node {
        id: id.to_string(),
        parent: parent.map(str::to_string),
        plan: plan.to_string(),
        code: code.to_string(),
        analysis: analysis.to_string(),
        step: None,
    }
}

/// Build a linear tree of `n` nodes: node0 <- node1 <- ... <- node(n-1)
pub fn make_linear_tree(n: usize) -> NodeTree {
    let nodes: Vec<Value> = (0..n)
        .map(|i| {
            let parent = if i == 0 {
                Value::Null
            } else {
                Value::String(format!("node{}", i - 1))
            };
            serde_json::json!({
                "id": format!("node{i}"),
                "parent": parent,
                "plan": format!("plan {i}"),
                "code": format!("code {i}"),
                "analysis": format!("analysis {i}"),
                "step": i
            })
        })
        .collect();
    let doc = serde_json::json!({ "nodes": nodes });
    NodeTree::from_json_str(&doc.to_string()).unwrap()
}

/// A small two-level taxonomy used across tests
pub fn make_taxonomy() -> Taxonomy {
    Taxonomy::from_json_str(
        r#"{
            "Failure Modes": {
                "Bugs": {"OffByOne": ["loop bound misses last element"], "Uncategorized": []},
                "Data": {"Leakage": ["test rows seen in training"], "Uncategorized": []}
            }
        }"#,
    )
    .unwrap()
}
