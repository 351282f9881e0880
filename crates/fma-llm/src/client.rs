//! Completion client trait and the OpenAI Responses API transport

use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Environment variable the API key is read from
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-5";

/// Transport abstraction over a single external completion call.
///
/// Implementations must be shareable across concurrent work units.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Free-text completion
    async fn complete_text(&self, instruction: &str, prompt: &str) -> Result<String, LlmError>;

    /// Structured completion validated against `schema`.
    ///
    /// Output that cannot be parsed as JSON or does not satisfy the schema
    /// is an [`LlmError::Schema`] - it never passes through silently.
    async fn complete_json(
        &self,
        instruction: &str,
        prompt: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, LlmError>;
}

/// Configuration for the OpenAI transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key
    pub api_key: String,
    /// Base URL (default: https://api.openai.com/v1)
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum transport-level retries for transient failures
    pub max_retries: u32,
    /// Reasoning effort passed to reasoning models
    pub reasoning_effort: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).unwrap_or_default(),
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 120,
            max_retries: 3,
            reasoning_effort: "low".to_string(),
        }
    }
}

/// Completion client over the OpenAI Responses API
#[derive(Debug)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a client from explicit configuration
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey {
                env_var: API_KEY_ENV,
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Create a client from the environment
    pub fn from_env() -> Result<Self, LlmError> {
        Self::new(OpenAiConfig::default())
    }

    /// Model in use
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &ResponsesRequest) -> Result<ResponsesReply, LlmError> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_secs(1u64 << (attempt - 1));
                tokio::time::sleep(delay).await;
            }
            match self.try_send(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = self.config.max_retries + 1,
                        error = %e,
                        "completion request failed, retrying"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| LlmError::Transport("all retry attempts failed".to_string())))
    }

    async fn try_send(&self, request: &ResponsesRequest) -> Result<ResponsesReply, LlmError> {
        let response = self
            .client
            .post(format!("{}/responses", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| LlmError::Transport(format!("failed to parse response body: {e}")))
    }

    fn base_request(&self, instruction: &str, prompt: &str) -> ResponsesRequest {
        ResponsesRequest {
            model: self.config.model.clone(),
            input: prompt.to_string(),
            instructions: Some(instruction.to_string()),
            reasoning: Some(Reasoning {
                effort: self.config.reasoning_effort.clone(),
            }),
            text: None,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete_text(&self, instruction: &str, prompt: &str) -> Result<String, LlmError> {
        let request = self.base_request(instruction, prompt);
        let reply = self.send(&request).await?;

        let text = reply.output_text();
        if text.is_empty() {
            // Best-effort fallback: surface whatever the service returned
            return Ok(serde_json::to_string(&reply.output).unwrap_or_default());
        }
        Ok(text)
    }

    async fn complete_json(
        &self,
        instruction: &str,
        prompt: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        let mut request = self.base_request(instruction, prompt);
        request.text = Some(TextConfig {
            format: TextFormat {
                format_type: "json_schema".to_string(),
                name: Some(schema_name.to_string()),
                strict: Some(true),
                schema: Some(schema.clone()),
            },
        });

        let reply = self.send(&request).await?;
        let text = reply.output_text();
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::Schema(format!("output is not valid json: {e}")))?;
        validate_against(schema, &value)?;
        Ok(value)
    }
}

/// Validate `instance` against a JSON Schema
pub fn validate_against(schema: &Value, instance: &Value) -> Result<(), LlmError> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| LlmError::Schema(format!("invalid schema: {e}")))?;
    if let Err(errors) = compiled.validate(instance) {
        let details: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(LlmError::Schema(details.join("; ")));
    }
    Ok(())
}

// --- Responses API wire types ---

#[derive(Debug, Serialize)]
struct Reasoning {
    effort: String,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<Reasoning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig>,
}

#[derive(Debug, Serialize)]
struct TextConfig {
    format: TextFormat,
}

#[derive(Debug, Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    format_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

impl ResponsesReply {
    /// Concatenated text of all message output items
    fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.item_type == "message")
            .flat_map(|item| &item.content)
            .filter(|c| c.content_type == "output_text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}
