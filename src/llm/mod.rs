//! LLM driver trait and the `OpenAI`-compatible Chat Completions driver.
//!
//! The [`LlmDriver`] trait is the seam between the intent resolver and the
//! model endpoint: one request in, one complete reply out. Replies are not
//! streamed.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_weather::llm::{ChatCompletionsDriver, LlmSettings, Provider};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.deepseek.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "deepseek-chat".to_string(),
//!     provider: Provider::DeepSeek,
//!     temperature: 0.0,
//!     timeout: None,
//! };
//! let driver = ChatCompletionsDriver::new(settings)?;
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsDriver;
pub use provider::Provider;

use std::time::Duration;

/// LLM connection and model settings.
#[derive(Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.deepseek.com`).
    pub base_url: String,
    /// API key, sent as a bearer token.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `deepseek-chat`, `gpt-4o`).
    pub model: String,
    /// Provider type (auto-detected from `base_url` if not specified).
    pub provider: Provider,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    #[serde(default)]
    pub id: String,
    /// Type of tool (always "function" for now).
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    /// Function details.
    pub function: ToolCallFunction,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Function details in a tool call.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToolCallFunction {
    /// Function name.
    pub name: String,
    /// Arguments as JSON string.
    #[serde(default)]
    pub arguments: String,
}

/// Request to an LLM driver.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Available tools in `OpenAI` function schema format.
    pub tools: Vec<serde_json::Value>,
}

/// Complete assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmReply {
    /// Assistant text, if any.
    pub content: Option<String>,
    /// Native tool calls, if the model used them.
    pub tool_calls: Vec<ToolCall>,
    /// Provider-reported finish reason.
    pub finish_reason: Option<String>,
}

impl LlmReply {
    /// A text-only reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// A reply carrying a single native tool call.
    pub fn tool_call(name: impl Into<String>, arguments_json: impl Into<String>) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_0".to_string(),
                call_type: default_call_type(),
                function: ToolCallFunction {
                    name: name.into(),
                    arguments: arguments_json.into(),
                },
            }],
            finish_reason: Some("tool_calls".to_string()),
        }
    }
}

/// Trait for LLM drivers.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Send a request and wait for the complete reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply cannot be decoded.
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmReply>;
}
