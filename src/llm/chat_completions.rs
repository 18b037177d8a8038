//! OpenAI Chat Completions API driver.
//!
//! Implements [`LlmDriver`] against `/v1/chat/completions` (or the
//! provider-specific equivalent) with `stream: false`.

use anyhow::{Context, anyhow};
use serde::Deserialize;

use super::{LlmDriver, LlmReply, LlmRequest, LlmSettings, Provider, ToolCall};

/// Driver for the OpenAI Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    pub fn new(settings: LlmSettings) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build().context("failed to build LLM HTTP client")?,
            settings,
        })
    }

    fn request_body(&self, req: &LlmRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": false,
            "temperature": self.settings.temperature,
            "messages": req.messages,
        });
        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools.clone());
            body["tool_choice"] = serde_json::Value::String("auto".to_string());
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmReply> {
        let url = self.settings.provider.build_chat_url(&self.settings.base_url);
        let body = self.request_body(&req);

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            message_count = req.messages.len(),
            tool_count = req.tools.len(),
            "Sending chat completion request"
        );

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = match self.settings.provider {
                Provider::AzureOpenAI { .. } => rb.header("api-key", k),
                _ => rb.bearer_auth(k),
            };
        }

        let resp = rb.send().await.context("LLM request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("LLM returned {status}: {}", text.trim()));
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .context("failed to decode chat completion response")?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("chat completion response has no choices"))?;

        let reply = LlmReply {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        };

        tracing::debug!(
            finish_reason = ?reply.finish_reason,
            content_length = reply.content.as_deref().map_or(0, str::len),
            tool_call_count = reply.tool_calls.len(),
            "Chat completion received"
        );

        Ok(reply)
    }
}
