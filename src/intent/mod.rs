//! Turning free text into a function call, and a function result back into
//! free text.
//!
//! [`IntentResolver::resolve`] runs in two passes:
//!
//! 1. **First pass**: the user text and the available function schemas go to
//!    the LLM, which either answers directly or names one function with
//!    arguments.
//! 2. **Second pass**: the user text, the call that was made and its
//!    [`FunctionCallResult`] go back to the LLM, which phrases the final
//!    answer (or an apology, if the call failed).
//!
//! Reply classification is delegated to [`parser::parse_reply`].

pub mod parser;

use std::sync::Arc;

use crate::llm::{LlmDriver, LlmRequest, Message};
use crate::mcp::types::{FunctionCallRequest, FunctionCallResult, FunctionSchema};

use parser::{Pass, ParsedReply, parse_reply};

/// The resolved interpretation of one LLM reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Natural-language answer; no function call.
    Answer(String),
    /// Call one function.
    Call(FunctionCallRequest),
}

/// The call made on the first pass, passed into the second pass.
#[derive(Debug, Clone, Copy)]
pub struct PriorCall<'a> {
    pub request: &'a FunctionCallRequest,
    pub result: &'a FunctionCallResult,
}

/// The LLM reply matched neither expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not parse LLM reply: {reason}")]
pub struct IntentParseError {
    pub reason: String,
    /// Leading part of the reply text, for diagnostics.
    pub excerpt: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error(transparent)]
    Parse(#[from] IntentParseError),

    #[error("LLM request failed: {0:#}")]
    Llm(anyhow::Error),
}

const EXCERPT_CHARS: usize = 200;

/// Sends prompts to an [`LlmDriver`] and interprets the replies.
#[derive(Clone)]
pub struct IntentResolver {
    driver: Arc<dyn LlmDriver>,
}

impl std::fmt::Debug for IntentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentResolver")
            .field("driver", &"LlmDriver")
            .finish()
    }
}

impl IntentResolver {
    pub fn new(driver: Arc<dyn LlmDriver>) -> Self {
        Self { driver }
    }

    /// Resolve user text into an [`Intent`].
    ///
    /// Without `prior` this is the first pass and may return either variant.
    /// With `prior` it is the second pass and always returns
    /// [`Intent::Answer`] on success. Never retries.
    pub async fn resolve(
        &self,
        user_text: &str,
        schemas: &[FunctionSchema],
        prior: Option<PriorCall<'_>>,
    ) -> Result<Intent, IntentError> {
        let (pass, req) = match prior {
            None => (Pass::First, first_pass_request(user_text, schemas)),
            Some(prior) => (Pass::Second, second_pass_request(user_text, prior)),
        };

        let reply = self.driver.complete(req).await.map_err(IntentError::Llm)?;

        match parse_reply(&reply, pass) {
            ParsedReply::Answer(text) => Ok(Intent::Answer(text)),
            ParsedReply::Call { name, arguments } => {
                tracing::debug!(function = %name, "LLM requested a function call");
                Ok(Intent::Call(FunctionCallRequest::new(name, arguments)))
            }
            ParsedReply::Unparseable(reason) => {
                let excerpt = reply_excerpt(&reply);
                tracing::warn!(
                    pass = ?pass,
                    reason = %reason,
                    excerpt = %excerpt,
                    "Unparseable LLM reply"
                );
                Err(IntentParseError { reason, excerpt }.into())
            }
        }
    }
}

fn first_pass_request(user_text: &str, schemas: &[FunctionSchema]) -> LlmRequest {
    let system = format!(
        "You are a helpful assistant that can call functions on a remote server to fetch live data.\n\
         \n\
         Available functions:\n\
         {functions}\n\
         \n\
         If answering the user needs live data or a calculation one of these functions provides, \
         call exactly one function. Use the tool-calling mechanism, or reply with only a JSON object \
         of the form {{\"function\": \"<name>\", \"arguments\": {{...}}}} and nothing else. \
         Fill every required argument from the user's message.\n\
         Otherwise, answer the user directly in plain text.",
        functions = render_schemas(schemas)
    );

    LlmRequest {
        messages: vec![Message::system(system), Message::user(user_text)],
        tools: schemas.iter().map(FunctionSchema::to_openai_tool).collect(),
    }
}

fn second_pass_request(user_text: &str, prior: PriorCall<'_>) -> LlmRequest {
    let arguments = serde_json::to_string(&prior.request.arguments).unwrap_or_default();
    let result = serde_json::to_string(prior.result).unwrap_or_default();
    let system = format!(
        "You are a helpful assistant. A function was called on the user's behalf.\n\
         \n\
         Function call: {name}({arguments})\n\
         Function result: {result}\n\
         \n\
         Answer the user's message in natural language using this result, in the user's language. \
         If the result is an error, apologize briefly and explain in plain words what went wrong; \
         do not show error codes or JSON. Do not call any functions.",
        name = prior.request.function,
    );

    LlmRequest {
        messages: vec![Message::system(system), Message::user(user_text)],
        tools: Vec::new(),
    }
}

fn render_schemas(schemas: &[FunctionSchema]) -> String {
    if schemas.is_empty() {
        return "(none)".to_string();
    }
    let mut out = String::new();
    for schema in schemas {
        out.push_str(&format!("- {}: {}\n", schema.name, schema.description));
        for p in &schema.parameters {
            out.push_str(&format!(
                "  - {} ({}, {}): {}\n",
                p.name,
                p.param_type.as_str(),
                if p.required { "required" } else { "optional" },
                p.description
            ));
        }
    }
    out.trim_end().to_string()
}

fn reply_excerpt(reply: &crate::llm::LlmReply) -> String {
    let text = match (&reply.content, reply.tool_calls.first()) {
        (Some(content), _) if !content.trim().is_empty() => content.clone(),
        (_, Some(call)) => format!("{}({})", call.function.name, call.function.arguments),
        _ => String::new(),
    };
    text.chars().take(EXCERPT_CHARS).collect()
}
