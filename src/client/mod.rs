//! MCP client: one conversation turn from user text to final answer.
//!
//! ```text
//! Start → ResolvingIntent ─┬─ answer ─→ Answering ──────────────────→ Done
//!                          └─ call ───→ Dispatching → ResolvingAnswer → Done
//!         (any state) ──── unrecoverable error ───────────────────────→ Failed
//! ```
//!
//! Structured call failures (unknown function, invalid arguments, provider
//! errors) are not unrecoverable: they are handed to the second resolver
//! pass so the user gets a phrased apology. Parse errors, LLM failures and
//! transport faults end the turn in `Failed` with a fixed fallback message.

pub mod transport;

pub use transport::{HttpTransport, LocalTransport, McpTransport, TransportError};

use std::sync::Arc;

use uuid::Uuid;

use crate::intent::{Intent, IntentError, IntentParseError, IntentResolver, PriorCall};
use crate::mcp::types::{FunctionCallRequest, FunctionCallResult, FunctionSchema};

/// Answer given when a turn cannot be completed.
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Sorry, I couldn't process that request right now. Please try again.";

/// States of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Start,
    ResolvingIntent,
    Answering,
    Dispatching,
    ResolvingAnswer,
    Done,
    Failed,
}

/// How the first pass interpreted the user text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedIntent {
    NoCall,
    Call(FunctionCallRequest),
}

/// Record of one completed turn.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub user_text: String,
    pub intent: Option<ResolvedIntent>,
    pub result: Option<FunctionCallResult>,
    pub answer: String,
    /// Every state visited, in order, ending in `Done` or `Failed`.
    pub states: Vec<TurnState>,
}

impl ConversationTurn {
    fn new(user_text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_text: user_text.to_string(),
            intent: None,
            result: None,
            answer: String::new(),
            states: vec![TurnState::Start],
        }
    }

    /// Final state of the turn.
    pub fn state(&self) -> TurnState {
        self.states.last().copied().unwrap_or(TurnState::Start)
    }

    fn enter(&mut self, state: TurnState) {
        tracing::debug!(turn_id = %self.id, from = ?self.state(), to = ?state, "Turn transition");
        self.states.push(state);
    }
}

/// Why a turn ended in `Failed`.
#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Orchestrates turns against an MCP server.
#[derive(Debug, Clone)]
pub struct McpClient {
    resolver: IntentResolver,
    transport: Arc<dyn McpTransport>,
    schemas: Arc<[FunctionSchema]>,
    fallback_message: String,
}

impl McpClient {
    pub fn new(
        resolver: IntentResolver,
        transport: Arc<dyn McpTransport>,
        schemas: Vec<FunctionSchema>,
    ) -> Self {
        Self {
            resolver,
            transport,
            schemas: schemas.into(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Build a client using the schemas the server advertises.
    pub async fn connect(
        resolver: IntentResolver,
        transport: Arc<dyn McpTransport>,
    ) -> Result<Self, TransportError> {
        let schemas = transport.list_functions().await?;
        tracing::info!(
            function_count = schemas.len(),
            "Fetched function schemas from MCP server"
        );
        Ok(Self::new(resolver, transport, schemas))
    }

    #[must_use]
    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }

    pub fn schemas(&self) -> &[FunctionSchema] {
        &self.schemas
    }

    /// Run one turn. Always produces an answer; failures yield the fallback
    /// message and a turn in `Failed`.
    pub async fn handle_turn(&self, user_text: &str) -> ConversationTurn {
        let mut turn = ConversationTurn::new(user_text);
        tracing::info!(turn_id = %turn.id, "Turn started");

        match self.run(&mut turn).await {
            Ok(answer) => {
                turn.answer = answer;
                turn.enter(TurnState::Done);
                tracing::info!(
                    turn_id = %turn.id,
                    called = turn.result.is_some(),
                    "Turn completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    turn_id = %turn.id,
                    state = ?turn.state(),
                    error = %e,
                    "Turn failed"
                );
                turn.answer.clone_from(&self.fallback_message);
                turn.enter(TurnState::Failed);
            }
        }
        turn
    }

    async fn run(&self, turn: &mut ConversationTurn) -> Result<String, TurnError> {
        turn.enter(TurnState::ResolvingIntent);
        let intent = self
            .resolver
            .resolve(&turn.user_text, &self.schemas, None)
            .await?;

        let request = match intent {
            Intent::Answer(text) => {
                turn.intent = Some(ResolvedIntent::NoCall);
                turn.enter(TurnState::Answering);
                return Ok(text);
            }
            Intent::Call(request) => request,
        };

        turn.intent = Some(ResolvedIntent::Call(request.clone()));
        turn.enter(TurnState::Dispatching);
        tracing::info!(
            turn_id = %turn.id,
            function = %request.function,
            "Dispatching function call"
        );
        let result = self.transport.call(&request).await?;
        if let FunctionCallResult::Failure(f) = &result {
            tracing::info!(
                turn_id = %turn.id,
                kind = %f.kind,
                message = %f.message,
                "Function call returned a failure; phrasing it for the user"
            );
        }

        turn.enter(TurnState::ResolvingAnswer);
        let answer = self
            .resolver
            .resolve(
                &turn.user_text,
                &self.schemas,
                Some(PriorCall {
                    request: &request,
                    result: &result,
                }),
            )
            .await;
        turn.result = Some(result);

        match answer? {
            Intent::Answer(text) => Ok(text),
            Intent::Call(call) => Err(IntentError::from(IntentParseError {
                reason: "function call where a final answer was expected".to_string(),
                excerpt: call.function,
            })
            .into()),
        }
    }
}
