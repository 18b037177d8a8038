//! MCP Weather
//!
//! Answers free-text questions about the weather by letting an LLM pick a
//! function, calling it on an MCP server, and having the LLM phrase the result.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP endpoint that dispatches function calls through a registry
//! - **Client**: per-turn state machine (resolve intent, call, resolve answer)
//! - **LLM**: OpenAI-compatible Chat Completions driver (DeepSeek by default)
//! - **Weather**: OpenWeatherMap adapter behind a provider trait
//!
//! # Modules
//!
//! - [`mcp`]: wire types and the function registry
//! - [`functions`]: built-in functions (`get_weather`, `unit_converter`)
//! - [`weather`]: weather provider trait and adapters
//! - [`llm`]: LLM driver trait and implementation
//! - [`intent`]: two-pass intent resolution over an LLM
//! - [`client`]: conversation turns and transports
//! - [`server`]: HTTP surface
//! - [`config`]: CLI, layered configuration and secrets

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod client;
pub mod config;
pub mod functions;
pub mod intent;
pub mod llm;
pub mod mcp;
pub mod server;
pub mod weather;

use std::sync::Arc;

use crate::config::AppConfig;
use mcp::registry::FunctionRegistry;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Functions the server exposes.
    pub registry: Arc<FunctionRegistry>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
