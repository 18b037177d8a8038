//! MCP Weather
//!
//! Entry point: runs the MCP server, the interactive client, or both.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::map_err_ignore)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_fields_in_debug)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_weather::AppState;
use mcp_weather::client::{ConversationTurn, HttpTransport, McpClient, ResolvedIntent};
use mcp_weather::config::{
    AppConfig, Cli, Command, LogFormat, SecretError, llm_api_key, weather_api_key,
};
use mcp_weather::functions::builtin_registry;
use mcp_weather::intent::IntentResolver;
use mcp_weather::llm::ChatCompletionsDriver;
use mcp_weather::mcp::registry::FunctionRegistry;
use mcp_weather::server;
use mcp_weather::weather::OpenWeatherMap;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "退出"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let cli = Cli::parse();
    let config = Arc::new(AppConfig::load_from_cli(&cli)?);
    init_tracing(config.logging.format, cli.debug);

    match cli.command.unwrap_or_default() {
        Command::Serve => {
            let weather_key = require_secret(weather_api_key());
            let registry = build_registry(&config, weather_key)?;
            server::start_server(config, registry).await
        }
        Command::Chat => {
            let llm_key = require_secret(llm_api_key());
            let client = connect_client(&config, llm_key, &config.server_url()).await?;
            chat_loop(&client, cli.verbose).await
        }
        Command::Run => {
            let weather_key = require_secret(weather_api_key());
            let llm_key = require_secret(llm_api_key());
            let registry = build_registry(&config, weather_key)?;

            let listener = server::bind_or_any(&config).await?;
            let server_url = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
            let state = AppState {
                registry,
                config: Arc::clone(&config),
            };
            let mut server_task = tokio::spawn(server::serve(listener, state));

            let client = connect_client(&config, llm_key, &server_url).await?;
            tokio::select! {
                res = chat_loop(&client, cli.verbose) => res,
                res = &mut server_task => match res {
                    Ok(inner) => inner,
                    Err(e) => Err(e.into()),
                },
            }
        }
    }
}

fn init_tracing(format: LogFormat, debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout belongs to the conversation.
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

/// Missing secrets are fatal before anything starts.
fn require_secret(secret: Result<String, SecretError>) -> String {
    match secret {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    }
}

fn build_registry(config: &AppConfig, api_key: String) -> anyhow::Result<Arc<FunctionRegistry>> {
    let settings = config.weather_settings(api_key);
    info!(
        name: "weather.config.loaded",
        base_url = %settings.base_url,
        units = %settings.units,
        lang = %settings.lang,
        "Weather provider configured"
    );
    let provider = OpenWeatherMap::new(settings)?;
    let registry = builtin_registry(Arc::new(provider))?;
    Ok(Arc::new(registry))
}

async fn connect_client(
    config: &AppConfig,
    api_key: String,
    server_url: &str,
) -> anyhow::Result<McpClient> {
    let settings = config.llm_settings(api_key);
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        "LLM configuration loaded"
    );
    let driver = ChatCompletionsDriver::new(settings)?;
    let transport = HttpTransport::new(server_url, Some(config.client_request_timeout()))?;

    let client = McpClient::connect(IntentResolver::new(Arc::new(driver)), Arc::new(transport))
        .await?
        .with_fallback_message(config.client.fallback_message.clone());

    for schema in client.schemas() {
        info!(name: "mcp.function.discovered", function = %schema.name, "MCP function discovered");
    }
    Ok(client)
}

async fn chat_loop(client: &McpClient, verbose: bool) -> anyhow::Result<()> {
    let functions: Vec<&str> = client.schemas().iter().map(|s| s.name.as_str()).collect();
    println!("MCP weather assistant ready. Functions: {}", functions.join(", "));
    println!("Ask a question, or type exit / quit / 退出 to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if EXIT_WORDS.iter().any(|w| text.eq_ignore_ascii_case(w)) {
            break;
        }

        let turn = client.handle_turn(text).await;
        if verbose {
            print_turn_details(&turn);
        }
        println!("{}", turn.answer);
    }

    println!("Goodbye.");
    Ok(())
}

fn print_turn_details(turn: &ConversationTurn) {
    match &turn.intent {
        Some(ResolvedIntent::Call(req)) => {
            let args = serde_json::to_string(&req.arguments).unwrap_or_default();
            println!("  [intent] call {}({args})", req.function);
        }
        Some(ResolvedIntent::NoCall) => println!("  [intent] direct answer"),
        None => println!("  [intent] unresolved"),
    }
    if let Some(result) = &turn.result {
        let body = serde_json::to_string(result).unwrap_or_default();
        println!("  [result] {body}");
    }
    println!("  [state] {:?}", turn.state());
}
