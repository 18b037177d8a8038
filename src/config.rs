use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::client::DEFAULT_FALLBACK_MESSAGE;
use crate::llm::{LlmSettings, Provider};
use crate::weather::openweathermap::{DEFAULT_BASE_URL, WeatherSettings};

/// Prefix for environment overrides, e.g. `MCP_WEATHER_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "MCP_WEATHER";

const PLACEHOLDER_SECRET: &str = "your_api_key_here";

#[derive(Parser, Debug)]
#[command(author, version, about = "Weather questions answered through an LLM and an MCP server", long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address the MCP server binds to
    #[arg(long)]
    pub host: Option<String>,

    /// Port the MCP server listens on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// MCP server root URL used by the chat client
    #[arg(long, env = "MCP_SERVER_URL")]
    pub server_url: Option<String>,

    /// Disable the server's request timeout
    #[arg(long, env = "TIMEOUT_DISABLED")]
    pub timeout_disabled: Option<bool>,

    /// Print intent, function call and result for every turn
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Run the MCP server only
    Serve,
    /// Run the interactive client against a running server
    Chat,
    /// Run the server in-process and the client against it
    #[default]
    Run,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub llm: LlmConfig,
    pub weather: WeatherConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub timeout_disabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Defaults to the local server address when unset.
    #[serde(default)]
    pub server_url: Option<String>,
    pub request_timeout_secs: u64,
    pub fallback_message: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub azure_deployment: Option<String>,
    #[serde(default)]
    pub azure_api_version: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    pub base_url: String,
    pub units: String,
    pub lang: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::load_from_cli(&cli)
    }

    /// Layering, lowest first: defaults, config file, `MCP_WEATHER_*`
    /// environment, CLI flags.
    pub fn load_from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8765)?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.timeout_disabled", false)?
            .set_default("client.request_timeout_secs", 15)?
            .set_default("client.fallback_message", DEFAULT_FALLBACK_MESSAGE)?
            .set_default("llm.base_url", "https://api.deepseek.com")?
            .set_default("llm.model", "deepseek-chat")?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.request_timeout_secs", 60)?
            .set_default("weather.base_url", DEFAULT_BASE_URL)?
            .set_default("weather.units", "metric")?
            .set_default("weather.lang", "zh_cn")?
            .set_default("weather.request_timeout_secs", 10)?
            .set_default("logging.format", "text")?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = &cli.host {
            builder = builder.set_override("server.host", host.as_str())?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(url) = &cli.server_url {
            builder = builder.set_override("client.server_url", url.as_str())?;
        }
        if let Some(td) = cli.timeout_disabled {
            builder = builder.set_override("server.timeout_disabled", td)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.check_timeouts()?;
        Ok(config)
    }

    /// The client must outwait the weather lookup, or a hung upstream
    /// surfaces as a transport fault instead of a `provider_error`.
    fn check_timeouts(&self) -> Result<(), config::ConfigError> {
        if self.client.request_timeout_secs <= self.weather.request_timeout_secs {
            return Err(config::ConfigError::Message(format!(
                "client.request_timeout_secs ({}) must be greater than weather.request_timeout_secs ({})",
                self.client.request_timeout_secs, self.weather.request_timeout_secs
            )));
        }
        Ok(())
    }

    /// Root URL the client uses to reach the server.
    pub fn server_url(&self) -> String {
        if let Some(url) = &self.client.server_url {
            return url.clone();
        }
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            other => other,
        };
        format!("http://{host}:{}", self.server.port)
    }

    pub fn server_request_timeout(&self) -> Option<Duration> {
        (!self.server.timeout_disabled)
            .then(|| Duration::from_secs(self.server.request_timeout_secs))
    }

    pub fn client_request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_secs)
    }

    pub fn llm_settings(&self, api_key: String) -> LlmSettings {
        let mut provider = Provider::detect_from_url(&self.llm.base_url);
        if let Provider::AzureOpenAI { .. } = provider {
            provider = Provider::AzureOpenAI {
                deployment_name: self
                    .llm
                    .azure_deployment
                    .clone()
                    .unwrap_or_else(|| self.llm.model.clone()),
                api_version: self
                    .llm
                    .azure_api_version
                    .clone()
                    .unwrap_or_else(|| "2024-08-01-preview".to_string()),
            };
        }

        LlmSettings {
            base_url: self.llm.base_url.clone(),
            api_key: Some(api_key),
            model: self.llm.model.clone(),
            provider,
            temperature: self.llm.temperature,
            timeout: Some(Duration::from_secs(self.llm.request_timeout_secs)),
        }
    }

    pub fn weather_settings(&self, api_key: String) -> WeatherSettings {
        WeatherSettings {
            base_url: self.weather.base_url.clone(),
            api_key,
            units: self.weather.units.clone(),
            lang: self.weather.lang.clone(),
            timeout: Some(Duration::from_secs(self.weather.request_timeout_secs)),
        }
    }
}

/// A required secret is absent from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("missing required secret: set {0} in the environment or .env")]
    Missing(String),

    #[error("{0} still holds the placeholder value")]
    Placeholder(String),
}

/// LLM API key from `LLM_API_KEY`, falling back to `DEEPSEEK_API_KEY`.
pub fn llm_api_key() -> Result<String, SecretError> {
    read_secret(&["LLM_API_KEY", "DEEPSEEK_API_KEY"], |k| std::env::var(k).ok())
}

/// Weather API key from `OPENWEATHERMAP_API_KEY`.
pub fn weather_api_key() -> Result<String, SecretError> {
    read_secret(&["OPENWEATHERMAP_API_KEY"], |k| std::env::var(k).ok())
}

/// First non-blank value among `names`.
pub fn read_secret(
    names: &[&str],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, SecretError> {
    for name in names {
        let Some(value) = lookup(name) else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if value == PLACEHOLDER_SECRET {
            return Err(SecretError::Placeholder((*name).to_string()));
        }
        return Ok(value.to_string());
    }
    Err(SecretError::Missing(names.join(" or ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_secret_fallback_order() {
        let key = read_secret(
            &["LLM_API_KEY", "DEEPSEEK_API_KEY"],
            lookup(&[("DEEPSEEK_API_KEY", "sk-deep")]),
        );
        assert_eq!(key.unwrap(), "sk-deep");
    }

    #[test]
    fn test_blank_secret_is_missing() {
        let err = read_secret(&["OPENWEATHERMAP_API_KEY"], lookup(&[("OPENWEATHERMAP_API_KEY", "  ")]))
            .unwrap_err();
        assert_eq!(err, SecretError::Missing("OPENWEATHERMAP_API_KEY".to_string()));
    }

    #[test]
    fn test_placeholder_secret_is_rejected() {
        let err = read_secret(
            &["OPENWEATHERMAP_API_KEY"],
            lookup(&[("OPENWEATHERMAP_API_KEY", "your_api_key_here")]),
        )
        .unwrap_err();
        assert!(matches!(err, SecretError::Placeholder(_)));
    }

    #[test]
    fn test_cli_subcommand_defaults_to_run() {
        let cli = Cli::try_parse_from(["mcp-weather"]).unwrap();
        assert_eq!(cli.command.unwrap_or_default(), Command::Run);

        let cli = Cli::try_parse_from(["mcp-weather", "-v", "chat"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.command, Some(Command::Chat));
    }
}
