//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcp_weather::AppState;
use mcp_weather::config::AppConfig;
use mcp_weather::functions::builtin_registry;
use mcp_weather::llm::{LlmDriver, LlmReply, LlmRequest};
use mcp_weather::mcp::registry::{FunctionHandler, FunctionRegistry, HandlerError};
use mcp_weather::mcp::types::{Arguments, FunctionSchema};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use mcp_weather::weather::{ProviderError, TemperatureUnit, WeatherProvider, WeatherReport};

/// LLM driver that replays a fixed script of replies.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    replies: Mutex<VecDeque<anyhow::Result<LlmReply>>>,
    seen: Mutex<Vec<LlmRequest>>,
}

impl ScriptedDriver {
    pub fn new(replies: Vec<LlmReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            seen: Mutex::default(),
        })
    }

    /// A driver whose every call fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmDriver for ScriptedDriver {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<LlmReply> {
        self.seen.lock().unwrap().push(req);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("LLM unavailable")))
    }
}

/// Weather provider backed by an in-memory table.
#[derive(Debug, Default)]
pub struct FakeWeather {
    reports: HashMap<String, WeatherReport>,
    calls: AtomicUsize,
}

impl FakeWeather {
    pub fn with_city(mut self, city: &str, temperature: f64, condition: &str, humidity: u8) -> Self {
        self.reports.insert(
            city.to_lowercase(),
            WeatherReport {
                city: city.to_string(),
                country: None,
                temperature,
                units: TemperatureUnit::Celsius,
                feels_like: None,
                condition: condition.to_string(),
                humidity,
                wind_speed: None,
                icon: None,
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for FakeWeather {
    async fn current(&self, city: &str) -> Result<WeatherReport, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if city.trim().is_empty() {
            return Err(ProviderError::EmptyCity);
        }
        self.reports
            .get(&city.to_lowercase())
            .cloned()
            .ok_or_else(|| ProviderError::CityNotFound(city.to_string()))
    }
}

/// Default weather table: Shanghai, 21°C, cloudy, 60% humidity.
pub fn shanghai_weather() -> Arc<FakeWeather> {
    Arc::new(FakeWeather::default().with_city("Shanghai", 21.0, "cloudy", 60))
}

/// Handler that answers with an empty object after a delay.
#[derive(Debug)]
pub struct SlowFunction(pub Duration);

impl SlowFunction {
    pub const NAME: &'static str = "slow_lookup";

    pub fn schema() -> FunctionSchema {
        FunctionSchema::new(Self::NAME, "Answers after a delay")
    }
}

#[async_trait]
impl FunctionHandler for SlowFunction {
    async fn call(&self, _arguments: &Arguments) -> Result<Map<String, Value>, HandlerError> {
        tokio::time::sleep(self.0).await;
        Ok(Map::new())
    }
}

/// Server state holding only [`SlowFunction`] (3 s) behind the given
/// request timeout.
pub fn slow_state(request_timeout_secs: u64) -> AppState {
    let mut registry = FunctionRegistry::new();
    registry
        .register(
            SlowFunction::schema(),
            Arc::new(SlowFunction(Duration::from_secs(3))),
        )
        .expect("slow function registers");
    let mut config = (*test_config()).clone();
    config.server.request_timeout_secs = request_timeout_secs;
    AppState {
        registry: Arc::new(registry),
        config: Arc::new(config),
    }
}

/// An HTTP endpoint that accepts connections and never answers.
pub async fn silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    url
}

pub fn registry(weather: Arc<FakeWeather>) -> Arc<FunctionRegistry> {
    Arc::new(builtin_registry(weather).expect("builtin functions register"))
}

pub fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig::load_from_args(["mcp-weather", "--config", "tests/fixtures/test.yaml"]).expect("test config loads"))
}

pub fn app_state(weather: Arc<FakeWeather>) -> AppState {
    AppState {
        registry: registry(weather),
        config: test_config(),
    }
}
