//! Weather lookups by city name.
//!
//! [`WeatherProvider`] is the seam between the `get_weather` function and
//! whatever upstream service answers it. [`OpenWeatherMap`] is the production
//! implementation; tests substitute their own.

mod cities;
pub mod openweathermap;

pub use cities::{CityEntry, lookup_city};
pub use openweathermap::OpenWeatherMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Unit system of a reported temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Map an upstream `units` query value (`metric`, `imperial`, `standard`).
    #[must_use]
    pub fn from_units_param(units: &str) -> Self {
        match units {
            "metric" => Self::Celsius,
            "imperial" => Self::Fahrenheit,
            _ => Self::Kelvin,
        }
    }
}

/// Normalized current-weather record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub temperature: f64,
    pub units: TemperatureUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like: Option<f64>,
    pub condition: String,
    /// Relative humidity, percent.
    pub humidity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Upstream weather lookup failed.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("city name must not be empty")]
    EmptyCity,

    #[error("city not found: {0}")]
    CityNotFound(String),

    #[error("weather service rejected credentials: {0}")]
    Unauthorized(String),

    #[error("weather service quota exceeded: {0}")]
    RateLimited(String),

    #[error("weather service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("weather service unreachable: {0}")]
    Network(String),

    #[error("unexpected weather payload: {0}")]
    InvalidPayload(String),
}

/// Source of current weather by city name.
#[async_trait]
pub trait WeatherProvider: Send + Sync + std::fmt::Debug {
    /// Look up the current weather. Performs one outbound call, no retries.
    async fn current(&self, city: &str) -> Result<WeatherReport, ProviderError>;
}
