//! OpenWeatherMap current-weather adapter (`GET {base}/weather`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{ProviderError, TemperatureUnit, WeatherProvider, WeatherReport, lookup_city};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org/data/2.5";

/// Connection and query settings for [`OpenWeatherMap`].
#[derive(Clone)]
pub struct WeatherSettings {
    pub base_url: String,
    pub api_key: String,
    /// `metric`, `imperial` or `standard`.
    pub units: String,
    /// Language for condition descriptions, e.g. `zh_cn`.
    pub lang: String,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for WeatherSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("units", &self.units)
            .field("lang", &self.lang)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherMap {
    http: reqwest::Client,
    settings: WeatherSettings,
}

impl OpenWeatherMap {
    pub fn new(settings: WeatherSettings) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(Self { http, settings })
    }

    fn query_for(&self, city: &str) -> Vec<(&'static str, String)> {
        let target = match lookup_city(city) {
            Some(entry) => ("id", entry.id.to_string()),
            None => ("q", city.trim().to_string()),
        };
        vec![
            target,
            ("appid", self.settings.api_key.clone()),
            ("units", self.settings.units.clone()),
            ("lang", self.settings.lang.clone()),
        ]
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMap {
    async fn current(&self, city: &str) -> Result<WeatherReport, ProviderError> {
        if city.trim().is_empty() {
            return Err(ProviderError::EmptyCity);
        }

        let url = format!("{}/weather", self.settings.base_url.trim_end_matches('/'));
        let query = self.query_for(city);
        tracing::debug!(
            city = %city,
            by_id = query[0].0 == "id",
            "Requesting current weather"
        );

        let resp = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.without_url().to_string()))?;

        if !status.is_success() {
            let message = upstream_message(&body);
            tracing::warn!(
                city = %city,
                status = status.as_u16(),
                message = %message,
                "Weather lookup failed"
            );
            return Err(match status {
                StatusCode::NOT_FOUND => ProviderError::CityNotFound(message),
                StatusCode::UNAUTHORIZED => ProviderError::Unauthorized(message),
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(message),
                other => ProviderError::Upstream {
                    status: other.as_u16(),
                    message,
                },
            });
        }

        let payload: OwmCurrent = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        payload.into_report(TemperatureUnit::from_units_param(&self.settings.units))
    }
}

/// Pull `message` out of an error body, falling back to the raw text.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<OwmError>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct OwmError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    name: String,
    #[serde(default)]
    sys: Option<OwmSys>,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: Option<OwmWind>,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: Option<f64>,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: Option<f64>,
}

impl OwmCurrent {
    #[allow(clippy::cast_sign_loss)]
    fn into_report(self, units: TemperatureUnit) -> Result<WeatherReport, ProviderError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidPayload("no weather conditions".to_string()))?;

        Ok(WeatherReport {
            city: self.name,
            country: self.sys.and_then(|s| s.country),
            temperature: self.main.temp,
            units,
            feels_like: self.main.feels_like,
            condition: condition.description,
            humidity: self.main.humidity.clamp(0.0, 100.0).round() as u8,
            wind_speed: self.wind.and_then(|w| w.speed),
            icon: condition.icon,
        })
    }
}
