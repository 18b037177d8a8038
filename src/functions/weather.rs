use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::mcp::registry::{FunctionHandler, HandlerError};
use crate::mcp::types::{Arguments, FunctionSchema, ParamDescriptor, ParamType};
use crate::weather::WeatherProvider;

/// `get_weather(city: string)`.
#[derive(Debug, Clone)]
pub struct GetWeather {
    provider: Arc<dyn WeatherProvider>,
}

impl GetWeather {
    pub const NAME: &'static str = "get_weather";

    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    pub fn schema() -> FunctionSchema {
        FunctionSchema::new(
            Self::NAME,
            "Get the current weather for a city: temperature, condition and humidity.",
        )
        .param(ParamDescriptor::required(
            "city",
            ParamType::String,
            "City name, e.g. Beijing, Shanghai, 广州",
        ))
    }
}

#[async_trait]
impl FunctionHandler for GetWeather {
    async fn call(&self, arguments: &Arguments) -> Result<Map<String, Value>, HandlerError> {
        let city = arguments
            .get("city")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidArguments("`city` must be a string".to_string()))?;

        let report = self.provider.current(city).await?;
        match serde_json::to_value(report) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(_) => Err(HandlerError::Failed(
                "weather report did not serialize to an object".to_string(),
            )),
            Err(e) => Err(HandlerError::Failed(e.to_string())),
        }
    }
}
