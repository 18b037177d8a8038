//! Built-in functions exposed by the MCP server.
//!
//! - `get_weather(city)`: current weather through a [`WeatherProvider`]
//! - `unit_converter(value, from_unit, to_unit)`: length, mass and
//!   temperature conversions

mod units;
mod weather;

pub use units::{UnitConverter, convert};
pub use weather::GetWeather;

use std::sync::Arc;

use crate::mcp::registry::{FunctionRegistry, RegistrationError};
use crate::weather::WeatherProvider;

/// Build the registry with every built-in function.
pub fn builtin_registry(
    weather: Arc<dyn WeatherProvider>,
) -> Result<FunctionRegistry, RegistrationError> {
    let mut registry = FunctionRegistry::new();
    registry.register(GetWeather::schema(), Arc::new(GetWeather::new(weather)))?;
    registry.register(UnitConverter::schema(), Arc::new(UnitConverter))?;
    Ok(registry)
}
