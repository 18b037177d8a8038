use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::mcp::registry::{FunctionHandler, HandlerError};
use crate::mcp::types::{Arguments, FunctionSchema, ParamDescriptor, ParamType};

/// `unit_converter(value: number, from_unit: string, to_unit: string)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitConverter;

impl UnitConverter {
    pub const NAME: &'static str = "unit_converter";

    pub fn schema() -> FunctionSchema {
        FunctionSchema::new(
            Self::NAME,
            "Convert a value between units. Supported: km/m/cm (length), kg/g (mass), C/F (temperature).",
        )
        .param(ParamDescriptor::required(
            "value",
            ParamType::Number,
            "Value to convert",
        ))
        .param(ParamDescriptor::required(
            "from_unit",
            ParamType::String,
            "Source unit, e.g. km, m, cm, kg, g, C, F",
        ))
        .param(ParamDescriptor::required(
            "to_unit",
            ParamType::String,
            "Target unit, e.g. km, m, cm, kg, g, C, F",
        ))
    }
}

/// Convert `value` between two supported units, or `None` if the pair is
/// not supported.
pub fn convert(value: f64, from_unit: &str, to_unit: &str) -> Option<f64> {
    let converted = match (from_unit, to_unit) {
        ("km", "m") | ("kg", "g") => value * 1000.0,
        ("m", "km") | ("g", "kg") => value / 1000.0,
        ("m", "cm") => value * 100.0,
        ("cm", "m") => value / 100.0,
        ("C", "F") => value * 9.0 / 5.0 + 32.0,
        ("F", "C") => (value - 32.0) * 5.0 / 9.0,
        _ => return None,
    };
    Some(converted)
}

#[async_trait]
impl FunctionHandler for UnitConverter {
    async fn call(&self, arguments: &Arguments) -> Result<Map<String, Value>, HandlerError> {
        let value = arguments
            .get("value")
            .and_then(Value::as_f64)
            .ok_or_else(|| HandlerError::InvalidArguments("`value` must be a number".to_string()))?;
        let from_unit = arguments
            .get("from_unit")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let to_unit = arguments
            .get("to_unit")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let converted = convert(value, from_unit, to_unit).ok_or_else(|| {
            HandlerError::Failed(format!(
                "conversion from {from_unit} to {to_unit} is not supported"
            ))
        })?;
        if !converted.is_finite() {
            return Err(HandlerError::Failed(format!(
                "{value} {from_unit} is out of range when converted to {to_unit}"
            )));
        }

        let mut fields = Map::new();
        fields.insert("value".to_string(), json!(value));
        fields.insert("from_unit".to_string(), json!(from_unit));
        fields.insert("converted".to_string(), json!(converted));
        fields.insert("to_unit".to_string(), json!(to_unit));
        fields.insert(
            "display".to_string(),
            json!(format!("{value} {from_unit} = {converted:.2} {to_unit}")),
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(convert(2.5, "km", "m"), Some(2500.0));
        assert_eq!(convert(150.0, "cm", "m"), Some(1.5));
        assert_eq!(convert(100.0, "C", "F"), Some(212.0));
        assert_eq!(convert(212.0, "F", "C"), Some(100.0));
        assert_eq!(convert(1.0, "km", "kg"), None);
    }

    #[tokio::test]
    async fn test_handler_formats_display() {
        let args = json!({"value": 10, "from_unit": "km", "to_unit": "m"});
        let fields = UnitConverter
            .call(args.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(fields["display"], "10 km = 10000.00 m");
    }

    #[tokio::test]
    async fn test_unsupported_pair_is_handler_error() {
        let args = json!({"value": 1, "from_unit": "kg", "to_unit": "F"});
        let err = UnitConverter
            .call(args.as_object().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
    }

    #[tokio::test]
    async fn test_overflowing_conversion_is_handler_error() {
        let args = json!({"value": 1e308, "from_unit": "km", "to_unit": "m"});
        let err = UnitConverter
            .call(args.as_object().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed(m) if m.contains("out of range")));
    }
}
