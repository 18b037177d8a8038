//! Wire types shared by the MCP server and client.
//!
//! The request and result envelopes are the whole protocol:
//!
//! ```json
//! { "function": "get_weather", "arguments": { "city": "Shanghai" } }
//! { "result": { "city": "Shanghai", "temperature": 21.0 } }
//! { "error": { "kind": "unknown_function", "message": "..." } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Arguments supplied with a function call, keyed by parameter name.
pub type Arguments = Map<String, Value>;

/// Semantic type of a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamType {
    /// Check whether a JSON value has this type. No coercion is attempted.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }

    /// JSON Schema type keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// One parameter of a [`FunctionSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl ParamDescriptor {
    /// A required parameter.
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }

    /// An optional parameter.
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Declaration of a callable function: its name, purpose and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParamDescriptor>,
}

impl FunctionSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter, keeping declaration order.
    #[must_use]
    pub fn param(mut self, descriptor: ParamDescriptor) -> Self {
        self.parameters.push(descriptor);
        self
    }

    /// JSON Schema object describing the parameters.
    pub fn parameters_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.param_type.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Render as an `OpenAI` `tools` entry.
    pub fn to_openai_tool(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_json_schema(),
            }
        })
    }
}

/// Body of `GET /v1/mcp/functions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionList {
    pub functions: Vec<FunctionSchema>,
}

/// Request body was not a well-formed function call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed request: {0}")]
pub struct MalformedRequestError(pub String);

/// A request to invoke one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRequest {
    pub function: String,
    pub arguments: Arguments,
}

impl FunctionCallRequest {
    pub fn new(function: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            function: function.into(),
            arguments,
        }
    }

    /// Parse a serialized request.
    ///
    /// Rejects anything that is not a JSON object with a non-empty string
    /// `function` and an object `arguments`.
    pub fn from_slice(body: &[u8]) -> Result<Self, MalformedRequestError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| MalformedRequestError(format!("body is not valid JSON: {e}")))?;

        let Value::Object(mut obj) = value else {
            return Err(MalformedRequestError(
                "body must be a JSON object".to_string(),
            ));
        };

        let function = match obj.remove("function") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            Some(Value::String(_)) => {
                return Err(MalformedRequestError(
                    "`function` must not be empty".to_string(),
                ));
            }
            Some(_) => {
                return Err(MalformedRequestError(
                    "`function` must be a string".to_string(),
                ));
            }
            None => {
                return Err(MalformedRequestError(
                    "missing `function` field".to_string(),
                ));
            }
        };

        let arguments = match obj.remove("arguments") {
            Some(Value::Object(args)) => args,
            Some(other) => {
                return Err(MalformedRequestError(format!(
                    "`arguments` must be an object, got {}",
                    json_type_name(&other)
                )));
            }
            None => {
                return Err(MalformedRequestError(
                    "missing `arguments` field".to_string(),
                ));
            }
        };

        Ok(Self {
            function,
            arguments,
        })
    }
}

/// Kind of a failed call, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownFunction,
    InvalidArguments,
    MalformedRequest,
    ProviderError,
    HandlerError,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownFunction => "unknown_function",
            Self::InvalidArguments => "invalid_arguments",
            Self::MalformedRequest => "malformed_request",
            Self::ProviderError => "provider_error",
            Self::HandlerError => "handler_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure half of a [`FunctionCallResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of a function call.
///
/// Serializes as `{"result": {...}}` or `{"error": {"kind", "message"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FunctionCallResult {
    #[serde(rename = "result")]
    Success(Map<String, Value>),
    #[serde(rename = "error")]
    Failure(CallFailure),
}

impl FunctionCallResult {
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure(CallFailure {
            kind,
            message: message.into(),
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Error kind, if this is a failure.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f.kind),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
