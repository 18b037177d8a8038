use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::mcp::types::{
    Arguments, ErrorKind, FunctionCallRequest, FunctionCallResult, FunctionSchema, ParamType,
};
use crate::weather::ProviderError;

/// Server-side implementation of one registered function.
///
/// Handlers receive arguments that already passed schema validation.
#[async_trait]
pub trait FunctionHandler: Send + Sync + std::fmt::Debug {
    async fn call(&self, arguments: &Arguments) -> Result<Map<String, Value>, HandlerError>;
}

/// Failure raised inside a handler. Never leaves [`FunctionRegistry::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Provider(_) => ErrorKind::ProviderError,
            Self::InvalidArguments(_) => ErrorKind::InvalidArguments,
            Self::Failed(_) => ErrorKind::HandlerError,
        }
    }
}

/// Startup-time registration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("function already registered: {0}")]
    Duplicate(String),

    #[error("invalid schema for `{function}`: {reason}")]
    InvalidSchema { function: String, reason: String },
}

/// Request rejected before any handler ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid arguments for `{function}`: {reason}")]
    InvalidArguments { function: String, reason: String },
}

impl From<DispatchError> for FunctionCallResult {
    fn from(err: DispatchError) -> Self {
        let kind = match &err {
            DispatchError::UnknownFunction(_) => ErrorKind::UnknownFunction,
            DispatchError::InvalidArguments { .. } => ErrorKind::InvalidArguments,
        };
        Self::failure(kind, err.to_string())
    }
}

struct Entry {
    schema: FunctionSchema,
    handler: Arc<dyn FunctionHandler>,
}

/// Table of callable functions, keyed by name.
///
/// Populated once at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field(
                "functions",
                &self.entries.iter().map(|e| &e.schema.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl FunctionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function. Names must be unique.
    pub fn register(
        &mut self,
        schema: FunctionSchema,
        handler: Arc<dyn FunctionHandler>,
    ) -> Result<(), RegistrationError> {
        if schema.name.trim().is_empty() {
            return Err(RegistrationError::InvalidSchema {
                function: schema.name,
                reason: "name must not be empty".to_string(),
            });
        }
        if self.index.contains_key(&schema.name) {
            return Err(RegistrationError::Duplicate(schema.name));
        }
        for (i, p) in schema.parameters.iter().enumerate() {
            if schema.parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(RegistrationError::InvalidSchema {
                    function: schema.name.clone(),
                    reason: format!("parameter `{}` declared twice", p.name),
                });
            }
        }

        tracing::info!(
            name: "mcp.function.registered",
            function = %schema.name,
            parameter_count = schema.parameters.len(),
            "Function registered"
        );

        self.index.insert(schema.name.clone(), self.entries.len());
        self.entries.push(Entry { schema, handler });
        Ok(())
    }

    /// Schemas in registration order.
    pub fn schemas(&self) -> Vec<FunctionSchema> {
        self.entries.iter().map(|e| e.schema.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, request: &FunctionCallRequest) -> Result<&Entry, DispatchError> {
        let entry = self
            .index
            .get(&request.function)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| DispatchError::UnknownFunction(request.function.clone()))?;

        let invalid = |reason: String| DispatchError::InvalidArguments {
            function: request.function.clone(),
            reason,
        };

        for param in &entry.schema.parameters {
            match request.arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(invalid(format!(
                        "missing required parameter `{}`",
                        param.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(invalid(format!(
                        "parameter `{}` must be a {}",
                        param.name,
                        param.param_type.as_str()
                    )));
                }
                Some(Value::String(s))
                    if param.required
                        && param.param_type == ParamType::String
                        && s.trim().is_empty() =>
                {
                    return Err(invalid(format!(
                        "parameter `{}` must not be blank",
                        param.name
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(entry)
    }

    /// Validate and run a call. Every failure comes back as a
    /// [`FunctionCallResult::Failure`]; this never returns an error.
    pub async fn dispatch(&self, request: &FunctionCallRequest) -> FunctionCallResult {
        let entry = match self.lookup(request) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    function = %request.function,
                    error = %e,
                    "Rejected function call"
                );
                return e.into();
            }
        };

        match entry.handler.call(&request.arguments).await {
            Ok(fields) => {
                tracing::info!(
                    function = %request.function,
                    field_count = fields.len(),
                    "Function call succeeded"
                );
                FunctionCallResult::Success(fields)
            }
            Err(e) => {
                let kind = e.kind();
                tracing::warn!(
                    function = %request.function,
                    kind = %kind,
                    error = %e,
                    "Function call failed"
                );
                FunctionCallResult::failure(kind, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::types::ParamDescriptor;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FunctionHandler for Counting {
        async fn call(&self, arguments: &Arguments) -> Result<Map<String, Value>, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(arguments.clone())
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl FunctionHandler for Failing {
        async fn call(&self, _arguments: &Arguments) -> Result<Map<String, Value>, HandlerError> {
            Err(ProviderError::CityNotFound("city not found".to_string()).into())
        }
    }

    fn echo_schema() -> FunctionSchema {
        FunctionSchema::new("echo", "Echo arguments back")
            .param(ParamDescriptor::required("city", ParamType::String, "City"))
            .param(ParamDescriptor::optional("days", ParamType::Integer, "Days"))
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(echo_schema(), Arc::new(Counting::default()))
            .unwrap();
        let err = registry
            .register(echo_schema(), Arc::new(Counting::default()))
            .unwrap_err();
        assert_eq!(err, RegistrationError::Duplicate("echo".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        let schema = FunctionSchema::new("bad", "")
            .param(ParamDescriptor::required("x", ParamType::String, ""))
            .param(ParamDescriptor::optional("x", ParamType::Number, ""));
        let err = FunctionRegistry::new()
            .register(schema, Arc::new(Failing))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidSchema { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(echo_schema(), Arc::new(Counting::default()))
            .unwrap();

        let req = FunctionCallRequest::new("echo", args(json!({"city": "Shanghai"})));
        let result = registry.dispatch(&req).await;
        assert_eq!(
            result,
            FunctionCallResult::Success(args(json!({"city": "Shanghai"})))
        );
    }

    #[tokio::test]
    async fn test_unknown_function_runs_no_handler() {
        let handler = Arc::new(Counting::default());
        let mut registry = FunctionRegistry::new();
        registry.register(echo_schema(), handler.clone()).unwrap();

        let req = FunctionCallRequest::new("nope", Arguments::new());
        let result = registry.dispatch(&req).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::UnknownFunction));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_required_argument_runs_no_handler() {
        let handler = Arc::new(Counting::default());
        let mut registry = FunctionRegistry::new();
        registry.register(echo_schema(), handler.clone()).unwrap();

        for bad in [json!({}), json!({"city": null}), json!({"days": 3})] {
            let req = FunctionCallRequest::new("echo", args(bad));
            let result = registry.dispatch(&req).await;
            assert_eq!(result.error_kind(), Some(ErrorKind::InvalidArguments));
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_is_invalid_arguments() {
        let handler = Arc::new(Counting::default());
        let mut registry = FunctionRegistry::new();
        registry.register(echo_schema(), handler.clone()).unwrap();

        let req = FunctionCallRequest::new("echo", args(json!({"city": 42})));
        assert_eq!(
            registry.dispatch(&req).await.error_kind(),
            Some(ErrorKind::InvalidArguments)
        );

        let req = FunctionCallRequest::new("echo", args(json!({"city": "Rome", "days": "3"})));
        assert_eq!(
            registry.dispatch(&req).await.error_kind(),
            Some(ErrorKind::InvalidArguments)
        );

        let req = FunctionCallRequest::new("echo", args(json!({"city": "  "})));
        assert_eq!(
            registry.dispatch(&req).await.error_kind(),
            Some(ErrorKind::InvalidArguments)
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure_result() {
        let mut registry = FunctionRegistry::new();
        registry.register(echo_schema(), Arc::new(Failing)).unwrap();

        let req = FunctionCallRequest::new("echo", args(json!({"city": "Atlantis"})));
        match registry.dispatch(&req).await {
            FunctionCallResult::Failure(f) => {
                assert_eq!(f.kind, ErrorKind::ProviderError);
                assert!(f.message.contains("city not found"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_schemas_keep_registration_order() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(FunctionSchema::new("b", ""), Arc::new(Failing))
            .unwrap();
        registry
            .register(FunctionSchema::new("a", ""), Arc::new(Failing))
            .unwrap();
        let names: Vec<_> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["b", "a"]);
    }
}
