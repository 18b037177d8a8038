//! How the client reaches the MCP server.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::mcp::registry::FunctionRegistry;
use crate::mcp::types::{
    ErrorKind, FunctionCallRequest, FunctionCallResult, FunctionList, FunctionSchema,
};

/// Path of the call endpoint, relative to the server root.
pub const CALL_PATH: &str = "v1/mcp";
/// Path of the schema listing endpoint.
pub const FUNCTIONS_PATH: &str = "v1/mcp/functions";

/// The server could not be reached or did not answer with the protocol.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("MCP server unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("MCP server rejected the request as malformed: {0}")]
    Malformed(String),

    #[error("MCP server returned {status} without a protocol body: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("could not decode MCP server response: {0}")]
    Decode(String),
}

/// Channel from the client to an MCP server.
#[async_trait]
pub trait McpTransport: Send + Sync + std::fmt::Debug {
    /// Send one call. Structured failures come back as `Ok(Failure)`;
    /// only transport faults and `malformed_request` are errors.
    async fn call(&self, request: &FunctionCallRequest)
    -> Result<FunctionCallResult, TransportError>;

    /// Fetch the server's function schemas.
    async fn list_functions(&self) -> Result<Vec<FunctionSchema>, TransportError>;
}

/// HTTP transport to a remote server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    call_url: Url,
    functions_url: Url,
}

impl HttpTransport {
    /// `server_url` is the server root, e.g. `http://localhost:8765`.
    pub fn new(server_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut base =
            Url::parse(server_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let call_url = base
            .join(CALL_PATH)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let functions_url = base
            .join(FUNCTIONS_PATH)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            call_url,
            functions_url,
        })
    }

    pub fn call_url(&self) -> &Url {
        &self.call_url
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn call(
        &self,
        request: &FunctionCallRequest,
    ) -> Result<FunctionCallResult, TransportError> {
        tracing::info!(
            function = %request.function,
            url = %self.call_url,
            "Sending MCP call"
        );

        let resp = self
            .http
            .post(self.call_url.clone())
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        // Every protocol response, success or not, carries the envelope.
        match serde_json::from_slice::<FunctionCallResult>(&body) {
            Ok(FunctionCallResult::Failure(f)) if f.kind == ErrorKind::MalformedRequest => {
                Err(TransportError::Malformed(f.message))
            }
            Ok(result) => {
                tracing::info!(
                    function = %request.function,
                    status = status.as_u16(),
                    success = result.is_success(),
                    "MCP call answered"
                );
                Ok(result)
            }
            Err(_) if status != StatusCode::OK => Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            }),
            Err(e) => Err(TransportError::Decode(e.to_string())),
        }
    }

    async fn list_functions(&self) -> Result<Vec<FunctionSchema>, TransportError> {
        let resp = self
            .http
            .get(self.functions_url.clone())
            .send()
            .await?
            .error_for_status()?;
        let list: FunctionList = resp
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(list.functions)
    }
}

/// In-process transport that dispatches straight into a registry.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    registry: Arc<FunctionRegistry>,
}

impl LocalTransport {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl McpTransport for LocalTransport {
    async fn call(
        &self,
        request: &FunctionCallRequest,
    ) -> Result<FunctionCallResult, TransportError> {
        Ok(self.registry.dispatch(request).await)
    }

    async fn list_functions(&self) -> Result<Vec<FunctionSchema>, TransportError> {
        Ok(self.registry.schemas())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_joined_under_server_root() {
        let t = HttpTransport::new("http://localhost:8765", None).unwrap();
        assert_eq!(t.call_url().as_str(), "http://localhost:8765/v1/mcp");

        let t = HttpTransport::new("http://example.com/weather", None).unwrap();
        assert_eq!(t.call_url().as_str(), "http://example.com/weather/v1/mcp");
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            HttpTransport::new("not a url", None),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    fn weather_request() -> FunctionCallRequest {
        let mut args = crate::mcp::types::Arguments::new();
        args.insert("city".to_string(), serde_json::json!("Atlantis"));
        FunctionCallRequest::new("get_weather", args)
    }

    #[tokio::test]
    async fn test_failure_envelope_is_returned_for_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/mcp")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({"function": "get_weather"}),
            ))
            .with_status(502)
            .with_body(r#"{"error":{"kind":"provider_error","message":"city not found: Atlantis"}}"#)
            .create_async()
            .await;

        let t = HttpTransport::new(&server.url(), None).unwrap();
        let result = t.call(&weather_request()).await.unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::ProviderError));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_request_response_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/mcp")
            .with_status(400)
            .with_body(r#"{"error":{"kind":"malformed_request","message":"missing `arguments`"}}"#)
            .create_async()
            .await;

        let t = HttpTransport::new(&server.url(), None).unwrap();
        let err = t.call(&weather_request()).await.unwrap_err();
        assert!(matches!(err, TransportError::Malformed(m) if m.contains("arguments")));
    }

    #[tokio::test]
    async fn test_non_protocol_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/mcp")
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let t = HttpTransport::new(&server.url(), None).unwrap();
        let err = t.call(&weather_request()).await.unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_list_functions() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/mcp/functions")
            .with_status(200)
            .with_body(
                r#"{"functions":[{"name":"get_weather","description":"Current weather","parameters":[{"name":"city","type":"string","required":true,"description":"City"}]}]}"#,
            )
            .create_async()
            .await;

        let t = HttpTransport::new(&server.url(), None).unwrap();
        let schemas = t.list_functions().await.unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "get_weather");
        assert!(schemas[0].parameters[0].required);
    }
}
