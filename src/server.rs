use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::mcp::registry::FunctionRegistry;
use crate::mcp::types::{ErrorKind, FunctionCallRequest, FunctionCallResult, FunctionList};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the MCP router.
pub fn router(state: AppState) -> Router {
    // A disabled timeout becomes a very long one so the layer stack keeps one type.
    let timeout_duration = state
        .config
        .server_request_timeout()
        .unwrap_or(Duration::from_secs(365 * 24 * 60 * 60));

    Router::new()
        .route("/v1/mcp", post(mcp_call))
        .route("/v1/mcp/functions", get(list_functions))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(axum::middleware::from_fn(
                    move |req: Request, next: Next| {
                        let duration = timeout_duration;
                        async move {
                            match tokio::time::timeout(duration, next.run(req)).await {
                                Ok(res) => res,
                                Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out")
                                    .into_response(),
                            }
                        }
                    },
                )),
        )
        .with_state(state)
}

/// Bind the listener at the configured address.
pub async fn bind(config: &AppConfig) -> anyhow::Result<TcpListener> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    Ok(listener)
}

/// Like [`bind`], but takes any free port on the configured host when the
/// configured port is already in use.
pub async fn bind_or_any(config: &AppConfig) -> anyhow::Result<TcpListener> {
    match bind(config).await {
        Ok(listener) => Ok(listener),
        Err(e)
            if e.downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::AddrInUse) =>
        {
            let listener = TcpListener::bind(format!("{}:0", config.server.host)).await?;
            tracing::warn!(
                name: "server.port.fallback",
                requested = config.server.port,
                port = listener.local_addr()?.port(),
                "Configured port in use, listening on a free port"
            );
            Ok(listener)
        }
        Err(e) => Err(e),
    }
}

/// Serve on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let address = listener.local_addr()?;
    info!(
        name: "mcp.functions.loaded",
        count = state.registry.len(),
        "Function registry ready"
    );

    let app = router(state);
    info!(
        name: "server.started",
        address = %address,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Bind and serve with the given configuration.
pub async fn start_server(config: Arc<AppConfig>, registry: Arc<FunctionRegistry>) -> anyhow::Result<()> {
    let listener = bind(&config).await?;
    serve(listener, AppState { registry, config }).await
}

/// Decode and dispatch one call body, choosing the HTTP status for the
/// resulting envelope.
pub async fn handle_call(registry: &FunctionRegistry, body: &[u8]) -> (StatusCode, FunctionCallResult) {
    let request = match FunctionCallRequest::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed MCP request");
            return (
                StatusCode::BAD_REQUEST,
                FunctionCallResult::failure(ErrorKind::MalformedRequest, e.to_string()),
            );
        }
    };

    let result = registry.dispatch(&request).await;
    let status = match result.error_kind() {
        None => StatusCode::OK,
        Some(kind) => status_for(kind),
    };
    (status, result)
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedRequest => StatusCode::BAD_REQUEST,
        ErrorKind::UnknownFunction => StatusCode::NOT_FOUND,
        ErrorKind::InvalidArguments => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ProviderError => StatusCode::BAD_GATEWAY,
        ErrorKind::HandlerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /v1/mcp - Execute one function call.
async fn mcp_call(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let (status, result) = handle_call(&state.registry, &body).await;
    (status, Json(result))
}

/// GET /v1/mcp/functions - Advertised function schemas.
async fn list_functions(State(state): State<AppState>) -> Json<FunctionList> {
    Json(FunctionList {
        functions: state.registry.schemas(),
    })
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
