//! Chat relay HTTP server.
//!
//! Accepts a chat query from an authenticated browser session, forwards it
//! to the AI backend, and streams the answer back as Server-Sent Events.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Body `{"query": "..."}`; responds with an SSE stream |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Success response
//!
//! `200 OK` with `Content-Type: text/event-stream`, `Cache-Control: no-cache`
//! and `Connection: keep-alive`. Each event is one delta:
//!
//! ```text
//! data: {"content":"Hello"}
//!
//! data: {"content":" world"}
//!
//! ```
//!
//! # Error Contract
//!
//! Errors raised before streaming starts are flat JSON objects:
//!
//! ```json
//! { "error": "Unauthorized" }
//! ```
//!
//! | Status | When |
//! |--------|------|
//! | 400 | Malformed body or empty query |
//! | 401 | No valid session; the backend is never called |
//! | 4xx/5xx | Backend answered with that status (`Backend error: <reason>`) |
//! | 502 | Backend unreachable |
//! | 500 | Backend answered with no body |
//!
//! Once the event stream has started, failures can only abort it.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::auth::{SessionVerifier, StaticTokenVerifier};
use crate::config::Config;
use crate::context::RequestContext;
use crate::relay::relay;
use crate::upstream::{BackendClient, UpstreamError};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    verifier: Arc<dyn SessionVerifier>,
    backend: BackendClient,
}

impl AppState {
    /// Builds state with the token verifier from `[auth]`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let verifier = StaticTokenVerifier::from_config(&config.auth);
        if verifier.is_empty() {
            tracing::warn!("no auth tokens configured; every chat request will be rejected");
        } else {
            tracing::info!(tokens = verifier.len(), "session tokens loaded");
        }
        Self::with_verifier(config, Arc::new(verifier))
    }

    /// Builds state with a custom session verifier.
    pub fn with_verifier(
        config: &Config,
        verifier: Arc<dyn SessionVerifier>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config: Arc::new(config.clone()),
            verifier,
            backend: BackendClient::new(&config.backend)?,
        })
    }
}

/// Builds the router. Exposed so tests can serve it on an ephemeral port.
pub fn build_router(state: AppState) -> Router {
    let cors_enabled = state.config.server.cors;

    let router = Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

/// Starts the chat relay server.
///
/// Binds to `[server].bind` and serves until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        backend = %config.backend.url,
        boundary = ?config.transcoder.boundary,
        "chat relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

/// JSON error response body: `{"error": "<message>"}`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        AppError {
            status: err.client_status(),
            message: err.client_message(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        message: "Unauthorized".to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat ============

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

/// Handler for `POST /api/chat`.
///
/// Authentication is checked before the body so an unauthenticated caller
/// always gets 401, and the backend is only contacted for valid sessions.
async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let session = state.verifier.verify(&headers).await.ok_or_else(|| {
        tracing::debug!("chat request rejected: no valid session");
        unauthorized()
    })?;

    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let ctx = RequestContext::new(&state.config, session);
    let span = ctx.span.clone();
    span.in_scope(|| tracing::info!(query_len = request.query.len(), "chat request"));

    let upstream = state
        .backend
        .open_stream(&ctx, &request.query)
        .instrument(span.clone())
        .await
        .map_err(|e| {
            span.in_scope(|| tracing::warn!(error = %e, "backend call failed"));
            AppError::from(e)
        })?;

    let body = Body::from_stream(relay(ctx, upstream.bytes_stream()));
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}
