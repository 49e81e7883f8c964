//! HTTP API for the assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Ask a question; starts a session when `session_id` is omitted |
//! | `GET`  | `/sessions/{id}` | Message log of a session |
//! | `GET`  | `/health` | Version, session count and embedding cache stats |
//!
//! ```json
//! POST /ask
//! { "session_id": "7c1e…", "question": "How do I add a widget?" }
//!
//! 200 OK
//! { "session_id": "7c1e…", "kind": "answer", "text": "…", "sources": ["https://docs.apostrophecms.org/widgets"] }
//! ```
//!
//! Advisory outcomes (`duplicate_question`, `empty_knowledge_base`,
//! `low_confidence`) are successful responses with a fixed `text`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `timeout` (504), `upstream` (502),
//! `internal` (500).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use docent_core::Message;

use crate::assistant::{build_assistant, Assistant};
use crate::config::Config;

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    request_timeout: Duration,
}

/// Connect the backends named in `config` and serve on `[server].bind`
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let assistant = Arc::new(build_assistant(config).await?);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("docent listening on http://{}", listener.local_addr()?);

    serve(
        listener,
        assistant,
        Duration::from_secs(config.server.request_timeout_secs),
    )
    .await
}

/// Serve an already-built assistant on `listener`.
pub async fn serve(
    listener: tokio::net::TcpListener,
    assistant: Arc<Assistant>,
    request_timeout: Duration,
) -> anyhow::Result<()> {
    axum::serve(listener, router(assistant, request_timeout)).await?;
    Ok(())
}

pub fn router(assistant: Arc<Assistant>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/sessions/{id}", get(handle_session))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState {
            assistant,
            request_timeout,
        })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::GATEWAY_TIMEOUT,
        code: "timeout",
        message: message.into(),
    }
}

impl From<docent_core::Error> for AppError {
    fn from(err: docent_core::Error) -> Self {
        if err.is_upstream() {
            AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream",
                message: err.to_string(),
            }
        } else {
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: err.to_string(),
            }
        }
    }
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    session_id: Option<String>,
    question: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AskResponse {
    pub session_id: String,
    pub kind: String,
    pub text: String,
    pub sources: Vec<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;

    let question = request.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let session_id = match request.session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => uuid::Uuid::new_v4().to_string(),
    };

    let outcome = tokio::time::timeout(
        state.request_timeout,
        state.assistant.ask(&session_id, question),
    )
    .await
    .map_err(|_| {
        timeout_error(format!(
            "question not answered within {}s",
            state.request_timeout.as_secs()
        ))
    })??;

    info!(session = %session_id, kind = outcome.kind(), "handled /ask");

    Ok(Json(AskResponse {
        kind: outcome.kind().to_string(),
        text: outcome.text().to_string(),
        sources: outcome.sources().to_vec(),
        session_id,
    }))
}

// ============ GET /sessions/{id} ============

#[derive(Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}

async fn handle_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let messages = state.assistant.history(&id).await?;
    Ok(Json(SessionResponse {
        session_id: id,
        messages,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding_cache: Option<CacheReport>,
}

#[derive(Serialize)]
struct CacheReport {
    entries: usize,
    hits: u64,
    misses: u64,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let sessions = state.assistant.session_count().await?;
    let embedding_cache = state.assistant.cache_stats().map(|stats| CacheReport {
        entries: stats.entries,
        hits: stats.hits,
        misses: stats.misses,
    });

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions,
        embedding_cache,
    }))
}
