//! HTTP server for the documentation assistant.
//!
//! Exposes retrieval, grounded question answering (buffered and streamed),
//! feedback capture, and a raw doc browser over JSON/SSE.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check |
//! | `POST` | `/retrieve` | Top-k similar chunks (no LLM) |
//! | `POST` | `/query` | Retrieval + grounded LLM answer |
//! | `POST` | `/query/stream` | Same, streamed as Server-Sent Events |
//! | `POST` | `/feedback` | Record an answer rating |
//! | `POST` | `/debug` | Retrieval diagnostics |
//! | `GET`  | `/api/docs` | List doc filenames |
//! | `GET`  | `/api/docs/{filename}` | Raw markdown content |
//!
//! # Error Contract
//!
//! Failures before a response begins are JSON bodies `{"detail": ...}` with
//! a matching status code. `/query/stream` always answers `200` — once SSE
//! headers are committed, failures arrive as in-band `error` events. That
//! asymmetry is deliberate and load-bearing: clients must watch the event
//! stream, not the status line.
//!
//! Every request is tagged with a UUID request ID by middleware; the ID is
//! threaded explicitly into the pipeline so each log record carries it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::answer::{answer, answer_stream, AnswerDeps};
use crate::config::Config;
use crate::error::ServiceError;
use crate::feedback;
use crate::llm::CompletionModel;
use crate::models::{ChunkResult, DebugChunk};
use crate::ratelimit::{RateLimiter, RATE_LIMIT_MESSAGE};
use crate::retrieval::{retrieve, retrieve_debug};
use crate::retry::RetryPolicy;
use crate::store::sqlite::SqliteVectorStore;
use crate::store::VectorStore;

/// Requests per minute for `/retrieve`.
const RETRIEVE_LIMIT: u32 = 30;
/// Requests per minute for `/query`, `/query/stream`, and `/feedback`.
const QUERY_LIMIT: u32 = 10;

/// Shared application state, constructed once at startup and cloned into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    deps: Arc<AnswerDeps>,
    limiter: Arc<RateLimiter>,
    feedback: SqlitePool,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn CompletionModel>,
        feedback: SqlitePool,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            deps: Arc::new(AnswerDeps { store, llm, retry }),
            limiter: Arc::new(RateLimiter::new()),
            feedback,
        }
    }
}

/// Per-request correlation ID, generated by middleware and threaded
/// explicitly through the pipeline.
#[derive(Clone)]
pub struct RequestId(pub String);

/// Start the HTTP server and run until the process terminates.
///
/// Builds the long-lived dependency graph (vector store, providers,
/// feedback pool) from configuration, then serves on `[server].bind`.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let api_key = config.require_api_key()?.to_string();
    let config = Arc::new(config);

    let retry = RetryPolicy::from_config(&config.retry);
    let embedder = Arc::new(crate::embedding::OpenAiEmbeddings::new(
        &config.provider,
        &api_key,
    )?);
    let store: Arc<dyn VectorStore> = Arc::new(
        SqliteVectorStore::open(
            &config.store.path,
            &config.store.collection,
            embedder,
            retry,
        )
        .await?,
    );
    let llm: Arc<dyn CompletionModel> = Arc::new(crate::llm::OpenAiCompletions::new(
        &config.provider,
        &api_key,
    )?);
    let feedback_pool = feedback::connect(&config.feedback.path).await?;

    let bind = config.server.bind.clone();
    let state = AppState::new(config, store, llm, feedback_pool);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, "server_listening");
    println!("docqa server listening on http://{}", bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Assemble the router with CORS and request-ID middleware applied.
pub fn build_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/retrieve", post(handle_retrieve))
        .route("/query", post(handle_query))
        .route("/query/stream", post(handle_query_stream))
        .route("/feedback", post(handle_feedback))
        .route("/debug", post(handle_debug))
        .route("/api/docs", get(handle_list_docs))
        .route("/api/docs/{filename}", get(handle_get_doc))
        .layer(middleware::from_fn(request_context))
        .layer(cors)
        .with_state(state)
}

/// Assign a request ID and log request start/end with total latency.
async fn request_context(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let endpoint = req.uri().path().to_string();
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let started = Instant::now();
    tracing::info!(request_id, method = %method, endpoint, "request_start");

    let response = next.run(req).await;

    tracing::info!(
        request_id,
        endpoint,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request_end"
    );
    response
}

// ============ Error response ============

/// Request-level failure carrying the HTTP status and a `detail` message,
/// serialized as `{"detail": ...}`.
struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    fn rate_limited() -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            detail: RATE_LIMIT_MESSAGE.to_string(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::IndexUnavailable(_) | ServiceError::Provider(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Config(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

fn check_rate(state: &AppState, addr: &SocketAddr, route: &str, limit: u32) -> Result<(), AppError> {
    if state.limiter.check(&addr.ip().to_string(), route, limit) {
        Ok(())
    } else {
        tracing::warn!(client = %addr.ip(), route, "rate_limited");
        Err(AppError::rate_limited())
    }
}

fn validate_top_k(top_k: usize) -> Result<(), AppError> {
    if (1..=20).contains(&top_k) {
        Ok(())
    } else {
        Err(AppError::bad_request("top_k must be between 1 and 20"))
    }
}

// ============ Request/response bodies ============

#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<ChunkResult>,
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    query: String,
    answer: String,
    rating: Rating,
    comment: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Rating {
    Up,
    Down,
}

impl Rating {
    fn as_str(self) -> &'static str {
        match self {
            Rating::Up => "up",
            Rating::Down => "down",
        }
    }
}

#[derive(Serialize)]
struct DebugQueryResponse {
    query: String,
    results: Vec<DebugChunk>,
}

#[derive(Serialize)]
struct DocResponse {
    filename: String,
    content: String,
}

// ============ Handlers ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_retrieve(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    check_rate(&state, &addr, "/retrieve", RETRIEVE_LIMIT)?;
    validate_top_k(req.top_k)?;
    tracing::info!(request_id, query = %req.query, top_k = req.top_k, "retrieve_request");

    let results = retrieve(
        state.deps.store.as_ref(),
        &req.query,
        req.top_k,
        &request_id,
    )
    .await?;
    Ok(Json(RetrieveResponse { results }))
}

async fn handle_query(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<crate::models::QueryResponse>, AppError> {
    check_rate(&state, &addr, "/query", QUERY_LIMIT)?;
    validate_top_k(req.top_k)?;
    tracing::info!(request_id, query = %req.query, top_k = req.top_k, "query_request");

    let response = answer(&state.deps, &req.query, req.top_k, &request_id).await?;
    Ok(Json(response))
}

async fn handle_query_stream(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(req): Json<QueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    check_rate(&state, &addr, "/query/stream", QUERY_LIMIT)?;
    validate_top_k(req.top_k)?;
    tracing::info!(request_id, query = %req.query, top_k = req.top_k, "stream_request");

    let events = answer_stream(state.deps.clone(), req.query, req.top_k, request_id)
        .map(|event| Ok(Event::default().event(event.name()).data(event.data_json())));

    Ok(Sse::new(events))
}

async fn handle_feedback(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_rate(&state, &addr, "/feedback", QUERY_LIMIT)?;

    feedback::insert(
        &state.feedback,
        &req.query,
        &req.answer,
        req.rating.as_str(),
        req.comment.as_deref(),
    )
    .await
    .map_err(|e| AppError::internal(format!("Failed to record feedback: {}", e)))?;

    let preview: String = req.query.chars().take(120).collect();
    tracing::info!(request_id, rating = req.rating.as_str(), query_preview = %preview, "feedback_received");
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn handle_debug(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<DebugQueryResponse>, AppError> {
    validate_top_k(req.top_k)?;
    tracing::info!(request_id, query = %req.query, top_k = req.top_k, "debug_query_request");

    let results = retrieve_debug(
        state.deps.store.as_ref(),
        &req.query,
        req.top_k,
        &request_id,
    )
    .await?;
    Ok(Json(DebugQueryResponse {
        query: req.query,
        results,
    }))
}

async fn handle_list_docs(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let root = &state.config.corpus.root;
    let mut entries = tokio::fs::read_dir(root)
        .await
        .map_err(|e| AppError::internal(format!("Failed to read corpus root: {}", e)))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::internal(format!("Failed to read corpus root: {}", e)))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".md") && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false)
        {
            names.push(name);
        }
    }
    names.sort();
    Ok(Json(names))
}

async fn handle_get_doc(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(filename): Path<String>,
) -> Result<Json<DocResponse>, AppError> {
    // Traversal attempts are indistinguishable from not-found: reject the
    // name before touching the filesystem.
    if !filename.ends_with(".md")
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
    {
        tracing::warn!(request_id, doc_filename = %filename, "doc_not_found");
        return Err(ServiceError::NotFound.into());
    }

    let root = state
        .config
        .corpus
        .root
        .canonicalize()
        .map_err(|_| AppError::from(ServiceError::NotFound))?;
    let path = match root.join(&filename).canonicalize() {
        Ok(path) if path.starts_with(&root) && path.is_file() => path,
        _ => {
            tracing::warn!(request_id, doc_filename = %filename, "doc_not_found");
            return Err(ServiceError::NotFound.into());
        }
    };

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::from(ServiceError::NotFound))?;
    let content = String::from_utf8(bytes).map_err(|_| {
        tracing::error!(request_id, doc_filename = %filename, "doc_encoding_error");
        AppError::internal(format!("File encoding error: {}", filename))
    })?;

    Ok(Json(DocResponse { filename, content }))
}
