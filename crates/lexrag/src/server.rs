//! JSON HTTP API over document sessions.
//!
//! Each uploaded document becomes a session with its own index. Clients
//! upload once, then search that session any number of times.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (version and embedding model) |
//! | `GET`    | `/documents` | List loaded documents |
//! | `POST`   | `/documents?name=` | Upload a PDF or plain-text document (raw body) |
//! | `POST`   | `/documents/{id}/search` | Rank the document's chunks against a query |
//! | `GET`    | `/documents/{id}/chunks` | List the document's chunks |
//! | `DELETE` | `/documents/{id}` | Drop a document |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "index_not_built", "message": "index not built: load a document before searching" } }
//! ```
//!
//! Error codes: `bad_request` (400), `invalid_top_k` (400), `not_found` (404),
//! `index_not_built` (409), `payload_too_large` (413), `unsupported_content_type` (415),
//! `empty_document` (422), `extraction_failed` (422),
//! `embedding_unavailable` (503), `internal` (500).

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use lexrag_core::{Chunk, SearchHit};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::extract::{extract_text, ExtractError};
use crate::session::{SessionInfo, SessionRegistry};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    sessions: Arc<SessionRegistry>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let provider = create_provider(&config.embedding)?;
    let sessions = Arc::new(SessionRegistry::new(
        provider,
        config.segmentation.segmenter(),
    ));
    let app = router(Arc::new(config.clone()), sessions);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    println!("lexrag server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router. Exposed so callers can serve it on their own listener.
pub fn router(config: Arc<Config>, sessions: Arc<SessionRegistry>) -> Router {
    let cors = cors_layer(&config.server.cors_origins);
    let body_limit = DefaultBodyLimit::max(config.server.max_upload_bytes);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", get(handle_list).post(handle_upload))
        .route("/documents/{id}", delete(handle_delete))
        .route("/documents/{id}/search", post(handle_search))
        .route("/documents/{id}/chunks", get(handle_chunks))
        .layer(body_limit)
        .layer(cors)
        .with_state(AppState { config, sessions })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
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

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    fn not_found(id: &Uuid) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no document with id {}", id),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(code = self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<lexrag_core::Error> for AppError {
    fn from(err: lexrag_core::Error) -> Self {
        use lexrag_core::Error;
        let (status, code) = match &err {
            Error::InvalidTopK(_) => (StatusCode::BAD_REQUEST, "invalid_top_k"),
            Error::SegmentationYieldsEmpty => (StatusCode::UNPROCESSABLE_ENTITY, "empty_document"),
            Error::IndexNotBuilt => (StatusCode::CONFLICT, "index_not_built"),
            Error::EmbeddingUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable")
            }
            Error::EmbeddingShape { .. }
            | Error::DimensionMismatch { .. }
            | Error::NonFiniteEmbedding { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        Self::new(status, code, err.to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        let status = rejection.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(status, "payload_too_large", rejection.body_text())
        } else {
            Self::bad_request(rejection.body_text())
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        let (status, code) = match &err {
            ExtractError::UnsupportedContentType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_content_type",
            ),
            ExtractError::Pdf(_) => (StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed"),
            ExtractError::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        Self::new(status, code, err.to_string())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model: state.sessions.provider().model_name().to_string(),
    })
}

// ============ /documents ============

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<SessionInfo>,
}

async fn handle_list(State(state): State<AppState>) -> Json<DocumentListResponse> {
    Json(DocumentListResponse {
        documents: state.sessions.list().await,
    })
}

#[derive(Deserialize)]
struct UploadParams {
    name: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    id: Uuid,
    name: String,
    chunks: usize,
}

async fn handle_upload(
    State(state): State<AppState>,
    params: Result<Query<UploadParams>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let Query(params) = params?;
    let body = body?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if content_type.is_empty() {
        return Err(ExtractError::UnsupportedContentType("(none)".to_string()).into());
    }

    // PDF parsing is CPU-bound.
    let text = tokio::task::spawn_blocking(move || extract_text(&body, &content_type))
        .await
        .map_err(|e| AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()))??;

    let name = params
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "document".to_string());
    let session = state.sessions.create(name, &text).await?;
    let info = session.info().await;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: info.id,
            name: info.name,
            chunks: info.chunks,
        }),
    ))
}

async fn handle_delete(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(&id))
    }
}

#[derive(Serialize)]
struct ChunkListResponse {
    chunks: Vec<Chunk>,
}

async fn handle_chunks(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ChunkListResponse>, AppError> {
    let Path(id) = id?;
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::not_found(&id))?;
    Ok(Json(ChunkListResponse {
        chunks: session.chunks().await,
    }))
}

// ============ POST /documents/{id}/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResultItem {
    rank: usize,
    label: String,
    chapter: Option<String>,
    article: Option<String>,
    text: String,
    score: f32,
    similarity: f32,
}

impl From<SearchHit> for SearchResultItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            rank: hit.rank,
            label: hit.chunk.label,
            chapter: hit.chunk.chapter,
            article: hit.chunk.article,
            text: hit.chunk.text,
            score: hit.score,
            similarity: hit.similarity,
        }
    }
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResultItem>,
}

async fn handle_search(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    req: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Path(id) = id?;
    let Json(req) = req?;
    if req.query.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "query must not be empty",
        ));
    }
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::not_found(&id))?;

    let top_k = state.config.retrieval.resolve_top_k(req.top_k);
    let hits = session.search(&req.query, top_k).await?;

    Ok(Json(SearchResponse {
        results: hits.into_iter().map(SearchResultItem::from).collect(),
    }))
}
