//! HTTP API.
//!
//! Exposes the question-answering pipeline, the fire-and-forget indexing
//! trigger, the editor save-notification receiver, and document management.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ai/{id}/ask` | Answer a question about a document |
//! | `POST` | `/ai/{id}/index` | Enqueue a background indexing pass |
//! | `POST` | `/documents/{id}/track` | Editor save-notification callback |
//! | `GET`  | `/documents` | List documents |
//! | `GET`  | `/documents/{id}` | Document metadata |
//! | `GET`  | `/documents/{id}/download` | Stored binary with its declared content type |
//! | `DELETE` | `/documents/{id}` | Delete document, chunks, and stored file |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no document with id ..." } }
//! ```
//!
//! `/documents/{id}/track` is the exception: it always answers HTTP 200
//! with `{"error": 0|1}` because the editor reads the payload, not the
//! transport status.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::answer;
use crate::config::Config;
use crate::db;
use crate::index::{IndexJob, IndexQueue};
use crate::locks::FileLocks;
use crate::models::Document;
use crate::provider::Provider;
use crate::store;
use crate::sync;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    queue: IndexQueue,
    locks: FileLocks,
}

/// Starts the HTTP server. Binds to `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());
    let pool = db::connect(&config).await?;
    let locks = FileLocks::new();
    let queue = IndexQueue::start(config.clone(), pool.clone(), locks.clone());

    let state = AppState {
        config,
        pool,
        queue,
        locks,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ai/{id}/ask", post(handle_ask))
        .route("/ai/{id}/index", post(handle_index))
        .route("/documents/{id}/track", post(handle_track))
        .route("/documents", get(handle_list_documents))
        .route(
            "/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/documents/{id}/download", get(handle_download))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("docshelf server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: code.to_string(),
        message: message.into(),
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

// ============ POST /ai/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    provider: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<crate::models::Answer>, AppError> {
    // An unknown provider name resolves to the default chat backend.
    let requested = req.provider.as_deref().and_then(Provider::from_name);

    let answer = answer::answer(
        &state.config,
        &state.pool,
        &state.locks,
        &id,
        &req.question,
        requested,
    )
    .await
    .map_err(|e| internal("generation_failed", e.to_string()))?;

    Ok(Json(answer))
}

// ============ POST /ai/{id}/index ============

#[derive(Deserialize, Default)]
struct IndexRequest {
    provider: Option<String>,
}

#[derive(Serialize)]
struct IndexResponse {
    queued: bool,
}

/// Fire-and-forget: all job outcomes are logged and published as index
/// events, never propagated back to the caller.
async fn handle_index(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<IndexRequest>>,
) -> Json<IndexResponse> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let requested = req.provider.as_deref().and_then(Provider::from_name);

    let queued = state.queue.submit(IndexJob {
        document_id: id,
        provider: requested,
    });
    Json(IndexResponse { queued })
}

// ============ POST /documents/{id}/track ============

#[derive(Deserialize)]
struct TrackRequest {
    status: i64,
    #[serde(default)]
    url: String,
}

async fn handle_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TrackRequest>,
) -> Json<sync::Ack> {
    let ack = sync::handle_save_notification(
        &state.config,
        &state.pool,
        &state.locks,
        &id,
        req.status,
        &req.url,
    )
    .await;
    Json(ack)
}

// ============ Document management ============

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<Document>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = store::list_documents(&state.pool)
        .await
        .map_err(|e| internal("internal", e.to_string()))?;
    Ok(Json(DocumentListResponse { documents }))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = store::find_document(&state.pool, &id)
        .await
        .map_err(|e| internal("internal", e.to_string()))?
        .ok_or_else(|| not_found(format!("no document with id {}", id)))?;
    Ok(Json(doc))
}

/// Streams the stored binary with its declared content type. The external
/// editor loads documents through this route.
async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let doc = store::find_document(&state.pool, &id)
        .await
        .map_err(|e| internal("internal", e.to_string()))?
        .ok_or_else(|| not_found(format!("no document with id {}", id)))?;

    let bytes = {
        let _guard = state.locks.read(&id).await;
        tokio::fs::read(state.config.storage.root.join(&doc.path))
            .await
            .map_err(|e| not_found(format!("stored file missing: {}", e)))?
    };

    Ok((
        [
            (header::CONTENT_TYPE, doc.mime_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", doc.filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = store::find_document(&state.pool, &id)
        .await
        .map_err(|e| internal("internal", e.to_string()))?
        .ok_or_else(|| not_found(format!("no document with id {}", id)))?;

    store::delete_document(&state.pool, &id)
        .await
        .map_err(|e| internal("internal", e.to_string()))?;

    let file_path = state.config.storage.root.join(&doc.path);
    if let Err(e) = tokio::fs::remove_file(&file_path).await {
        tracing::warn!(path = %file_path.display(), error = %e, "failed to remove stored file");
    }

    Ok(Json(doc))
}
