//! HTTP JSON API.
//!
//! Thin glue over the upload pipeline, the document store, and the QA
//! engine. Handlers translate typed errors into the JSON error contract;
//! no business logic lives here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/documents/upload` | Multipart PDF upload |
//! | `GET`  | `/api/documents` | All documents, newest first |
//! | `GET`  | `/api/documents/{id}` | One document with its questions |
//! | `DELETE` | `/api/documents/{id}` | Delete a document |
//! | `POST` | `/api/qa` | Ask a question about a document |
//! | `GET`  | `/api/qa/document/{id}` | Question history for a document |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: abc" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `provider_disabled` (400), `provider_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::completion::create_completer;
use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::engine::{QaEngine, QaError};
use crate::extract::PdfExtractor;
use crate::models::{format_ts_iso, AnswerRecord, Document};
use crate::store::{SqliteStore, Store};
use crate::upload::{remove_stored_file, UploadError, Uploader};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
    uploader: Arc<Uploader>,
    /// `None` when the embedding or completion provider is disabled; the
    /// document CRUD surface stays usable, `/api/qa` returns 400.
    engine: Option<Arc<QaEngine>>,
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and serves until the process is terminated.
/// Document upload and CRUD work with any configuration; the QA endpoint
/// additionally needs both the embedding and completion providers enabled.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let extractor = Arc::new(PdfExtractor);

    let engine = if config.embedding.is_enabled() && config.completion.is_enabled() {
        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.completion)?;
        Some(Arc::new(QaEngine::new(
            store.clone(),
            extractor.clone(),
            embedder,
            completer,
            config.chunking.clone(),
            &config.retrieval,
            &config.embedding,
        )))
    } else {
        println!("Question answering disabled (no embedding/completion provider configured)");
        None
    };

    let uploader = Arc::new(Uploader::new(
        store.clone(),
        extractor,
        config.storage.clone(),
    ));

    let state = AppState {
        store,
        uploader,
        engine,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Body limit: the configured file cap plus headroom for multipart framing.
    let body_limit = config.storage.max_upload_bytes as usize + 64 * 1024;

    let app = Router::new()
        .route(
            "/api/documents/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/documents", get(handle_list_documents))
        .route("/api/documents/{id}", get(handle_get_document))
        .route("/api/documents/{id}", delete(handle_delete_document))
        .route("/api/qa", post(handle_ask))
        .route("/api/qa/document/{id}", get(handle_list_questions))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    let bind_addr = &config.server.bind;
    println!("Server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
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

/// Internal error type that converts into an HTTP response.
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
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<QaError> for AppError {
    fn from(err: QaError) -> Self {
        match &err {
            QaError::DocumentNotFound(_) => not_found(err.to_string()),
            QaError::Extraction(_) => internal(err.to_string()),
            QaError::Embedding(_) | QaError::Completion(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "provider_error", err.to_string())
            }
            QaError::Persistence { .. } | QaError::Storage(_) => internal(err.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match &err {
            // A file that fails PDF parsing is a client problem too.
            UploadError::Extraction(_) => {
                bad_request(format!("file is not a valid PDF: {}", err))
            }
            _ if err.is_client_error() => bad_request(err.to_string()),
            _ => internal(err.to_string()),
        }
    }
}

// ============ Response bodies ============

/// Document as serialized for API responses. The on-disk file path is
/// internal and never exposed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResponse {
    id: String,
    filename: String,
    title: String,
    uploaded_at: String,
}

impl From<&Document> for DocumentResponse {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            filename: doc.filename.clone(),
            title: doc.title.clone(),
            uploaded_at: format_ts_iso(doc.uploaded_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionResponse {
    id: String,
    document_id: String,
    question: String,
    answer: String,
    created_at: String,
}

impl From<&AnswerRecord> for QuestionResponse {
    fn from(record: &AnswerRecord) -> Self {
        Self {
            id: record.id.clone(),
            document_id: record.document_id.clone(),
            question: record.question.clone(),
            answer: record.answer.clone(),
            created_at: format_ts_iso(record.created_at),
        }
    }
}

#[derive(Serialize)]
struct DocumentDetailResponse {
    #[serde(flatten)]
    document: DocumentResponse,
    questions: Vec<QuestionResponse>,
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

// ============ POST /api/documents/upload ============

/// Accepts a multipart form with a single `file` field holding the PDF.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|n| n.to_string())
            .ok_or_else(|| bad_request("file field is missing a filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let document = state.uploader.upload(&filename, bytes.to_vec()).await?;
        return Ok((StatusCode::CREATED, Json(DocumentResponse::from(&document))));
    }

    Err(bad_request("multipart body must contain a 'file' field"))
}

// ============ GET /api/documents ============

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentResponse>>, AppError> {
    let docs = state
        .store
        .list_documents()
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(docs.iter().map(DocumentResponse::from).collect()))
}

// ============ GET /api/documents/{id} ============

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetailResponse>, AppError> {
    let document = state
        .store
        .find_document(&id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("document not found: {}", id)))?;

    let questions = state
        .store
        .list_questions(&id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(DocumentDetailResponse {
        document: DocumentResponse::from(&document),
        questions: questions.iter().map(QuestionResponse::from).collect(),
    }))
}

// ============ DELETE /api/documents/{id} ============

/// Removes the document row, its question records, its stored file, and
/// any cached index, in that order. File and cache cleanup are best-effort
/// once the row is gone.
async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let document = state
        .store
        .delete_document(&id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("document not found: {}", id)))?;

    remove_stored_file(FsPath::new(&document.filepath));
    if let Some(engine) = &state.engine {
        engine.invalidate(&id);
    }

    Ok(Json(DocumentResponse::from(&document)))
}

// ============ POST /api/qa ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest {
    document_id: String,
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<QuestionResponse>, AppError> {
    let engine = state.engine.as_ref().ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "provider_disabled",
            "question answering requires embedding and completion providers",
        )
    })?;

    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let record = engine.answer(&req.document_id, req.question.trim()).await?;
    Ok(Json(QuestionResponse::from(&record)))
}

// ============ GET /api/qa/document/{id} ============

async fn handle_list_questions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<QuestionResponse>>, AppError> {
    let document = state
        .store
        .find_document(&id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    if document.is_none() {
        return Err(not_found(format!("document not found: {}", id)));
    }

    let questions = state
        .store
        .list_questions(&id)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(questions.iter().map(QuestionResponse::from).collect()))
}
