//! HTTP front end.
//!
//! One session per uploaded PDF, held in process memory. Each session sits
//! behind its own async mutex, so queries against one session run one at a
//! time while different sessions proceed independently.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sessions` | Upload a PDF (raw body), create a session |
//! | `GET`  | `/sessions/{id}` | Session state and messages |
//! | `POST` | `/sessions/{id}/messages` | Ask a question: `{"query": "..."}` |
//! | `DELETE` | `/sessions/{id}` | Drop a session |
//! | `POST` | `/sentiment` | Classify `{"text": "..."}` |
//! | `GET`  | `/sentiment/history` | Past classifications |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `no_document` (409),
//! `unsupported_media_type` (415), `document_parse_error` (422),
//! `sentiment_disabled` (400), `llm_error` / `embedding_error` /
//! `sentiment_error` (502), `index_error` (500).

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::chat::ChatEngine;
use crate::config::Config;
use crate::error::DocChatError;
use crate::models::Turn;
use crate::sentiment::{
    create_classifier, SentimentClassifier, SentimentHistory, SentimentRecord, SentimentResult,
    SentimentScores,
};
use crate::session::{ChatState, Session};

type SessionMap = HashMap<String, Arc<Mutex<Session>>>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<ChatEngine>,
    sessions: Arc<RwLock<SessionMap>>,
    classifier: Option<Arc<dyn SentimentClassifier>>,
    sentiment_history: Arc<Mutex<SentimentHistory>>,
}

impl AppState {
    pub fn new(engine: Arc<ChatEngine>, classifier: Option<Arc<dyn SentimentClassifier>>) -> Self {
        Self {
            engine,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            classifier,
            sentiment_history: Arc::new(Mutex::new(SentimentHistory::new())),
        }
    }

    async fn session(&self, id: &str) -> Result<Arc<Mutex<Session>>, AppError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DocChatError::SessionNotFound(id.to_string()).into())
    }
}

/// Builds the router. Uploads larger than `max_upload_bytes` are rejected
/// with 413 before reaching a handler.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/messages", post(handle_message))
        .route("/sentiment", post(handle_sentiment))
        .route("/sentiment/history", get(handle_sentiment_history))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Starts the server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let engine = Arc::new(ChatEngine::from_config(config).await?);
    let classifier: Option<Arc<dyn SentimentClassifier>> = if config.sentiment.is_enabled() {
        Some(Arc::from(create_classifier(&config.sentiment)?))
    } else {
        None
    };

    let state = AppState::new(engine, classifier);
    let app = router(state, config.server.max_upload_bytes);

    tracing::info!(
        bind = %config.server.bind,
        mode = config.chat.mode.as_str(),
        "docchat server listening"
    );
    println!("docchat server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
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

impl From<DocChatError> for AppError {
    fn from(err: DocChatError) -> Self {
        let (status, code) = match &err {
            DocChatError::EmptyQuery => (StatusCode::BAD_REQUEST, "bad_request"),
            DocChatError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            DocChatError::NoDocument => (StatusCode::CONFLICT, "no_document"),
            DocChatError::UnsupportedContentType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type")
            }
            DocChatError::DocumentParse(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "document_parse_error")
            }
            DocChatError::LlmCall(_) => (StatusCode::BAD_GATEWAY, "llm_error"),
            DocChatError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            DocChatError::Sentiment(_) => (StatusCode::BAD_GATEWAY, "sentiment_error"),
            DocChatError::Index(_) | DocChatError::DuplicateId(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "index_error")
            }
        };
        AppError::new(status, code, err.to_string())
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

// ============ Sessions ============

/// Public view of a session.
#[derive(Serialize)]
struct SessionView {
    id: String,
    state: ChatState,
    mode: &'static str,
    document_name: Option<String>,
    created_at: String,
    messages: Vec<Turn>,
}

impl SessionView {
    fn of(session: &Session, engine: &ChatEngine) -> Self {
        Self {
            id: session.id().to_string(),
            state: session.state(),
            mode: engine.mode().as_str(),
            document_name: session.document_name().map(str::to_string),
            created_at: session.created_at().to_rfc3339(),
            messages: session.turns().to_vec(),
        }
    }
}

#[derive(Deserialize)]
struct UploadParams {
    name: Option<String>,
}

/// `POST /sessions`: body is the raw PDF; `?name=` labels the document.
async fn handle_create_session(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let mut session = state.engine.new_session();
    state
        .engine
        .load_document(&mut session, &body, content_type, params.name.as_deref())
        .await?;

    let view = SessionView::of(&session, &state.engine);
    state
        .sessions
        .write()
        .await
        .insert(session.id().to_string(), Arc::new(Mutex::new(session)));

    Ok((StatusCode::CREATED, Json(view)))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(Json(SessionView::of(&session, &state.engine)))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.sessions.write().await.remove(&id) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(DocChatError::SessionNotFound(id).into()),
    }
}

#[derive(Deserialize)]
struct MessageRequest {
    query: String,
}

#[derive(Serialize)]
struct MessageResponse {
    answer: String,
    session: SessionView,
}

/// `POST /sessions/{id}/messages`. The session lock is held for the whole
/// turn, so concurrent posts to one session are answered in order.
async fn handle_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;

    let answer = state.engine.ask(&mut session, &req.query).await?;
    session.displayed();

    Ok(Json(MessageResponse {
        answer,
        session: SessionView::of(&session, &state.engine),
    }))
}

// ============ Sentiment ============

#[derive(Deserialize)]
struct SentimentRequest {
    text: String,
}

#[derive(Serialize)]
struct SentimentResponse {
    result: SentimentResult,
    scores: SentimentScores,
    heart: &'static str,
}

async fn handle_sentiment(
    State(state): State<AppState>,
    Json(req): Json<SentimentRequest>,
) -> Result<Json<SentimentResponse>, AppError> {
    let classifier = state.classifier.as_ref().ok_or_else(|| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "sentiment_disabled",
            "sentiment analysis is disabled; set [sentiment] provider in config",
        )
    })?;
    if req.text.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "text must not be empty",
        ));
    }

    let result = classifier.classify(&req.text).await?;
    let mut history = state.sentiment_history.lock().await;
    history.record(&req.text, &result);

    Ok(Json(SentimentResponse {
        result,
        scores: SentimentScores::from_result(&result),
        heart: history.heart(),
    }))
}

#[derive(Serialize)]
struct SentimentHistoryResponse {
    current: &'static str,
    heart: &'static str,
    history: Vec<SentimentRecord>,
}

async fn handle_sentiment_history(State(state): State<AppState>) -> Json<SentimentHistoryResponse> {
    let history = state.sentiment_history.lock().await;
    Json(SentimentHistoryResponse {
        current: history.current().as_str(),
        heart: history.heart(),
        history: history.records().to_vec(),
    })
}
