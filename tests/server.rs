//! HTTP API tests driven through the router without binding a socket.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{pdf_with_pages, FakeModel};
use docchat::chat::{ChatEngine, ChatSettings};
use docchat::error::Result;
use docchat::sentiment::{SentimentClassifier, SentimentLabel, SentimentResult};
use docchat::server::{router, AppState};
use serde_json::Value;
use tower::ServiceExt;

struct NegativeWhenSad;

#[async_trait]
impl SentimentClassifier for NegativeWhenSad {
    async fn classify(&self, text: &str) -> Result<SentimentResult> {
        let label = if text.contains("sad") {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Positive
        };
        Ok(SentimentResult { label, score: 0.9 })
    }
}

fn app_with(model: Arc<FakeModel>, classifier: Option<Arc<dyn SentimentClassifier>>) -> Router {
    let engine = Arc::new(ChatEngine::whole_document(ChatSettings::default(), model));
    router(AppState::new(engine, classifier), 1024 * 1024)
}

fn app(model: Arc<FakeModel>) -> Router {
    app_with(model, None)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn upload(bytes: Vec<u8>, content_type: &str) -> Request<Body> {
    Request::post("/sessions?name=sky.pdf")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .unwrap()
}

fn ask(id: &str, query: &str) -> Request<Body> {
    Request::post(format!("/sessions/{}/messages", id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "query": query }).to_string()))
        .unwrap()
}

async fn create_session(app: &Router) -> String {
    let pdf = pdf_with_pages(&["The sky is blue."]);
    let (status, body) = send(app, upload(pdf, "application/pdf")).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_version() {
    let app = app(FakeModel::new());
    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn upload_creates_session_with_greeting() {
    let app = app(FakeModel::new());
    let pdf = pdf_with_pages(&["The sky is blue."]);
    let (status, body) = send(&app, upload(pdf, "application/pdf")).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"], "awaiting_query");
    assert_eq!(body["mode"], "whole_document");
    assert_eq!(body["document_name"], "sky.pdf");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["role"], "assistant");
    assert_eq!(body["messages"][0]["content"], "How can I help you?");
}

#[tokio::test]
async fn non_pdf_upload_is_415() {
    let app = app(FakeModel::new());
    let (status, body) = send(&app, upload(b"plain words".to_vec(), "text/plain")).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "unsupported_media_type");
}

#[tokio::test]
async fn broken_pdf_is_422() {
    let app = app(FakeModel::new());
    let (status, body) = send(&app, upload(b"%PDF-1.4 garbage".to_vec(), "application/pdf")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "document_parse_error");
}

#[tokio::test]
async fn message_round_trip_appends_turns() {
    let app = app(FakeModel::new());
    let id = create_session(&app).await;

    let (status, body) = send(&app, ask(&id, "What colour is the sky?")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "answer 1");
    assert_eq!(body["session"]["state"], "awaiting_query");
    let messages = body["session"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "What colour is the sky?");

    let (status, body) = send(
        &app,
        Request::get(format!("/sessions/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn empty_query_is_400() {
    let app = app(FakeModel::new());
    let id = create_session(&app).await;
    let (status, body) = send(&app, ask(&id, "  ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn llm_failure_is_502_and_history_unchanged() {
    let model = FakeModel::new();
    let app = app(model.clone());
    let id = create_session(&app).await;

    model.set_failing(true);
    let (status, body) = send(&app, ask(&id, "Q1")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "llm_error");

    let (_, body) = send(
        &app,
        Request::get(format!("/sessions/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_and_deleted_sessions_are_404() {
    let app = app(FakeModel::new());
    let (status, body) = send(&app, ask("missing", "hello")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let id = create_session(&app).await;
    let delete = || {
        Request::delete(format!("/sessions/{}", id))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, delete()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sentiment_disabled_is_400() {
    let app = app(FakeModel::new());
    let request = Request::post("/sentiment")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"text":"hello"}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "sentiment_disabled");
}

#[tokio::test]
async fn sentiment_records_history() {
    let app = app_with(FakeModel::new(), Some(Arc::new(NegativeWhenSad)));
    let classify = |text: &str| {
        Request::post("/sentiment")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "text": text }).to_string()))
            .unwrap()
    };

    let (status, body) = send(&app, classify("a sad day")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["label"], "NEGATIVE");
    assert_eq!(body["heart"], "💔");
    let negative = body["scores"]["negative"].as_f64().unwrap();
    assert!((negative - 0.9).abs() < 1e-6);

    send(&app, classify("a great day")).await;

    let (status, body) = send(
        &app,
        Request::get("/sentiment/history")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current"], "POSITIVE");
    assert_eq!(body["heart"], "❤️");
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["text"], "a sad day");
    assert_eq!(history[0]["sentiment"], "NEGATIVE");
}
