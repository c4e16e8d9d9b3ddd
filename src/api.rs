//! HTTP surface for LegalLens.
//!
//! - `POST /api/ai` – Action endpoint: `classifyClauses` splits and classifies raw text and
//!   returns `{ "clauses": [...] }`; `askQuestion` answers `{ question, document }` with
//!   `{ "answer": "..." }`. Unknown actions are rejected with 400.
//! - `POST /api/chat` – Stateless chat: `{ message, document, conversationHistory }` returns
//!   `{ "response": "..." }`, falling back to a fixed apology when the model is unavailable.
//! - `POST /documents` – Multipart upload (`file` field, PDF or plain text) analyzed into the
//!   active document.
//! - `POST /documents/text` – Same for pasted text (`{ "text": "..." }`).
//! - `GET|DELETE /documents/current` – Read or drop the active document.
//! - `POST /documents/current/chat` – Chat about the active document; the exchange is recorded.
//! - `GET /documents/current/conversation` – Recorded chat turns.
//! - `GET /documents/current/export` – Plain-text report download.
//! - `GET /metrics` – Analysis counters.
//! - `GET /commands` – Machine-readable command catalog.

use crate::analysis::{AnalysisApi, AnalysisError, ConversationTurn, Document};
use crate::export::{export_file_name, render_report};
use crate::intake::IntakeError;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Extra room granted to multipart framing on top of the document size cap.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the HTTP router exposing the analysis API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: AnalysisApi + 'static,
{
    let body_limit = service.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES;
    Router::new()
        .route("/api/ai", post(ai_action::<S>))
        .route("/api/chat", post(stateless_chat::<S>))
        .route("/documents", post(upload_document::<S>))
        .route("/documents/text", post(paste_document::<S>))
        .route(
            "/documents/current",
            get(current_document::<S>).delete(clear_document::<S>),
        )
        .route("/documents/current/chat", post(chat_with_document::<S>))
        .route(
            "/documents/current/conversation",
            get(get_conversation::<S>),
        )
        .route("/documents/current/export", get(export_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Request body for `POST /api/ai`.
#[derive(Deserialize)]
struct AiRequest {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    content: Value,
}

/// `content` of an `askQuestion` action.
#[derive(Deserialize)]
struct AskQuestionContent {
    question: String,
    document: Document,
}

/// Dispatch an `/api/ai` action.
async fn ai_action<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<AiRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: AnalysisApi,
{
    let Json(request) = payload?;
    match request.action.as_deref() {
        Some("classifyClauses") => {
            let Value::String(text) = request.content else {
                return Err(ApiError::BadRequest(
                    "classifyClauses content must be the document text".into(),
                ));
            };
            let clauses = service.classify_sections(&text).await;
            tracing::info!(clauses = clauses.len(), "classifyClauses completed");
            Ok(Json(json!({ "clauses": clauses })).into_response())
        }
        Some("askQuestion") => {
            let content: AskQuestionContent = serde_json::from_value(request.content)
                .map_err(|error| {
                    ApiError::BadRequest(format!("askQuestion content is invalid: {error}"))
                })?;
            let reply = service
                .answer_question(&content.question, &content.document)
                .await;
            Ok(Json(json!({ "answer": reply.text })).into_response())
        }
        other => {
            tracing::debug!(action = ?other, "Rejected unknown action");
            Err(ApiError::InvalidAction)
        }
    }
}

/// Request body for `POST /api/chat`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatelessChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    document: Option<Document>,
    #[serde(default)]
    conversation_history: Vec<ConversationTurn>,
}

/// Response body for both chat endpoints.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

/// Chat about a document supplied by the caller.
async fn stateless_chat<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<StatelessChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: AnalysisApi,
{
    let Json(request) = payload?;
    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message is required".into()))?;
    let document = request
        .document
        .ok_or_else(|| ApiError::BadRequest("Document is required".into()))?;

    let reply = service
        .chat(&message, &document, &request.conversation_history)
        .await;
    Ok(Json(ChatResponse {
        response: reply.text,
    }))
}

/// Analyze an uploaded file and make it the active document.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Arc<Document>>, ApiError>
where
    S: AnalysisApi,
{
    let mut multipart = multipart?;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        let document = service
            .analyze_upload(file_name, content_type, bytes.to_vec())
            .await?;
        return Ok(Json(document));
    }
    Err(ApiError::BadRequest("Multipart field 'file' is required".into()))
}

/// Request body for `POST /documents/text`.
#[derive(Deserialize)]
struct PasteRequest {
    text: String,
}

/// Analyze pasted text and make it the active document.
async fn paste_document<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<PasteRequest>, JsonRejection>,
) -> Result<Json<Arc<Document>>, ApiError>
where
    S: AnalysisApi,
{
    let Json(request) = payload?;
    let document = service.analyze_text(request.text).await?;
    Ok(Json(document))
}

/// Return the active document.
async fn current_document<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<Arc<Document>>, ApiError>
where
    S: AnalysisApi,
{
    let document = service
        .store()
        .current()
        .await
        .ok_or(AnalysisError::NoActiveDocument)?;
    Ok(Json(document))
}

/// Drop the active document and its conversation.
async fn clear_document<S>(State(service): State<Arc<S>>) -> StatusCode
where
    S: AnalysisApi,
{
    if service.store().clear().await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Request body for `POST /documents/current/chat`.
#[derive(Deserialize)]
struct DocumentChatRequest {
    message: String,
}

/// Chat about the active document, recording the exchange.
async fn chat_with_document<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<DocumentChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: AnalysisApi,
{
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".into()));
    }
    let reply = service.chat_with_active(&request.message).await?;
    Ok(Json(ChatResponse {
        response: reply.text,
    }))
}

/// Response body for `GET /documents/current/conversation`.
#[derive(Serialize)]
struct ConversationResponse {
    conversation: Vec<ConversationTurn>,
}

/// Return the recorded conversation of the active document.
async fn get_conversation<S>(State(service): State<Arc<S>>) -> Json<ConversationResponse>
where
    S: AnalysisApi,
{
    Json(ConversationResponse {
        conversation: service.store().conversation().await,
    })
}

/// Download the plain-text report for the active document.
async fn export_document<S>(State(service): State<Arc<S>>) -> Result<Response, ApiError>
where
    S: AnalysisApi,
{
    let document = service
        .store()
        .current()
        .await
        .ok_or(AnalysisError::NoActiveDocument)?;
    let today = time::OffsetDateTime::now_utc().date();
    let disposition = format!("attachment; filename=\"{}\"", export_file_name(today));
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        render_report(&document, today),
    )
        .into_response())
}

/// Return a snapshot of the analysis counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: AnalysisApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "classify_clauses",
                method: "POST",
                path: "/api/ai",
                description: "Split raw text into clauses and classify each one. Returns { \"clauses\": [...] }.",
                request_example: Some(json!({
                    "action": "classifyClauses",
                    "content": "1. Termination\n\nEither party may terminate with 30 days notice."
                })),
            },
            CommandDescriptor {
                name: "ask_question",
                method: "POST",
                path: "/api/ai",
                description: "Answer a question about a supplied document. Returns { \"answer\": string }.",
                request_example: Some(json!({
                    "action": "askQuestion",
                    "content": { "question": "Can I cancel?", "document": { "content": "...", "clauses": [] } }
                })),
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/api/chat",
                description: "Chat about a supplied document with prior turns. Returns { \"response\": string }.",
                request_example: Some(json!({
                    "message": "What are the risks?",
                    "document": { "content": "...", "clauses": [] },
                    "conversationHistory": [{ "role": "user", "content": "Hi", "timestamp": 0 }]
                })),
            },
            CommandDescriptor {
                name: "upload_document",
                method: "POST",
                path: "/documents",
                description: "Upload a PDF or text file (multipart field 'file', up to 10MB) and analyze it.",
                request_example: None,
            },
            CommandDescriptor {
                name: "paste_document",
                method: "POST",
                path: "/documents/text",
                description: "Analyze pasted document text and make it the active document.",
                request_example: Some(json!({ "text": "Document contents" })),
            },
            CommandDescriptor {
                name: "current_document",
                method: "GET",
                path: "/documents/current",
                description: "Return the active analyzed document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "document_chat",
                method: "POST",
                path: "/documents/current/chat",
                description: "Ask about the active document; the exchange is kept in its conversation.",
                request_example: Some(json!({ "message": "Who owns the IP?" })),
            },
            CommandDescriptor {
                name: "export",
                method: "GET",
                path: "/documents/current/export",
                description: "Download the plain-text analysis report, highest risk first.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return analysis counters.",
                request_example: None,
            },
        ],
    })
}

enum ApiError {
    Analysis(AnalysisError),
    BadRequest(String),
    InvalidAction,
    Multipart(MultipartError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Analysis(AnalysisError::NoActiveDocument) => {
                (StatusCode::NOT_FOUND, AnalysisError::NoActiveDocument.to_string())
            }
            ApiError::Analysis(AnalysisError::Intake(error)) => {
                let status = match &error {
                    IntakeError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    IntakeError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    IntakeError::EmptyDocument | IntakeError::ExtractionFailure(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                };
                tracing::warn!(error = %error, "Rejected document");
                (status, error.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::InvalidAction => (StatusCode::BAD_REQUEST, "Invalid action".to_string()),
            ApiError::Multipart(error) => (error.status(), error.body_text()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AnalysisError> for ApiError {
    fn from(inner: AnalysisError) -> Self {
        Self::Analysis(inner)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(inner: MultipartError) -> Self {
        Self::Multipart(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::analysis::AnalysisService;
    use crate::chat::CHAT_FALLBACK_RESPONSE;
    use crate::config::Config;
    use crate::llm::{CompletionRequest, LanguageModel, LlmClientError};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmClientError> {
            Err(LlmClientError::ProviderUnavailable("connection refused".into()))
        }
    }

    fn app_with(config: Config, model: Option<Arc<dyn LanguageModel>>) -> Router {
        create_router(Arc::new(AnalysisService::with_model(&config, model)))
    }

    fn offline_app() -> Router {
        app_with(Config::offline(), None)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, bytes.to_vec())
    }

    fn json_body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("json body")
    }

    #[tokio::test]
    async fn commands_catalog_exposes_analysis_endpoints() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let classify = commands
            .iter()
            .find(|cmd| cmd.name == "classify_clauses")
            .expect("classify command present");

        assert_eq!(classify.method, "POST");
        assert_eq!(classify.path, "/api/ai");
        assert!(commands.iter().any(|cmd| cmd.path == "/documents/current/export"));
    }

    #[tokio::test]
    async fn classify_action_returns_clauses_in_order() {
        let app = offline_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ai",
            Some(json!({
                "action": "classifyClauses",
                "content": "1. Fees\n\nThe fee is $10.\n\n2. Secrets\n\nKeep secrets."
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json = json_body(&body);
        let clauses = json["clauses"].as_array().expect("clauses");
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0]["category"], "Payment");
        assert_eq!(clauses[1]["category"], "Confidentiality");
        assert_eq!(clauses[1]["riskLevel"], "medium");
    }

    #[tokio::test]
    async fn unknown_action_is_a_client_error() {
        let app = offline_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ai",
            Some(json!({ "action": "summarize", "content": "text" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body)["error"], "Invalid action");
    }

    #[tokio::test]
    async fn missing_action_is_an_invalid_action() {
        let app = offline_app();
        let (status, body) = send(&app, Method::POST, "/api/ai", Some(json!({ "content": "x" }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body)["error"], "Invalid action");
    }

    #[tokio::test]
    async fn malformed_json_bodies_get_json_errors() {
        let app = offline_app();
        for uri in ["/api/ai", "/api/chat", "/documents/text", "/documents/current/chat"] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::POST)
                        .uri(uri)
                        .header("content-type", "application/json")
                        .body(Body::from("not json"))
                        .expect("request"),
                )
                .await
                .expect("router response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let bytes = to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body bytes");
            assert!(json_body(&bytes)["error"].is_string(), "{uri}");
        }

        let (status, body) = send(&app, Method::POST, "/documents/text", Some(json!({ "txt": "typo" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_body(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn chat_history_accepts_non_user_roles() {
        let app = offline_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({
                "message": "Summarize",
                "document": { "content": "A clause.", "clauses": [] },
                "conversationHistory": [
                    { "role": "system", "content": "Welcome", "timestamp": 1 },
                    { "role": "user", "content": "Hi", "timestamp": 2 }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["response"], CHAT_FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn ask_question_action_answers_offline() {
        let app = offline_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ai",
            Some(json!({
                "action": "askQuestion",
                "content": {
                    "question": "What is this document?",
                    "document": { "id": "1", "content": "text", "clauses": [] }
                }
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(
            json_body(&body)["answer"]
                .as_str()
                .expect("answer")
                .contains("legal document")
        );
    }

    #[tokio::test]
    async fn chat_failure_still_returns_success() {
        let app = app_with(Config::offline(), Some(Arc::new(FailingModel)));
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({
                "message": "Can I cancel?",
                "document": {
                    "id": "doc",
                    "content": "Either party may terminate.",
                    "clauses": [{
                        "id": "clause-1",
                        "originalText": "Either party may terminate.",
                        "category": "Termination",
                        "explanation": "Ends the deal.",
                        "riskLevel": "low",
                        "keyPoints": [],
                        "risks": []
                    }]
                },
                "conversationHistory": [
                    { "role": "user", "content": "Hi", "timestamp": 1 },
                    { "role": "assistant", "content": "Hello", "timestamp": 2 }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["response"], CHAT_FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn chat_requires_message_and_document() {
        let app = offline_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({ "document": { "content": "x", "clauses": [] } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body)["error"], "Message is required");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({ "message": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body)["error"], "Document is required");
    }

    #[tokio::test]
    async fn multipart_upload_becomes_active_document() {
        let app = offline_app();
        let boundary = "legallens-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"nda.txt\"\r\nContent-Type: text/plain\r\n\r\nThe Recipient keeps all confidential information secret.\r\n--{boundary}--\r\n"
        );
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = send(&app, Method::GET, "/documents/current", None).await;
        assert_eq!(status, StatusCode::OK);
        let json = json_body(&body);
        assert_eq!(json["clauses"][0]["category"], "Confidentiality");
        assert_eq!(json["clauses"][0]["id"], "clause-1");
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected_without_state() {
        let app = offline_app();
        let boundary = "legallens-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"photo.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n--{boundary}--\r\n"
        );
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/documents")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let (status, _) = send(&app, Method::GET, "/documents/current", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversize_paste_is_rejected() {
        let mut config = Config::offline();
        config.max_upload_bytes = 16;
        let app = app_with(config, None);

        let (status, body) = send(
            &app,
            Method::POST,
            "/documents/text",
            Some(json!({ "text": "This pasted text is longer than sixteen bytes." })),
        )
        .await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json_body(&body)["error"].as_str().expect("error").contains("too large"));
    }

    #[tokio::test]
    async fn export_orders_clauses_by_risk() {
        let app = offline_app();
        let text = "1. Liability\n\nLiability is unlimited.\n\n2. Fees\n\nThe fee is due.\n\n3. Secrets\n\nConfidential data stays secret.";
        let (status, _) = send(&app, Method::POST, "/documents/text", Some(json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/documents/current/export")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get("content-disposition")
            .and_then(|value| value.to_str().ok())
            .expect("disposition")
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"legal-analysis-"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let report = String::from_utf8(bytes.to_vec()).expect("utf8");

        let high = report.find("Liability (HIGH RISK)").expect("high");
        let medium = report.find("Confidentiality (MEDIUM RISK)").expect("medium");
        let low = report.find("Payment (LOW RISK)").expect("low");
        assert!(high < medium && medium < low);
    }

    #[tokio::test]
    async fn document_chat_records_turns_and_clear_resets() {
        let app = offline_app();
        let (status, _) = send(
            &app,
            Method::POST,
            "/documents/current/chat",
            Some(json!({ "message": "Anything?" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(&app, Method::POST, "/documents/text", Some(json!({ "text": "A clause." }))).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/documents/current/chat",
            Some(json!({ "message": "Anything?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)["response"], CHAT_FALLBACK_RESPONSE);

        let (_, body) = send(&app, Method::GET, "/documents/current/conversation", None).await;
        let json = json_body(&body);
        assert_eq!(json["conversation"].as_array().expect("turns").len(), 2);
        assert_eq!(json["conversation"][0]["role"], "user");

        let (status, _) = send(&app, Method::DELETE, "/documents/current", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&app, Method::GET, "/documents/current/conversation", None).await;
        assert!(json_body(&body)["conversation"].as_array().expect("turns").is_empty());
    }
}
