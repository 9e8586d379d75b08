use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use routey_agent::{IntentRouter, RagError, RagService};
use routey_core::{ApplicationError, InterfaceError, RouteResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    router: IntentRouter,
    rag: RagService,
}

impl ApiState {
    pub fn new(router: IntentRouter, rag: RagService) -> Self {
        Self { router, rag }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteRequest {
    #[serde(default)]
    pub q: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub text: Value,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub q: Value,
    #[serde(default)]
    pub k: Value,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    detail: &'a str,
    correlation_id: &'a str,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            InterfaceError::BadRequest { message, .. } => (StatusCode::BAD_REQUEST, message),
            InterfaceError::Internal { message, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        let body = ErrorBody {
            error: self.0.error_code(),
            detail,
            correlation_id: self.0.correlation_id(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/ai/route", post(route_query))
        .route("/rag/ingest", post(ingest_document))
        .route("/rag/ask", post(ask_question))
        .with_state(state)
}

pub async fn route_query(
    State(state): State<ApiState>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Json<RouteResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("http.ai_route", correlation_id = %correlation_id);

    async move {
        let Json(request) = body.map_err(|rejection| reject(rejection, &correlation_id))?;
        let query = query_text(&request.q);

        let outcome = state.router.route(&query).await.map_err(|error| {
            fail(ApplicationError::Integration(error.to_string()), &correlation_id)
        })?;
        Ok(Json(outcome.to_response()))
    }
    .instrument(span)
    .await
}

pub async fn ingest_document(
    State(state): State<ApiState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("http.rag_ingest", correlation_id = %correlation_id);

    async move {
        let Json(request) = body.map_err(|rejection| reject(rejection, &correlation_id))?;
        let id = Some(query_text(&request.id)).filter(|id| !id.trim().is_empty());
        let text = query_text(&request.text);
        let metadata = match request.meta {
            Value::Object(meta) => meta,
            _ => Map::new(),
        };

        match state.rag.ingest(id, &text, metadata).await {
            Ok(receipt) => {
                Ok(Json(json!({ "status": "ok", "id": receipt.id, "chars": receipt.chars })))
            }
            Err(RagError::EmptyText) => {
                Ok(Json(json!({ "status": "error", "message": RagError::EmptyText.to_string() })))
            }
            Err(error) => {
                Err(fail(ApplicationError::Integration(error.to_string()), &correlation_id))
            }
        }
    }
    .instrument(span)
    .await
}

pub async fn ask_question(
    State(state): State<ApiState>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("http.rag_ask", correlation_id = %correlation_id);

    async move {
        let Json(request) = body.map_err(|rejection| reject(rejection, &correlation_id))?;
        let question = query_text(&request.q);
        let top_k = top_k_hint(&request.k);

        let answer = state.rag.ask(&question, top_k).await.map_err(|error| {
            fail(ApplicationError::Integration(error.to_string()), &correlation_id)
        })?;
        Ok(Json(json!({ "answer": answer.answer, "sources": answer.sources })))
    }
    .instrument(span)
    .await
}

/// Missing or null becomes empty; other non-strings keep their JSON text.
fn query_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Numbers and numeric strings; anything else falls back to the configured default.
fn top_k_hint(value: &Value) -> Option<usize> {
    let requested = match value {
        Value::Number(number) => {
            number.as_i64().or_else(|| number.as_f64().map(|float| float.trunc() as i64))?
        }
        Value::String(text) => text.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(usize::try_from(requested).unwrap_or(0))
}

fn reject(rejection: JsonRejection, correlation_id: &str) -> ApiError {
    warn!(
        event_name = "http.request.rejected",
        correlation_id,
        reason = %rejection.body_text(),
        "request body rejected"
    );
    ApiError(ApplicationError::InvalidRequest(rejection.body_text()).into_interface(correlation_id))
}

fn fail(error: ApplicationError, correlation_id: &str) -> ApiError {
    let interface = error.into_interface(correlation_id);
    info!(
        event_name = "http.request.failed",
        correlation_id,
        error_code = interface.error_code(),
        error = %interface,
        "request failed"
    );
    ApiError(interface)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use routey_agent::{ChatMessage, CompletionOptions, Embedder, LlmClient, LlmError};
    use routey_core::config::AppConfig;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, top_k_hint, ApiState};
    use crate::bootstrap::assemble;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()) })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<String, LlmError> {
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Transport("script exhausted".to_string())))
        }
    }

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts.iter().map(|text| vec![1.0, text.len() as f32]).collect())
        }
    }

    fn app(replies: Vec<Result<String, LlmError>>) -> Router {
        let application =
            assemble(AppConfig::default(), ScriptedLlm::new(replies), Arc::new(LengthEmbedder));
        router(ApiState::new(application.router, application.rag))
    }

    async fn post(app: Router, path: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn route_returns_hold_action_with_literal_amount() {
        let app = app(vec![Ok(
            r#"{"action":"createPaymentHold","answer":null,"invoiceId":"INV-2002","amount":75.00}"#
                .to_string(),
        )]);

        let (status, body) =
            post(app, "/ai/route", r#"{"q":"Place a hold on invoice INV-2002 for $75.00"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], Value::from("createPaymentHold"));
        assert_eq!(body["args"]["invoiceId"], Value::from("INV-2002"));
        assert_eq!(body["args"]["amount"].to_string(), "75.00");
    }

    #[tokio::test]
    async fn route_with_missing_query_still_answers() {
        let app = app(vec![Ok(r#"{"action":null,"answer":"Ask me something."}"#.to_string())]);

        let (status, body) = post(app, "/ai/route", "{}").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], Value::from("Ask me something."));
    }

    #[tokio::test]
    async fn route_falls_back_to_raw_text_after_two_failed_coercions() {
        let app = app(vec![
            Ok("I think you want a hold".to_string()),
            Ok("```\nSorry, cannot comply\n```".to_string()),
        ]);

        let (status, body) = post(app, "/ai/route", r#"{"q":"hold it"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], Value::from("Sorry, cannot comply"));
        assert!(body.get("action").is_none());
    }

    #[tokio::test]
    async fn provider_failure_maps_to_internal_error() {
        let app = app(vec![Err(LlmError::Status { status: 503, body: "overloaded".to_string() })]);

        let (status, body) = post(app, "/ai/route", r#"{"q":"hi"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], Value::from("internal_error"));
        assert!(body["detail"].as_str().expect("detail").contains("503"));
        assert!(body["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = app(Vec::new());

        let (status, body) = post(app, "/ai/route", "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], Value::from("bad_request"));
    }

    #[tokio::test]
    async fn ingest_blank_text_reports_error_status() {
        let app = app(Vec::new());

        let (status, body) = post(app, "/rag/ingest", r#"{"id":"doc-1","text":"  "}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], Value::from("error"));
        assert_eq!(body["message"], Value::from("text is required"));
    }

    #[tokio::test]
    async fn ingest_then_ask_returns_answer_with_sources() {
        let app = app(vec![Ok("Restart the worker pool.".to_string())]);

        let (status, receipt) = post(
            app.clone(),
            "/rag/ingest",
            concat!(
                r#"{"id":"runbook-1","text":"Restart the worker pool when queues back up.","#,
                r#""meta":{"team":"ops"}}"#
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["status"], Value::from("ok"));
        assert_eq!(receipt["id"], Value::from("runbook-1"));
        assert_eq!(receipt["chars"].to_string(), "44");

        let (status, body) = post(app, "/rag/ask", r#"{"q":"queues are backed up","k":-4}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], Value::from("Restart the worker pool."));
        let sources = body["sources"].as_array().expect("sources");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["metadata"]["docId"], Value::from("runbook-1"));
        assert_eq!(sources[0]["metadata"]["team"], Value::from("ops"));
    }

    #[tokio::test]
    async fn ingest_without_id_generates_one() {
        let app = app(Vec::new());

        let (_, receipt) = post(app, "/rag/ingest", r#"{"text":"cache warmup steps"}"#).await;

        assert_eq!(receipt["status"], Value::from("ok"));
        assert_eq!(receipt["id"].as_str().expect("id").len(), 36);
    }

    #[tokio::test]
    async fn ingest_accepts_non_string_id_and_text() {
        let app = app(Vec::new());

        let (status, receipt) =
            post(app, "/rag/ingest", r#"{"id":5,"text":12345,"meta":"ignored"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["status"], Value::from("ok"));
        assert_eq!(receipt["id"], Value::from("5"));
        assert_eq!(receipt["chars"].to_string(), "5");
    }

    #[tokio::test]
    async fn ask_accepts_top_k_as_string() {
        let app = app(vec![Ok("No context yet.".to_string())]);

        let (status, body) = post(app, "/rag/ask", r#"{"q":"anything","k":"3"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], Value::from("No context yet."));
    }

    #[test]
    fn top_k_hint_reads_numbers_and_numeric_strings() {
        assert_eq!(top_k_hint(&json!(3)), Some(3));
        assert_eq!(top_k_hint(&json!(" 7 ")), Some(7));
        assert_eq!(top_k_hint(&json!(2.9)), Some(2));
        assert_eq!(top_k_hint(&json!(-4)), Some(0));
        assert_eq!(top_k_hint(&json!("three")), None);
        assert_eq!(top_k_hint(&json!([1])), None);
        assert_eq!(top_k_hint(&Value::Null), None);
    }
}
