//! The summarization backend the extension talks to.
//!
//! Three POST routes forward the text plus a fixed instruction to an upstream
//! completion service and wrap the answer in the double-encoded envelope the
//! extension expects: `{"summary": {"statusCode": 200, "body": "<json>"}}`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::models::Endpoint;
use crate::prompts::{prompt_for, user_message};

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, text: &str, prompt: &str) -> anyhow::Result<String>;
}

/// Upstream completions through Gemini.
///
/// Without an API key every completion fails, which the routes report as 500.
pub struct GeminiService {
    model: String,
    client: Option<gemini_rs::Client>,
}

impl GeminiService {
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Self {
        let client = api_key
            .filter(|key| !key.trim().is_empty())
            .map(|key| gemini_rs::Client::new(key));
        if client.is_none() {
            warn!("no Gemini API key configured, completions will fail");
        }
        Self {
            model: model.into(),
            client,
        }
    }
}

#[async_trait]
impl CompletionService for GeminiService {
    async fn complete(&self, text: &str, prompt: &str) -> anyhow::Result<String> {
        let client = self
            .client
            .as_ref()
            .context("Gemini API key is not set, run `instasum set-key <KEY>`")?;
        info!(model = %self.model, "calling Gemini");
        let response = client
            .chat(&self.model)
            .send_message(&user_message(prompt, text))
            .await
            .map_err(|e| anyhow!("Failed to get a response from Gemini: {e}"))?;
        response
            .candidates
            .get(0)
            .and_then(|c| c.content.parts.get(0))
            .and_then(|p| p.text.as_ref())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("Gemini returned no text"))
    }
}

#[derive(Clone)]
struct AppState {
    completions: Arc<dyn CompletionService>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!(message),
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!("Not Found"),
        }
    }

    fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            body: json!("Method Not Allowed"),
        }
    }

    /// Details stay in the log, never in the body.
    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "message": "Internal Server Error" }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn build_router(completions: Arc<dyn CompletionService>) -> Router {
    let mut router = Router::new();
    for endpoint in Endpoint::ALL {
        router = router.route(endpoint.path(), any(summarize));
    }
    router
        .fallback(unknown_route)
        .with_state(AppState { completions })
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(
    addr: SocketAddr,
    completions: Arc<dyn CompletionService>,
) -> anyhow::Result<()> {
    let router = build_router(completions);
    info!(%addr, "Binding HTTP listener");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// The method is checked before the path, so only POST can see a 404.
async fn unknown_route(method: Method) -> ApiError {
    if method != Method::POST {
        return ApiError::method_not_allowed();
    }
    ApiError::not_found()
}

/// `text` from a JSON body. A missing or blank value counts as absent.
fn extract_text(body: &str) -> Result<String, ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::bad_request("Text parameter is missing"));
    }
    let value: Value =
        serde_json::from_str(body).map_err(|_| ApiError::bad_request("Invalid JSON format"))?;
    let text = match value.get("text") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("Text parameter is missing"));
    }
    Ok(text)
}

async fn summarize(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: String,
) -> Result<Json<Value>, ApiError> {
    info!(path = uri.path(), %body, "Request");
    if method != Method::POST {
        return Err(ApiError::method_not_allowed());
    }
    let endpoint = Endpoint::from_path(uri.path()).ok_or_else(ApiError::not_found)?;

    let text = extract_text(&body)?;
    let output = state
        .completions
        .complete(&text, prompt_for(endpoint))
        .await
        .map_err(|e| {
            error!(path = uri.path(), error = %e, "Exception occurred");
            ApiError::internal()
        })?;

    if endpoint == Endpoint::Summary && output.trim().is_empty() {
        return Err(ApiError::bad_request("Empty response from service"));
    }

    let inner = json!({ endpoint.field(): output }).to_string();
    Ok(Json(json!({ "summary": { "statusCode": 200, "body": inner } })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::decode_envelope;
    use crate::prompts::SUMMARY_PROMPT;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    struct Echo;

    #[async_trait]
    impl CompletionService for Echo {
        async fn complete(&self, text: &str, prompt: &str) -> anyhow::Result<String> {
            if prompt.starts_with("Summarize") {
                Ok(format!("summary of {text}"))
            } else {
                Ok(String::new())
            }
        }
    }

    struct Failing;

    #[async_trait]
    impl CompletionService for Failing {
        async fn complete(&self, _text: &str, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow!("upstream exploded: secret detail"))
        }
    }

    async fn call(
        completions: Arc<dyn CompletionService>,
        method: &str,
        uri: &str,
        payload: &str,
    ) -> (StatusCode, String) {
        let response = build_router(completions)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn summary_is_double_encoded() {
        let (status, body) = call(Arc::new(Echo), "POST", "/summary", r#"{"text":"abc"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decode_envelope("/summary", &body, "summary").unwrap(), "summary of abc");
    }

    #[tokio::test]
    async fn other_routes_use_their_own_field() {
        let payload = r#"{"text":"abc"}"#;
        let (status, body) = call(Arc::new(Echo), "POST", "/important-words", payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decode_envelope("u", &body, "importantWords").unwrap(), "");
    }

    #[tokio::test]
    async fn empty_summary_is_a_bad_request() {
        struct Blank;
        #[async_trait]
        impl CompletionService for Blank {
            async fn complete(&self, _: &str, _: &str) -> anyhow::Result<String> {
                Ok("  ".into())
            }
        }
        let (status, body) = call(Arc::new(Blank), "POST", "/summary", r#"{"text":"abc"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#""Empty response from service""#);
    }

    #[tokio::test]
    async fn invalid_or_missing_text_is_rejected() {
        let (status, body) = call(Arc::new(Echo), "POST", "/summary", "{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#""Invalid JSON format""#);

        for payload in ["", "{}", r#"{"text":"   "}"#, r#"{"text":null}"#] {
            let (status, body) = call(Arc::new(Echo), "POST", "/key-highlights", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, r#""Text parameter is missing""#);
        }
    }

    #[tokio::test]
    async fn wrong_method_and_unknown_path() {
        let (status, _) = call(Arc::new(Echo), "GET", "/summary", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = call(Arc::new(Echo), "POST", "/translate", r#"{"text":"abc"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#""Not Found""#);

        let (status, body) = call(Arc::new(Echo), "GET", "/translate", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, r#""Method Not Allowed""#);
    }

    #[tokio::test]
    async fn upstream_failure_hides_details() {
        let (status, body) = call(Arc::new(Failing), "POST", "/summary", r#"{"text":"abc"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"message":"Internal Server Error"}"#);
        assert!(!body.contains("secret"));
    }

    #[tokio::test]
    async fn missing_gemini_key_is_an_internal_error() {
        let gemini = Arc::new(GeminiService::new("gemini-2.0-flash", None));
        for route in ["/summary", "/key-highlights", "/important-words"] {
            let (status, body) = call(gemini.clone(), "POST", route, r#"{"text":"abc"}"#).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, r#"{"message":"Internal Server Error"}"#);
        }

        let blank = GeminiService::new("gemini-2.0-flash", Some("  ".into()));
        let err = blank.complete("abc", SUMMARY_PROMPT).await.unwrap_err();
        assert!(err.to_string().contains("API key is not set"));
    }
}
