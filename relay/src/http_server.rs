use crate::config::AppConfig;
use crate::coordinator::{self, RelayOutcome};
use crate::llm_client::ProviderSetup;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use oceanfront_core::types::{GenerateQueryRequest, GenerateQueryResponse};
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    provider: ProviderSetup,
}

impl AppState {
    pub fn new(config: AppConfig, provider: ProviderSetup) -> Self {
        Self {
            config: Arc::new(config),
            provider,
        }
    }
}

/// Error body of the JSON endpoints
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotConfigured(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotConfigured(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            Self::Upstream(m) => {
                error!(error = %m, "Upstream provider error");
                (StatusCode::BAD_GATEWAY, format!("Upstream provider error: {}", m))
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl IntoResponse for RelayOutcome {
    fn into_response(self) -> Response {
        match self {
            RelayOutcome::Stream(chunks) => {
                let body = Body::from_stream(
                    chunks.map(|text| Ok::<_, Infallible>(Bytes::from(text))),
                );
                text_response(body)
            }
            RelayOutcome::Degraded(text) => text_response(Body::from(text)),
            RelayOutcome::BadRequest(text) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "parts": [{ "type": "text", "text": text }] })),
            )
                .into_response(),
        }
    }
}

fn text_response(body: Body) -> Response {
    ([(header::CONTENT_TYPE, TEXT_PLAIN_UTF8)], body).into_response()
}

/// Build the router with all relay routes
pub fn router(state: AppState) -> Router {
    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/api/ocean-chat", post(handle_chat))
        .route("/api/generate-query", post(handle_generate_query))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn run_server(config: AppConfig, provider: ProviderSetup) -> anyhow::Result<()> {
    let addr = config.bind_addr;
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    let app = router(AppState::new(config, provider));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start HTTP server: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Health check handler
async fn health() -> impl IntoResponse {
    "OceanFront relay is running"
}

/// Handler for streamed chat requests
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> RelayOutcome {
    let payload = match payload {
        Ok(Json(value)) => Some(value),
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable chat request body");
            None
        }
    };

    coordinator::relay_chat(&state.config, &state.provider, payload).await
}

/// Handler for natural-language to SQL requests
async fn handle_generate_query(
    State(state): State<AppState>,
    payload: Result<Json<GenerateQueryRequest>, JsonRejection>,
) -> Result<Json<GenerateQueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Unreadable query request body");
        ApiError::BadRequest("Bad Request: expected a JSON body with a `prompt` field.".to_string())
    })?;

    let result = coordinator::generate_query(&state.config, &state.provider, &request.prompt).await?;
    Ok(Json(GenerateQueryResponse { result }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{INVALID_FORMAT_TEXT, NOT_CONFIGURED_WARNING};
    use crate::testing::ScriptedProvider;
    use axum::http::Request;
    use oceanfront_core::errors::ProviderError;
    use tower::ServiceExt;

    fn app(provider: ProviderSetup) -> Router {
        router(AppState::new(AppConfig::default(), provider))
    }

    fn ready(deltas: &[&str]) -> ProviderSetup {
        ProviderSetup::ready(Arc::new(ScriptedProvider::deltas(deltas)))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(ready(&[]))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OceanFront relay is running");
    }

    #[tokio::test]
    async fn test_chat_streams_concatenated_deltas() {
        let response = app(ready(&["The", " dataset", " includes..."]))
            .oneshot(post_json(
                "/api/ocean-chat",
                r#"{"messages":[{"role":"user","content":"What data is available?"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            TEXT_PLAIN_UTF8
        );
        assert_eq!(body_text(response).await, "The dataset includes...");
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_rejected() {
        for body in [
            r#"{}"#,
            r#"{"messages":"hello"}"#,
            r#"{"messages":null}"#,
            r#"not json"#,
        ] {
            let response = app(ready(&["unused"]))
                .oneshot(post_json("/api/ocean-chat", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);

            let payload: Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(payload["parts"][0]["type"], "text");
            assert_eq!(payload["parts"][0]["text"], INVALID_FORMAT_TEXT);
        }
    }

    #[tokio::test]
    async fn test_missing_content_type_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/ocean-chat")
            .body(Body::from(r#"{"messages":[]}"#))
            .unwrap();
        let response = app(ready(&[])).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_streams_warning_with_ok_status() {
        let provider = ProviderSetup::NotConfigured {
            reason: "GROQ_API_KEY is not set".to_string(),
        };
        let response = app(provider)
            .oneshot(post_json(
                "/api/ocean-chat",
                r#"{"messages":[{"role":"user","content":"hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, NOT_CONFIGURED_WARNING);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_ok_with_error_text() {
        let provider = ProviderSetup::ready(Arc::new(ScriptedProvider::failing(|| {
            ProviderError::RequestError("connection refused".to_string())
        })));
        let response = app(provider)
            .oneshot(post_json(
                "/api/ocean-chat",
                r#"{"messages":[{"role":"user","content":"hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let text = body_text(response).await;
        assert!(text.contains("connection refused"), "got: {}", text);
    }

    #[tokio::test]
    async fn test_generate_query() {
        let response = app(ready(&[]))
            .oneshot(post_json(
                "/api/generate-query",
                r#"{"prompt":"average salinity in the Bay of Bengal"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let payload: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(payload["result"]
            .as_str()
            .unwrap()
            .contains("average salinity in the Bay of Bengal"));
    }

    #[tokio::test]
    async fn test_generate_query_errors() {
        let response = app(ready(&[]))
            .oneshot(post_json("/api/generate-query", r#"{"question":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unconfigured = ProviderSetup::NotConfigured {
            reason: "missing".to_string(),
        };
        let response = app(unconfigured)
            .oneshot(post_json("/api/generate-query", r#"{"prompt":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let failing = ProviderSetup::ready(Arc::new(ScriptedProvider::failing(|| {
            ProviderError::HttpError {
                status_code: 500,
                message: "boom".to_string(),
            }
        })));
        let response = app(failing)
            .oneshot(post_json("/api/generate-query", r#"{"prompt":"x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
