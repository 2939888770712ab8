use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::RelayConfig;
use crate::errors::{ProviderError, ProviderResult};
use crate::sse::{parse_delta, SseDecoder, SseEvent};
use crate::types::*;

/// Ordered stream of text deltas from a streamed completion
pub type DeltaStream = Pin<Box<dyn Stream<Item = ProviderResult<String>> + Send>>;

/// Common trait for chat-completion providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Opens a streamed completion for the given messages.
    ///
    /// Errors raised before the first delta (bad credential, HTTP status)
    /// are returned here; later failures surface as stream items.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> ProviderResult<DeltaStream>;

    /// Single-shot completion of `prompt` under `system_prompt`
    async fn complete(&self, system_prompt: &str, prompt: &str) -> ProviderResult<String>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Get the model name being used for chat
    fn model_name(&self) -> String;
}

/// Client for Groq's OpenAI-compatible chat-completions API
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    query_model: String,
}

impl GroqClient {
    /// Create a new client from the relay config.
    ///
    /// Fails with [`ProviderError::NotConfigured`] when no credential is set.
    pub fn new(config: &RelayConfig) -> ProviderResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "{} is not set. Cannot initialize the provider client.",
                    crate::config::API_KEY_ENV
                ))
            })?;

        let defaults = RelayConfig::default();
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| ProviderError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .or(defaults.base_url)
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone().or(defaults.model).unwrap_or_default(),
            query_model: config
                .query_model
                .clone()
                .or(defaults.query_model)
                .unwrap_or_default(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ProviderResult<reqwest::Response> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.map_err(|e| {
            ProviderError::RequestError(format!("Failed to read error response: {}", e))
        })?;
        let message = serde_json::from_str::<ProviderErrorBody>(&error_body)
            .map(|body| body.error.message)
            .unwrap_or(error_body);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Unauthorized(message));
        }

        Err(ProviderError::HttpError {
            status_code: status.as_u16(),
            message: format!("API request failed: {}", message),
        })
    }
}

#[async_trait]
impl ChatProvider for GroqClient {
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> ProviderResult<DeltaStream> {
        debug!(model = %self.model, messages = messages.len(), "Opening streamed completion");
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            stream: true,
            temperature: None,
        };

        let response = self.post_completion(&request).await?;
        Ok(delta_stream(Box::pin(response.bytes_stream())))
    }

    async fn complete(&self, system_prompt: &str, prompt: &str) -> ProviderResult<String> {
        debug!(model = %self.query_model, "Requesting single-shot completion");
        let request = ChatCompletionRequest {
            model: self.query_model.clone(),
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(prompt)],
            stream: false,
            temperature: None,
        };

        let response = self
            .post_completion(&request)
            .await?
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::ParsingError(format!("Failed to parse response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParsingError("No content in response".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "groq"
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

struct DeltaState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    failure: Option<ProviderError>,
    finished: bool,
}

impl<S> DeltaState<S> {
    /// Queues the deltas of decoded events; stops at `[DONE]` or the first
    /// bad event, whose error is held until the queued deltas are drained.
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Done => {
                    self.finished = true;
                    break;
                }
                SseEvent::Data(data) => match parse_delta(&data) {
                    Ok(Some(delta)) => self.pending.push_back(delta),
                    Ok(None) => {}
                    Err(e) => {
                        self.fail(e);
                        break;
                    }
                },
            }
        }
    }

    fn fail(&mut self, error: ProviderError) {
        self.failure = Some(error);
        self.finished = true;
    }
}

/// Turns a raw SSE byte stream into an ordered stream of text deltas.
///
/// The stream ends after `[DONE]` or end of body. An error ends it too, after
/// every delta decoded before the error has been yielded.
pub fn delta_stream<S, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display,
{
    let state = DeltaState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        failure: None,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if let Some(error) = state.failure.take() {
                return Some((Err(error), state));
            }
            if state.finished {
                return None;
            }

            let events = match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.push(&chunk),
                Some(Err(e)) => {
                    state.fail(ProviderError::StreamError(e.to_string()));
                    continue;
                }
                None => {
                    state.finished = true;
                    state.decoder.finish()
                }
            };
            state.absorb(events);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use futures::TryStreamExt;

    fn chunk(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    fn byte_stream(
        parts: Vec<&'static [u8]>,
    ) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))))
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config_for(base_url: String) -> RelayConfig {
        RelayConfig {
            api_key: Some("test-key".to_string()),
            base_url: Some(base_url),
            ..RelayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_delta_stream_preserves_order_and_stops_at_done() {
        let deltas: Vec<String> = delta_stream(byte_stream(vec![
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"The\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" data",
            b"set\"}}]}\n\n",
            b"data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ]))
        .try_collect()
        .await
        .unwrap();

        assert_eq!(deltas, vec!["The".to_string(), " dataset".to_string()]);
    }

    #[tokio::test]
    async fn test_delta_stream_ends_at_eof_without_done() {
        let deltas: Vec<String> =
            delta_stream(byte_stream(vec![b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"]))
                .try_collect()
                .await
                .unwrap();
        assert_eq!(deltas, vec!["tail".to_string()]);
    }

    #[tokio::test]
    async fn test_delta_stream_surfaces_transport_error_after_deltas() {
        let parts = stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"The\"}}]}\n\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n")),
        ]);
        let items: Vec<ProviderResult<String>> = delta_stream(parts).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "The");
        assert!(matches!(items[1], Err(ProviderError::StreamError(_))));
    }

    #[tokio::test]
    async fn test_deltas_before_an_in_band_error_are_kept() {
        let items: Vec<ProviderResult<String>> = delta_stream(byte_stream(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"The\"}}]}\n\ndata: {\"error\":{\"message\":\"overloaded\"}}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
        ]))
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "The");
        assert!(matches!(&items[1], Err(ProviderError::StreamError(msg)) if msg == "overloaded"));
    }

    #[tokio::test]
    async fn test_deltas_before_a_malformed_line_are_kept() {
        let items: Vec<ProviderResult<String>> = delta_stream(byte_stream(vec![
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Argo\"}}]}\n\ndata: {not json\n\n",
        ]))
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Argo");
        assert!(matches!(items[1], Err(ProviderError::ParsingError(_))));
    }

    #[test]
    fn test_missing_credential_is_not_configured() {
        let err = GroqClient::new(&RelayConfig::default()).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let blank = RelayConfig {
            api_key: Some("   ".to_string()),
            ..RelayConfig::default()
        };
        assert!(matches!(
            GroqClient::new(&blank),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_chat_against_stub_provider() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: axum::http::HeaderMap, body: String| async move {
                assert_eq!(
                    headers.get(header::AUTHORIZATION).unwrap(),
                    "Bearer test-key"
                );
                let request: serde_json::Value = serde_json::from_str(&body).unwrap();
                assert_eq!(request["stream"], true);
                assert_eq!(request["messages"][0]["role"], "system");

                let sse = format!("{}{}data: [DONE]\n\n", chunk("Argo"), chunk(" floats"));
                ([(header::CONTENT_TYPE, "text/event-stream")], sse)
            }),
        );
        let client = GroqClient::new(&config_for(serve(app).await)).unwrap();

        let deltas: Vec<String> = client
            .stream_chat(vec![ChatMessage::system("sys"), ChatMessage::user("hi")])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(deltas.concat(), "Argo floats");
    }

    #[tokio::test]
    async fn test_rejected_credential_maps_to_unauthorized() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#,
                )
                    .into_response()
            }),
        );
        let client = GroqClient::new(&config_for(serve(app).await)).unwrap();

        let err = match client.stream_chat(vec![ChatMessage::user("hi")]).await {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, ProviderError::Unauthorized(msg) if msg == "Invalid API Key"));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_http_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "over capacity").into_response() }),
        );
        let client = GroqClient::new(&config_for(serve(app).await)).unwrap();

        let err = client.complete("sys", "hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::HttpError { status_code: 503, .. }));
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let app = Router::new().route(
            "/chat/completions",
            post(|body: String| async move {
                let request: serde_json::Value = serde_json::from_str(&body).unwrap();
                assert_eq!(request["stream"], false);
                assert_eq!(request["model"], "mixtral-8x7b");
                axum::Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "SELECT * FROM argo"}}]
                }))
            }),
        );
        let client = GroqClient::new(&config_for(serve(app).await)).unwrap();

        let sql = client.complete("sys", "all floats").await.unwrap();
        assert_eq!(sql, "SELECT * FROM argo");
    }
}
