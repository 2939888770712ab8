use crate::config::AppConfig;
use crate::http_server::ApiError;
use crate::llm_client::ProviderSetup;
use futures::stream::{self, BoxStream, StreamExt};
use oceanfront_core::client::DeltaStream;
use oceanfront_core::errors::ProviderError;
use oceanfront_core::types::{ChatMessage, Role};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Reply streamed instead of model output when the credential is missing or rejected
pub const NOT_CONFIGURED_WARNING: &str = "⚠️ OceanFront AI is not configured: the server has no valid GROQ_API_KEY. Check server logs for API key errors.";

/// Text of the 400 payload for malformed chat requests
pub const INVALID_FORMAT_TEXT: &str = "Bad Request: Invalid message format.";

// Chunks buffered between the upstream pump and the response body
const OUTBOUND_BUFFER: usize = 32;

/// Result of one chat relay, mapped to a transport status by the HTTP layer
pub enum RelayOutcome {
    /// Upstream accepted the request; text deltas follow in order
    Stream(BoxStream<'static, String>),
    /// The exchange failed; the text is delivered to the caller as the reply
    Degraded(String),
    /// The request body was unusable
    BadRequest(String),
}

impl fmt::Debug for RelayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Degraded(text) => f.debug_tuple("Degraded").field(text).finish(),
            Self::BadRequest(text) => f.debug_tuple("BadRequest").field(text).finish(),
        }
    }
}

/// Relay a chat request body to the provider
pub async fn relay_chat(
    config: &AppConfig,
    setup: &ProviderSetup,
    payload: Option<Value>,
) -> RelayOutcome {
    let Some(history) = payload.as_ref().and_then(parse_history) else {
        warn!("Rejected chat request with invalid message format");
        return RelayOutcome::BadRequest(INVALID_FORMAT_TEXT.to_string());
    };

    let provider = match setup {
        ProviderSetup::Ready(provider) => provider,
        ProviderSetup::NotConfigured { reason } => {
            error!(reason = %reason, "Chat request received while the provider is not configured");
            return RelayOutcome::Degraded(NOT_CONFIGURED_WARNING.to_string());
        }
    };

    info!(turns = history.len(), "Relaying chat request");
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(config.system_prompt.clone()));
    messages.extend(history);

    // One deadline covers opening the upstream stream and pumping it
    let timeout = config.stream_timeout;
    let deadline = Instant::now() + timeout;
    match tokio::time::timeout_at(deadline, provider.stream_chat(messages)).await {
        Ok(Ok(deltas)) => RelayOutcome::Stream(spawn_pump(deltas, deadline, timeout)),
        Ok(Err(e)) => {
            error!(error = %e, "Upstream chat request failed");
            RelayOutcome::Degraded(degraded_text(&e))
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Upstream did not answer before the deadline");
            RelayOutcome::Degraded(deadline_text(timeout))
        }
    }
}

/// Translate a natural-language question into SQL over the ocean Parquet data
pub async fn generate_query(
    config: &AppConfig,
    setup: &ProviderSetup,
    prompt: &str,
) -> Result<String, ApiError> {
    if prompt.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Bad Request: prompt must not be empty.".to_string(),
        ));
    }

    let ProviderSetup::Ready(provider) = setup else {
        return Err(ApiError::NotConfigured(NOT_CONFIGURED_WARNING.to_string()));
    };

    provider
        .complete(&config.query_system_prompt, prompt)
        .await
        .map_err(|e| {
            error!(error = %e, "Query generation failed");
            if e.is_credential_error() {
                ApiError::NotConfigured(NOT_CONFIGURED_WARNING.to_string())
            } else {
                ApiError::Upstream(e.to_string())
            }
        })
}

/// Extracts the conversation from a request body.
///
/// `None` when `messages` is missing or not an array. Roles other than
/// `user` become `assistant`; `text` is accepted in place of `content`.
fn parse_history(payload: &Value) -> Option<Vec<ChatMessage>> {
    let messages = payload.get("messages")?.as_array()?;
    Some(messages.iter().map(wire_message).collect())
}

fn wire_message(value: &Value) -> ChatMessage {
    let role = match value.get("role").and_then(Value::as_str) {
        Some("user") => Role::User,
        _ => Role::Assistant,
    };
    let content = ["content", "text"]
        .iter()
        .find_map(|key| {
            value
                .get(*key)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
        })
        .unwrap_or_default();

    ChatMessage {
        role,
        content: content.to_string(),
    }
}

fn deadline_text(timeout: Duration) -> String {
    format!(
        "Error: Failed to fetch AI response. (stream deadline of {}s exceeded)",
        timeout.as_secs()
    )
}

fn degraded_text(e: &ProviderError) -> String {
    if e.is_credential_error() {
        NOT_CONFIGURED_WARNING.to_string()
    } else {
        format!("Error: Failed to fetch AI response. ({})", e)
    }
}

/// Pumps upstream deltas into the response body from a dedicated task.
///
/// The task ends when upstream finishes, when the body is dropped (client
/// disconnect) or at `deadline`. Failures after the first delta are appended
/// as a final text chunk.
fn spawn_pump(
    mut deltas: DeltaStream,
    deadline: Instant,
    timeout: Duration,
) -> BoxStream<'static, String> {
    let (tx, rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    tokio::spawn(async move {
        let deadline = tokio::time::sleep_until(deadline);
        tokio::pin!(deadline);
        let mut relayed = 0usize;

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    info!(relayed, "Client disconnected, abandoning upstream stream");
                    break;
                }
                _ = &mut deadline => {
                    warn!(relayed, timeout_secs = timeout.as_secs(), "Upstream stream exceeded its deadline");
                    let _ = tx.send(separated(deadline_text(timeout), relayed)).await;
                    break;
                }
                next = deltas.next() => match next {
                    Some(Ok(text)) => {
                        if text.is_empty() {
                            continue;
                        }
                        relayed += 1;
                        if tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!(error = %e, relayed, "Upstream stream failed");
                        let _ = tx.send(separated(degraded_text(&e), relayed)).await;
                        break;
                    }
                    None => {
                        debug!(relayed, "Upstream stream finished");
                        break;
                    }
                }
            }
        }
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|text| (text, rx)) }).boxed()
}

// Keeps a trailing error off the last line of partial output
fn separated(text: String, relayed: usize) -> String {
    if relayed == 0 {
        text
    } else {
        format!("\n\n{}", text)
    }
}
