use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use log::{debug, error, info};
use oceanfront_core::types::{
    ChatMessage, GenerateQueryRequest, GenerateQueryResponse, RelayChatRequest,
};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Relay address used when nothing else is configured
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";

/// Failures of a single exchange with the relay
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("API returned status {0}")]
    Status(u16),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("stream interrupted: {0}")]
    Stream(String),
}

/// Raw response body chunks, in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// Opens a streamed chat exchange for a conversation history
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open_stream(&self, history: Vec<ChatMessage>) -> Result<ByteStream, ChatError>;
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

impl RelayClient {
    /// Creates a client for the relay at `base_url`.
    ///
    /// `timeout` bounds a whole exchange, streaming included.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ChatError> {
        let http = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Using OceanFront relay at {}", base_url);
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the relay to turn a question into a SQL query.
    pub async fn generate_query(&self, prompt: &str) -> Result<String, ChatError> {
        let response = self
            .http
            .post(format!("{}/api/generate-query", self.base_url))
            .json(&GenerateQueryRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChatError::Status(response.status().as_u16()));
        }

        let body: GenerateQueryResponse = response.json().await?;
        Ok(body.result)
    }

    /// Checks that the relay answers its health route.
    pub async fn test_connection(&self) -> bool {
        info!("Testing connection to the relay...");
        match self.http.get(format!("{}/", self.base_url)).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Relay connection test successful.");
                true
            }
            Ok(resp) => {
                error!("Relay connection test failed: status {}", resp.status());
                false
            }
            Err(e) => {
                error!("Relay connection test failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ChatTransport for RelayClient {
    async fn open_stream(&self, history: Vec<ChatMessage>) -> Result<ByteStream, ChatError> {
        debug!("Posting {} messages to the relay", history.len());
        let response = self
            .http
            .post(format!("{}/api/ocean-chat", self.base_url))
            .json(&RelayChatRequest { messages: history })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::Stream(e.to_string())))
            .boxed())
    }
}
