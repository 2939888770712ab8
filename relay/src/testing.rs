//! Scripted provider used by the relay's unit tests.

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, StreamExt};
use oceanfront_core::client::{ChatProvider, DeltaStream};
use oceanfront_core::errors::{ProviderError, ProviderResult};
use oceanfront_core::types::ChatMessage;
use std::sync::Mutex;

pub(crate) struct ScriptedProvider {
    deltas: Vec<String>,
    failure: Option<fn() -> ProviderError>,
    stalled: bool,
    received: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub(crate) fn deltas(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            failure: None,
            stalled: false,
            received: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(failure: fn() -> ProviderError) -> Self {
        Self {
            deltas: Vec::new(),
            failure: Some(failure),
            stalled: false,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Accepts the request but never opens the stream
    pub(crate) fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::deltas(&[])
        }
    }

    pub(crate) fn received(&self) -> Vec<Vec<ChatMessage>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> ProviderResult<DeltaStream> {
        self.received.lock().unwrap().push(messages);
        if self.stalled {
            future::pending::<()>().await;
        }
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        Ok(stream::iter(self.deltas.clone().into_iter().map(Ok)).boxed())
    }

    async fn complete(&self, _system_prompt: &str, prompt: &str) -> ProviderResult<String> {
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        Ok(format!("SELECT * FROM ocean_data -- {}", prompt))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model_name(&self) -> String {
        "scripted-model".to_string()
    }
}
