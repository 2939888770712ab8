use oceanfront_core::client::{ChatProvider, GroqClient};
use oceanfront_core::config::{RelayConfig, API_KEY_ENV};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Provider state decided once at startup and shared read-only by all requests.
///
/// A missing or unusable credential never stops the daemon; it yields
/// `NotConfigured` and chat requests answer with a warning instead.
#[derive(Clone)]
pub enum ProviderSetup {
    Ready(Arc<dyn ChatProvider>),
    NotConfigured { reason: String },
}

impl ProviderSetup {
    pub fn from_config(config: &RelayConfig) -> Self {
        info!(
            "{} status: {}",
            API_KEY_ENV,
            if config.api_key.is_some() { "LOADED" } else { "MISSING" }
        );

        match GroqClient::new(config) {
            Ok(client) => {
                info!(
                    provider = client.provider_name(),
                    model = %client.model_name(),
                    "Provider client initialized"
                );
                Self::Ready(Arc::new(client))
            }
            Err(e) => {
                error!(error = %e, "Provider client failed to initialize");
                Self::NotConfigured {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn ready(provider: Arc<dyn ChatProvider>) -> Self {
        Self::Ready(provider)
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl fmt::Debug for ProviderSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(provider) => f
                .debug_tuple("Ready")
                .field(&provider.provider_name())
                .finish(),
            Self::NotConfigured { reason } => f
                .debug_struct("NotConfigured")
                .field("reason", reason)
                .finish(),
        }
    }
}
