use anyhow::{Context, Result};
use oceanfront_core::config::RelayConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime settings of the relay daemon, resolved from [`RelayConfig`]
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub system_prompt: String,
    pub query_system_prompt: String,
    pub stream_timeout: Duration,
}

impl AppConfig {
    pub fn from_relay_config(config: &RelayConfig) -> Result<Self> {
        let bind_addr = config
            .bind_addr
            .as_deref()
            .unwrap_or("127.0.0.1:3000")
            .parse()
            .with_context(|| format!("Invalid bind address {:?}", config.bind_addr))?;

        Ok(Self {
            bind_addr,
            system_prompt: config.system_prompt().to_string(),
            query_system_prompt: config.query_system_prompt().to_string(),
            stream_timeout: config.stream_timeout(),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let relay = RelayConfig::default();
        AppConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            system_prompt: relay.system_prompt().to_string(),
            query_system_prompt: relay.query_system_prompt().to_string(),
            stream_timeout: relay.stream_timeout(),
        }
    }
}
