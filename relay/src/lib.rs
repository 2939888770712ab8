//! OceanFront chat relay.
//!
//! Accepts a conversation over HTTP, forwards it to the chat-completion
//! provider in streaming mode and relays the text deltas back as a plain-text
//! body. Every chat failure is delivered as reply text with a 200 status;
//! only malformed requests get an HTTP error.

pub mod config;
pub mod coordinator;
pub mod http_server;
pub mod llm_client;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use coordinator::{RelayOutcome, INVALID_FORMAT_TEXT, NOT_CONFIGURED_WARNING};
pub use http_server::{router, run_server, AppState};
pub use llm_client::ProviderSetup;
