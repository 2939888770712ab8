pub mod app;
pub mod chat;
pub mod cli;
pub mod decoder;
pub mod logging;
pub mod output;
pub mod relay_client;

pub use chat::{ChatController, ChatStatus, Message};
pub use relay_client::{ChatError, ChatTransport, RelayClient, DEFAULT_RELAY_URL};
