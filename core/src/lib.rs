// Core functionality shared by the OceanFront relay and its clients:
// - Chat-completion provider client (Groq, OpenAI-compatible)
// - Request/response data structures
// - Server-Sent Events delta decoding
// - Configuration loading
// - Shared error types

// Export client module - API client for the chat-completion provider
pub mod client;
pub use client::*;

// Export types module - Request/response data structures
pub mod types;
pub use types::*;

// Export sse module - Incremental decoding of streamed completions
pub mod sse;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
