use thiserror::Error;

/// Chat-completion provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider rejected the credential: {0}")]
    Unauthorized(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("Stream Error: {0}")]
    StreamError(String),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },
}

impl ProviderError {
    /// True when the failure comes from a missing or rejected credential.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::NotConfigured(_) | Self::Unauthorized(_))
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;
