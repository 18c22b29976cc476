/// Shared error type used across all VoxRelay crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// No provider is registered and available to serve a chat request.
    #[error("no LLM provider available")]
    NoProviderAvailable,

    /// Every provider in the fallback chain was attempted and failed.
    #[error("all LLM providers failed")]
    AllProvidersFailed,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("speech: {0}")]
    Speech(String),

    #[error("monitor: {0}")]
    Monitor(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
