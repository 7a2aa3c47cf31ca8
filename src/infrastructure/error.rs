use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Stored token is unreadable: {0}")]
    CorruptToken(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Calendar request failed: {0}")]
    Remote(String),
}
