use thiserror::Error;

/// Errors raised while loading the delivery plan or engine settings.
///
/// These are fatal to `start` only: the loop stays idle and the control
/// surface keeps serving.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{file} not found")]
    MissingFile { file: String },

    #[error("failed to read {file}: {message}")]
    Unreadable { file: String, message: String },

    #[error("no valid credentials found")]
    NoCredentials,

    #[error("conversation id must be numeric, got '{0}'")]
    NonNumericConversation(String),

    #[error("no message templates found")]
    NoTemplates,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

/// Errors from the account transport (authentication, probing, sending).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Errors from delivery engine operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("template sequence is empty")]
    EmptyTemplates,

    #[error("internal error: {0}")]
    Internal(String),
}
