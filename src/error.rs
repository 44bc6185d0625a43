//! Error types for the mint sniper

use thiserror::Error;

use crate::filter::RejectReason;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sniper
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors - fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    // Transport errors - retryable
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("WebSocket connection failed: {0}")]
    WsConnection(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    // Stream payload errors - recovered locally, never fatal
    #[error("Payload parse error: {0}")]
    Parse(String),

    // Business rule rejections - never retried
    #[error("Candidate rejected: {0}")]
    Rejected(RejectReason),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is a transient transport failure worth retrying.
    ///
    /// Validation rejections and parse errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::Http(_) | Error::WsConnection(_) | Error::TransactionSend(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}
