//! Error types for the remote store connector

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The bearer token was rejected (HTTP 401).
    #[error("Session expired")]
    Unauthorized,

    #[error("Remote API error (status {status_code}): {message}")]
    Status { status_code: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<ApiError> for BridgeError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized => BridgeError::SessionExpired,
            ApiError::Status {
                status_code,
                message,
            } => BridgeError::HttpStatus {
                status: status_code,
                message,
            },
            ApiError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            ApiError::InvalidResponse(msg) => {
                BridgeError::OperationFailed(format!("Invalid response: {}", msg))
            }
            ApiError::BridgeError(e) => e,
        }
    }
}
