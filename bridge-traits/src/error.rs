use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Session expired, sign in again")]
    SessionExpired,

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Local audio handle is no longer resolvable: {0}")]
    HandleExpired(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// `true` when the remote store rejected the bearer token.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, BridgeError::SessionExpired)
    }

    /// `true` for failures worth retrying: I/O hiccups, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::OperationFailed(_) | BridgeError::Io(_) => true,
            BridgeError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            BridgeError::NotAvailable(_)
            | BridgeError::SessionExpired
            | BridgeError::HandleExpired(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
