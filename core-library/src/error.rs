use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Track not found: {id}")]
    NotFound { id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

impl LibraryError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, LibraryError::Bridge(err) if err.is_session_expired())
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
