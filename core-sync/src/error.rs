use bridge_traits::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("File {0} is empty")]
    EmptyFile(String),

    #[error("Could not read {file_name}: {reason}")]
    Unreadable { file_name: String, reason: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    /// The session-scoped copy is gone. Only a re-import recovers it.
    #[error("Local audio for {track_id} was lost when the session ended")]
    LostToSessionExpiry { track_id: String },

    #[error("Cloud sync already in progress")]
    SyncInProgress,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl SyncError {
    pub fn is_lost_to_session_expiry(&self) -> bool {
        matches!(self, SyncError::LostToSessionExpiry { .. })
    }

    pub fn is_session_expired(&self) -> bool {
        match self {
            SyncError::Bridge(err) => err.is_session_expired(),
            SyncError::Library(err) => err.is_session_expired(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
