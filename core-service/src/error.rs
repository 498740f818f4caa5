use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Feature disabled: {0}")]
    FeatureDisabled(&'static str),

    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] core_metadata::MetadataError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    pub fn is_session_expired(&self) -> bool {
        match self {
            CoreError::Bridge(err) => err.is_session_expired(),
            CoreError::Library(err) => err.is_session_expired(),
            CoreError::Sync(err) => err.is_session_expired(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
