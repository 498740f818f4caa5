use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to parse audio container: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Metadata extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Transcription still pending after {polls} polls")]
    TranscriptionTimedOut { polls: u32 },

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

impl MetadataError {
    /// Parse errors are deterministic; only a crashed blocking task is retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, MetadataError::TaskFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
