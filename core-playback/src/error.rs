//! # Playback Error Types

use bridge_traits::{error::BridgeError, OutputFailure};
use std::time::Duration;
use thiserror::Error;

/// Why the resolver could not produce a playable source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No copy of the audio was ever stored.
    #[error("audio was never uploaded")]
    NeverUploaded,

    /// The only copy was a session-scoped handle that no longer resolves.
    #[error("audio was lost when the previous session ended")]
    LostToSessionExpiry,

    /// A remote copy exists but could not be fetched right now.
    #[error("failed to fetch audio: {0}")]
    FetchFailed(String),

    /// The remote store rejected the bearer token.
    #[error("session expired")]
    SessionExpired,
}

impl UnavailableReason {
    /// User-facing next step.
    pub fn remediation(&self) -> &'static str {
        match self {
            UnavailableReason::NeverUploaded | UnavailableReason::LostToSessionExpiry => {
                "Re-import the file"
            }
            UnavailableReason::FetchFailed(_) => "Try again",
            UnavailableReason::SessionExpired => "Sign in again",
        }
    }
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    #[error("Audio unavailable: {0}")]
    Unavailable(#[from] UnavailableReason),

    /// Output failed to start audio.
    #[error("Output failure: {0}")]
    Output(#[from] OutputFailure),

    #[error("Source not ready after {0:?}")]
    ReadyTimeout(Duration),

    #[error("No track loaded")]
    NoTrackLoaded,

    #[error("Queue is empty")]
    EmptyQueue,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Errors the engine may retry once for locally sourced audio.
    pub fn is_retryable_locally(&self) -> bool {
        matches!(
            self,
            PlaybackError::Output(OutputFailure::Format(_))
                | PlaybackError::Output(OutputFailure::Transient(_))
                | PlaybackError::ReadyTimeout(_)
        )
    }

    pub fn is_gesture_required(&self) -> bool {
        matches!(self, PlaybackError::Output(OutputFailure::GestureRequired))
    }

    /// User-facing next step.
    pub fn remediation(&self) -> &'static str {
        match self {
            PlaybackError::Unavailable(reason) => reason.remediation(),
            PlaybackError::Output(OutputFailure::GestureRequired) => "Press play",
            PlaybackError::Bridge(err) if err.is_session_expired() => "Sign in again",
            _ => "Try again",
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_distinguishes_reimport_from_retry() {
        assert_eq!(
            UnavailableReason::LostToSessionExpiry.remediation(),
            "Re-import the file"
        );
        assert_eq!(
            UnavailableReason::FetchFailed("503".to_string()).remediation(),
            "Try again"
        );
        assert_eq!(
            PlaybackError::from(UnavailableReason::NeverUploaded).remediation(),
            "Re-import the file"
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(PlaybackError::Output(OutputFailure::Format("codec".into())).is_retryable_locally());
        assert!(!PlaybackError::Output(OutputFailure::Other("boom".into())).is_retryable_locally());
        assert!(PlaybackError::Output(OutputFailure::GestureRequired).is_gesture_required());
    }
}
