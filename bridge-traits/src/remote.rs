//! Remote store contracts.
//!
//! The track CRUD API, the object-storage upload proxy and the transcription
//! service are external collaborators. The core consumes them through the
//! traits below; `provider-remote` ships the REST implementation.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Track record as returned by `GET tracks` / `POST track`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrackRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds.
    pub duration: Option<f64>,
    pub genre: Option<String>,
    /// Object-storage key. Presence implies the audio is in the cloud.
    pub file_key: Option<String>,
    /// Legacy records keep the encoded audio on the record itself; it is
    /// fetched lazily through [`TrackStore::fetch_audio`].
    pub has_embedded_audio: bool,
    pub transcript: Option<String>,
}

/// Encoded audio persisted with the record when the upload proxy is down.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedAudio {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Body of `POST track`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTrackRecord {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Option<f64>,
    pub genre: Option<String>,
    pub file_key: Option<String>,
    pub embedded_audio: Option<EmbeddedAudio>,
}

/// Short-lived streaming reference for a cloud object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrl {
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StreamUrl {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Seconds from the start of the track.
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<TranscriptSegment>,
}

/// Analysis payload written with `PUT track/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub transcript: Option<Transcript>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionStatus {
    Pending,
    Processing,
    Completed(Transcript),
    Failed(String),
}

impl TranscriptionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranscriptionStatus::Completed(_) | TranscriptionStatus::Failed(_)
        )
    }
}

/// Bearer-authenticated track CRUD.
///
/// Every method may fail with
/// [`BridgeError::SessionExpired`](crate::error::BridgeError::SessionExpired).
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// `GET tracks`
    async fn list_tracks(&self) -> Result<Vec<RemoteTrackRecord>>;

    /// `POST track`. Not idempotent; callers must not retry blindly.
    async fn create_track(&self, record: &NewTrackRecord) -> Result<RemoteTrackRecord>;

    /// `PUT track/{id}` with a new file key.
    async fn update_file_key(&self, track_id: &str, file_key: &str) -> Result<()>;

    /// `PUT track/{id}` with analysis results.
    async fn update_analysis(&self, track_id: &str, analysis: &TrackAnalysis) -> Result<()>;

    /// `GET track/{id}/stream-url`
    async fn stream_url(&self, track_id: &str) -> Result<StreamUrl>;

    /// `GET track/{id}/audio`, the legacy embedded payload.
    async fn fetch_audio(&self, track_id: &str) -> Result<EmbeddedAudio>;

    /// Download the full object behind a stream URL.
    async fn download(&self, url: &StreamUrl) -> Result<Bytes>;

    /// `DELETE track/{id}`
    async fn delete_track(&self, track_id: &str) -> Result<()>;
}

/// Object-storage upload proxy. One call uploads one object, all or nothing.
#[async_trait]
pub trait UploadProxy: Send + Sync {
    /// Returns the opaque storage key.
    async fn upload(&self, bytes: Bytes, filename: &str, content_type: &str) -> Result<String>;
}

#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    /// `POST transcribe/{trackId}`
    async fn request(&self, track_id: &str) -> Result<TranscriptionStatus>;

    /// Poll the job status for `track_id`.
    async fn status(&self, track_id: &str) -> Result<TranscriptionStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stream_url_expiry() {
        let now = Utc::now();
        let fresh = StreamUrl {
            url: "https://cdn.example.com/a".into(),
            expires_at: Some(now + Duration::minutes(5)),
        };
        let stale = StreamUrl {
            url: "https://cdn.example.com/b".into(),
            expires_at: Some(now - Duration::seconds(1)),
        };
        let open = StreamUrl {
            url: "https://cdn.example.com/c".into(),
            expires_at: None,
        };

        assert!(!fresh.is_expired(now));
        assert!(stale.is_expired(now));
        assert!(!open.is_expired(now));
    }

    #[test]
    fn terminal_transcription_states() {
        assert!(!TranscriptionStatus::Pending.is_terminal());
        assert!(!TranscriptionStatus::Processing.is_terminal());
        assert!(TranscriptionStatus::Failed("no speech".into()).is_terminal());
    }
}
