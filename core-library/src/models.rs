//! Domain models for the music library
//!
//! A [`Track`] carries up to three physical copies of its audio, one per
//! [`AudioSource`] variant. Which one actually plays is decided at resolution
//! time by the playback crate; this module only describes what exists.

use bridge_traits::{
    remote::{EmbeddedAudio, RemoteTrackRecord, StreamUrl, Transcript},
    storage::LocalHandle,
    MediaRef,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Prefix for tracks whose remote record has not been created yet.
pub const LOCAL_ID_PREFIX: &str = "local-";

// =============================================================================
// ID Types
// =============================================================================

/// Track identifier.
///
/// Usually the remote record id. Tracks imported while the record could not
/// be created carry a generated `local-…` id until the reconciler creates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh `local-…` id.
    pub fn new_local() -> Self {
        Self(format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4()))
    }

    /// `true` when no remote record exists for this track yet.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque object-storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudKey(String);

impl CloudKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CloudKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Audio sources
// =============================================================================

/// A local copy of the audio.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalRef {
    /// Encoded bytes held directly on the track. Never expires.
    SelfContained(EmbeddedAudio),
    /// Session-scoped handle. Must be probed before use.
    Ephemeral(LocalHandle),
}

impl LocalRef {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, LocalRef::Ephemeral(_))
    }
}

/// The legacy payload persisted on the remote record.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedPayload {
    /// Present on the record; fetched on first resolution.
    OnRecord,
    /// Already fetched into memory.
    Loaded(EmbeddedAudio),
}

/// One physical copy of a track's audio.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    Local(LocalRef),
    Embedded(EmbeddedPayload),
    Cloud(CloudKey),
}

/// Every copy a track currently knows about. Each slot is independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSources {
    pub local: Option<LocalRef>,
    pub embedded: Option<EmbeddedPayload>,
    pub cloud: Option<CloudKey>,
}

impl AudioSources {
    pub fn is_empty(&self) -> bool {
        self.local.is_none() && self.embedded.is_none() && self.cloud.is_none()
    }

    /// Present sources in resolution priority order: local, cloud, embedded.
    pub fn candidates(&self) -> Vec<AudioSource> {
        let mut out = Vec::with_capacity(3);
        if let Some(local) = &self.local {
            out.push(AudioSource::Local(local.clone()));
        }
        if let Some(key) = &self.cloud {
            out.push(AudioSource::Cloud(key.clone()));
        }
        if let Some(embedded) = &self.embedded {
            out.push(AudioSource::Embedded(embedded.clone()));
        }
        out
    }

    /// Nothing persisted remotely; the only copy is local.
    pub fn is_local_only(&self) -> bool {
        self.local.is_some() && self.cloud.is_none() && self.embedded.is_none()
    }
}

// =============================================================================
// Resolved source cache
// =============================================================================

/// Which copy a resolved source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceOrigin {
    LocalHandle,
    SelfContained,
    /// Streamed from object storage.
    CloudStream,
    /// Downloaded from object storage into a fresh local handle.
    CloudDownload,
    Embedded,
}

/// A concrete, playable reference plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    pub origin: SourceOrigin,
    pub media: MediaRef,
}

impl ResolvedSource {
    pub fn new(origin: SourceOrigin, media: MediaRef) -> Self {
        Self { origin, media }
    }

    /// Local and in-memory sources get the short ready timeout and the
    /// one-shot format retry.
    pub fn is_local(&self) -> bool {
        self.media.is_local()
    }

    /// Handle backing this source, if any. Handles need a probe before reuse.
    pub fn handle(&self) -> Option<&LocalHandle> {
        match &self.media {
            MediaRef::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    /// Stream URLs are short-lived; everything else stays valid until its
    /// handle is invalidated.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match &self.media {
            MediaRef::Stream(url) => url.is_expired(now),
            _ => false,
        }
    }

    pub fn stream(url: StreamUrl) -> Self {
        Self::new(SourceOrigin::CloudStream, MediaRef::Stream(url))
    }

    pub fn inline(origin: SourceOrigin, audio: &EmbeddedAudio) -> Self {
        Self::new(
            origin,
            MediaRef::Inline {
                content_type: audio.content_type.clone(),
                bytes: audio.bytes.clone(),
            },
        )
    }
}

// =============================================================================
// Track
// =============================================================================

/// A library track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Option<Duration>,
    pub genre: Option<String>,
    pub sources: AudioSources,
    pub transcript: Option<Transcript>,
    /// Last successful resolution in this session. Never persisted.
    pub cached_source: Option<ResolvedSource>,
}

impl Track {
    pub fn new(id: TrackId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration: None,
            genre: None,
            sources: AudioSources::default(),
            transcript: None,
            cached_source: None,
        }
    }

    /// Build from a remote record. The local slot starts empty.
    pub fn from_record(record: RemoteTrackRecord) -> Self {
        let transcript = record.transcript.map(|text| Transcript {
            text,
            segments: Vec::new(),
        });

        Self {
            id: TrackId::new(record.id),
            title: record.title,
            artist: record.artist,
            album: record.album,
            duration: record
                .duration
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
            genre: record.genre,
            sources: AudioSources {
                local: None,
                embedded: record.has_embedded_audio.then_some(EmbeddedPayload::OnRecord),
                cloud: record.file_key.map(CloudKey::new),
            },
            transcript,
            cached_source: None,
        }
    }

    /// A copy is persisted remotely, in object storage or on the record.
    pub fn has_audio(&self) -> bool {
        self.sources.cloud.is_some() || self.sources.embedded.is_some()
    }

    /// A local copy exists but object storage has nothing yet.
    pub fn needs_cloud_upload(&self) -> bool {
        self.sources.local.is_some() && self.sources.cloud.is_none()
    }

    /// No source of any kind. Broken tracks are reported, never dropped.
    pub fn is_broken(&self) -> bool {
        self.sources.is_empty()
    }

    /// Audio exists only as a session-scoped or in-memory local copy.
    pub fn is_local_only(&self) -> bool {
        self.sources.is_local_only()
    }

    pub fn with_local(mut self, local: LocalRef) -> Self {
        self.sources.local = Some(local);
        self
    }

    pub fn with_cloud_key(mut self, key: impl Into<String>) -> Self {
        self.sources.cloud = Some(CloudKey::new(key));
        self
    }

    pub fn with_embedded(mut self, payload: EmbeddedPayload) -> Self {
        self.sources.embedded = Some(payload);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Convenience for building a self-contained local copy from raw bytes.
pub fn self_contained(content_type: impl Into<String>, bytes: Bytes) -> LocalRef {
    LocalRef::SelfContained(EmbeddedAudio {
        content_type: content_type.into(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RemoteTrackRecord {
        RemoteTrackRecord {
            id: "trk_1".to_string(),
            title: "So What".to_string(),
            artist: "Miles Davis".to_string(),
            album: "Kind of Blue".to_string(),
            duration: Some(562.0),
            genre: Some("Jazz".to_string()),
            file_key: Some("audio/trk_1.mp3".to_string()),
            has_embedded_audio: false,
            transcript: None,
        }
    }

    #[test]
    fn test_local_ids() {
        let id = TrackId::new_local();
        assert!(id.is_local());
        assert!(!TrackId::new("trk_1").is_local());
    }

    #[test]
    fn test_from_record() {
        let track = Track::from_record(record());

        assert_eq!(track.id.as_str(), "trk_1");
        assert_eq!(track.duration, Some(Duration::from_secs(562)));
        assert!(track.has_audio());
        assert!(!track.is_broken());
        assert!(track.sources.local.is_none());
    }

    #[test]
    fn test_record_without_sources_is_broken() {
        let track = Track::from_record(RemoteTrackRecord {
            file_key: None,
            duration: Some(f64::NAN),
            ..record()
        });

        assert!(track.is_broken());
        assert!(!track.has_audio());
        assert_eq!(track.duration, None);
    }

    #[test]
    fn test_candidates_priority() {
        let track = Track::new(TrackId::new("t"), "t")
            .with_embedded(EmbeddedPayload::OnRecord)
            .with_cloud_key("k")
            .with_local(LocalRef::Ephemeral(LocalHandle::new("mem:1")));

        let kinds: Vec<_> = track
            .sources
            .candidates()
            .into_iter()
            .map(|source| match source {
                AudioSource::Local(_) => "local",
                AudioSource::Cloud(_) => "cloud",
                AudioSource::Embedded(_) => "embedded",
            })
            .collect();

        assert_eq!(kinds, vec!["local", "cloud", "embedded"]);
    }

    #[test]
    fn test_local_only() {
        let track = Track::new(TrackId::new_local(), "demo")
            .with_local(LocalRef::Ephemeral(LocalHandle::new("mem:2")));
        assert!(track.is_local_only());
        assert!(!track.has_audio());

        let embedded = track.clone().with_embedded(EmbeddedPayload::OnRecord);
        assert!(embedded.has_audio());
        assert!(!embedded.is_local_only());
        assert!(embedded.needs_cloud_upload());

        let synced = track.with_cloud_key("audio/demo.mp3");
        assert!(!synced.is_local_only());
        assert!(!synced.needs_cloud_upload());
    }

    #[test]
    fn test_resolved_source_expiry() {
        let now = Utc::now();
        let stream = ResolvedSource::stream(StreamUrl {
            url: "https://cdn/x".to_string(),
            expires_at: Some(now - chrono::Duration::seconds(5)),
        });
        assert!(stream.is_expired(now));
        assert!(!stream.is_local());

        let handle = ResolvedSource::new(
            SourceOrigin::LocalHandle,
            MediaRef::Handle(LocalHandle::new("mem:3")),
        );
        assert!(!handle.is_expired(now));
        assert!(handle.is_local());
        assert!(handle.handle().is_some());
    }

    #[test]
    fn test_validate() {
        assert!(Track::new(TrackId::new("t"), "  ").validate().is_err());
        assert!(Track::new(TrackId::new("t"), "Title").validate().is_ok());
    }
}
