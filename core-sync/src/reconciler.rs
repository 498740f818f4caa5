//! # Cloud Sync Reconciler
//!
//! Uploads tracks that have a local copy but nothing in object storage.
//!
//! Tracks are processed strictly one at a time. For each one the local bytes
//! are re-materialised, uploaded through the proxy, and the remote record is
//! updated with the new file key. Only a confirmed record update gives the
//! in-memory track its cloud key.
//!
//! A session-scoped handle that no longer resolves is reported as *lost to
//! session expiry*, not as a generic failure: retrying cannot help, the user
//! has to re-import the file.

use bridge_traits::{BridgeError, LocalHandleStore, NewTrackRecord, TrackStore, UploadProxy};
use bytes::Bytes;
use core_library::{CloudKey, EmbeddedPayload, Library, LocalRef, Track, TrackId};
use core_metadata::MetadataExtractor;
use core_runtime::events::{CloudSyncEvent, CoreEvent, EventBus, LibraryEvent, OutcomeStatus};
use core_runtime::retry::retry_with_backoff;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::CloudSyncConfig;
use crate::error::{Result, SyncError};

/// Live counters of the running job. Reset when a run finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CloudSyncProgress {
    pub running: bool,
    pub total: usize,
    pub synced: usize,
    pub failed: usize,
    pub current_track_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub track_id: TrackId,
    pub title: String,
    pub reason: String,
    pub lost_to_session_expiry: bool,
}

/// Result of one reconciler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudSyncReport {
    pub status: OutcomeStatus,
    pub synced: usize,
    /// Every failure, including those lost to session expiry.
    pub failed: usize,
    pub lost_to_session_expiry: usize,
    pub failures: Vec<SyncFailure>,
}

impl CloudSyncReport {
    fn new() -> Self {
        Self {
            status: OutcomeStatus::Empty,
            synced: 0,
            failed: 0,
            lost_to_session_expiry: 0,
            failures: Vec::new(),
        }
    }

    pub fn message(&self) -> String {
        let mut message = match self.status {
            OutcomeStatus::Empty => return "Everything is already in the cloud".to_string(),
            OutcomeStatus::AllSucceeded => format!("Synced {} tracks to the cloud", self.synced),
            OutcomeStatus::Partial => {
                format!("Synced {} tracks, {} failed", self.synced, self.failed)
            }
            OutcomeStatus::AllFailed => format!("Could not sync {} tracks", self.failed),
        };
        if self.lost_to_session_expiry > 0 {
            message.push_str(&format!(
                ". {} must be re-imported, their local audio is gone",
                self.lost_to_session_expiry
            ));
        }
        let retryable = self.failed - self.lost_to_session_expiry;
        if retryable > 0 {
            message.push_str(&format!(". Try again later for {}", retryable));
        }
        message
    }
}

pub struct CloudSyncReconciler {
    library: Arc<Library>,
    handles: Arc<dyn LocalHandleStore>,
    store: Arc<dyn TrackStore>,
    proxy: Arc<dyn UploadProxy>,
    events: EventBus,
    config: CloudSyncConfig,
    progress: RwLock<CloudSyncProgress>,
    running: AtomicBool,
}

/// Clears the running flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CloudSyncReconciler {
    pub fn new(
        library: Arc<Library>,
        handles: Arc<dyn LocalHandleStore>,
        store: Arc<dyn TrackStore>,
        proxy: Arc<dyn UploadProxy>,
        events: EventBus,
        config: CloudSyncConfig,
    ) -> Self {
        Self {
            library,
            handles,
            store,
            proxy,
            events,
            config,
            progress: RwLock::new(CloudSyncProgress::default()),
            running: AtomicBool::new(false),
        }
    }

    pub fn progress(&self) -> CloudSyncProgress {
        self.progress.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Upload every track that still lacks a cloud copy.
    ///
    /// # Errors
    ///
    /// Only [`SyncError::SyncInProgress`]. Per-track failures land in the
    /// report.
    #[instrument(skip(self))]
    pub async fn sync_local_only(&self) -> Result<CloudSyncReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SyncInProgress);
        }
        let _guard = RunGuard(&self.running);

        let candidates = self.library.pending_cloud_upload();

        *self.progress.write() = CloudSyncProgress {
            running: true,
            total: candidates.len(),
            ..Default::default()
        };
        let _ = self.events.emit(CoreEvent::CloudSync(CloudSyncEvent::Started {
            total: candidates.len(),
        }));
        info!(total = candidates.len(), "Cloud sync started");

        let mut report = CloudSyncReport::new();
        for track in candidates {
            self.progress.write().current_track_title = Some(track.title.clone());

            match self.sync_track(&track).await {
                Ok(track_id) => {
                    debug!(%track_id, "Track synced");
                    report.synced += 1;
                    self.progress.write().synced += 1;
                    let _ = self.events.emit(CoreEvent::CloudSync(CloudSyncEvent::TrackSynced {
                        track_id: track_id.to_string(),
                    }));
                    let _ = self.events.emit(CoreEvent::Library(LibraryEvent::TrackUpdated {
                        track_id: track_id.to_string(),
                        change: "file_key".to_string(),
                    }));
                }
                Err(err) => {
                    let lost = err.is_lost_to_session_expiry();
                    warn!(track_id = %track.id, lost_to_session_expiry = lost, error = %err, "Track sync failed");

                    report.failed += 1;
                    if lost {
                        report.lost_to_session_expiry += 1;
                    }
                    self.progress.write().failed += 1;
                    let _ = self.events.emit(CoreEvent::CloudSync(CloudSyncEvent::TrackFailed {
                        track_id: track.id.to_string(),
                        reason: err.to_string(),
                        lost_to_session_expiry: lost,
                    }));
                    report.failures.push(SyncFailure {
                        track_id: track.id.clone(),
                        title: track.title.clone(),
                        reason: err.to_string(),
                        lost_to_session_expiry: lost,
                    });
                }
            }
        }

        report.status = OutcomeStatus::from_counts(report.synced, report.failed);
        info!(
            status = ?report.status,
            synced = report.synced,
            failed = report.failed,
            lost_to_session_expiry = report.lost_to_session_expiry,
            "Cloud sync finished"
        );
        let _ = self.events.emit(CoreEvent::CloudSync(CloudSyncEvent::Finished {
            status: report.status,
            synced: report.synced,
            failed: report.failed,
            lost_to_session_expiry: report.lost_to_session_expiry,
        }));

        *self.progress.write() = CloudSyncProgress::default();
        Ok(report)
    }

    /// Returns the track's id after the sync, which changes for `local-…`
    /// tracks once their record exists.
    async fn sync_track(&self, track: &Track) -> Result<TrackId> {
        let file_key = match &track.sources.cloud {
            Some(key) => key.as_str().to_string(),
            None => {
                let (bytes, content_type) = self.materialize(track).await?;
                let file_name = upload_file_name(&track.title, &content_type);
                self.proxy
                    .upload(bytes, &file_name, &content_type)
                    .await
                    .map_err(|err| match err {
                        BridgeError::SessionExpired => SyncError::Bridge(err),
                        other => SyncError::Upload(other.to_string()),
                    })?
            }
        };

        if track.id.is_local() {
            return self.create_record(track, file_key).await;
        }

        retry_with_backoff(
            &self.config.record_backoff,
            "update file key",
            BridgeError::is_transient,
            |_| self.store.update_file_key(track.id.as_str(), &file_key),
        )
        .await?;

        self.library.update(&track.id, |stored| {
            stored.sources.cloud = Some(CloudKey::new(file_key.clone()));
        });
        Ok(track.id.clone())
    }

    async fn create_record(&self, track: &Track, file_key: String) -> Result<TrackId> {
        let record = NewTrackRecord {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            duration: track.duration.map(|d| d.as_secs_f64()),
            genre: track.genre.clone(),
            file_key: Some(file_key.clone()),
            embedded_audio: None,
        };
        let created = self.store.create_track(&record).await?;

        let new_id = TrackId::new(created.id);
        self.library.rekey(&track.id, new_id.clone())?;
        self.library.update(&new_id, |stored| {
            stored.sources.cloud = Some(CloudKey::new(file_key));
        });
        info!(old_id = %track.id, new_id = %new_id, "Created record for local track");
        Ok(new_id)
    }

    /// Raw bytes and content type of the track's local copy.
    async fn materialize(&self, track: &Track) -> Result<(Bytes, String)> {
        let lost = || SyncError::LostToSessionExpiry {
            track_id: track.id.to_string(),
        };

        match &track.sources.local {
            Some(LocalRef::SelfContained(audio)) => {
                Ok((audio.bytes.clone(), audio.content_type.clone()))
            }
            Some(LocalRef::Ephemeral(handle)) => match self.handles.read(handle).await {
                Ok(bytes) if bytes.is_empty() => Err(lost()),
                Ok(bytes) => {
                    let content_type = MetadataExtractor::sniff_mime_type(&bytes)
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    Ok((bytes, content_type))
                }
                Err(BridgeError::HandleExpired(_)) => Err(lost()),
                Err(err) => Err(err.into()),
            },
            None => match &track.sources.embedded {
                Some(EmbeddedPayload::Loaded(audio)) => {
                    Ok((audio.bytes.clone(), audio.content_type.clone()))
                }
                _ => Err(lost()),
            },
        }
    }
}

fn upload_file_name(title: &str, content_type: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.trim_matches('_').is_empty() {
        "track".to_string()
    } else {
        stem
    };

    let extension = match content_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/aac" => "aac",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        "audio/wav" | "audio/x-wav" => "wav",
        _ => "bin",
    };
    format!("{}.{}", stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_name() {
        assert_eq!(upload_file_name("So What", "audio/mpeg"), "So_What.mp3");
        assert_eq!(upload_file_name("???", "audio/flac"), "track.flac");
        assert_eq!(upload_file_name("demo", "text/plain"), "demo.bin");
    }

    #[test]
    fn test_report_message_separates_lost_tracks() {
        let report = CloudSyncReport {
            status: OutcomeStatus::Partial,
            synced: 2,
            failed: 3,
            lost_to_session_expiry: 2,
            failures: Vec::new(),
        };

        let message = report.message();
        assert!(message.contains("2 must be re-imported"));
        assert!(message.contains("Try again later for 1"));
    }
}
