//! # Import Pipeline
//!
//! Moves a batch of user-selected files into the library.
//!
//! ## Workflow
//!
//! 1. Scan the batch against the audio allow-list in chunks ([`crate::scan`])
//! 2. Process each file under a concurrency cap:
//!    - read the bytes (unreadable or empty files fail)
//!    - extract metadata, falling back to the file name
//!    - acquire a local handle right away so the track plays even if nothing
//!      reaches the cloud
//!    - run the upload fallback chain ([`crate::upload`])
//!    - create the remote record; on failure keep a `local-…` id
//! 3. Commit produced tracks to the library in small batches
//! 4. Emit one aggregate [`ImportEvent::BatchFinished`]
//!
//! A failing file never aborts the batch. Its error is kept on its
//! [`ImportQueueItem`](crate::import_queue::ImportQueueItem) and in the
//! returned [`BatchOutcome`].

use bridge_traits::{FileSource, LocalHandleStore, NewTrackRecord, TrackStore, UploadProxy};
use core_library::models::self_contained;
use core_library::{CloudKey, EmbeddedPayload, Library, LocalRef, Track, TrackId};
use core_metadata::MetadataExtractor;
use core_runtime::config::PlatformProfile;
use core_runtime::events::{CoreEvent, EventBus, ImportEvent, LibraryEvent, OutcomeStatus};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::error::{Result, SyncError};
use crate::import_queue::{ImportItemId, ImportQueue, ImportStatus};
use crate::scan::{scan, ScanResult};
use crate::upload::{UploadChain, UploadOutcome};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Per-file diagnostic kept for failed items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub file_name: String,
    pub error: String,
}

/// Aggregate result of one import batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub status: OutcomeStatus,
    /// Files that passed the scan.
    pub accepted: usize,
    /// Files dropped by the allow-list.
    pub rejected: usize,
    pub completed: usize,
    pub failed: usize,
    /// Completed tracks that only exist on this device.
    pub local_only: usize,
    /// Committed tracks in commit order.
    pub track_ids: Vec<TrackId>,
    pub errors: Vec<ItemError>,
}

impl BatchOutcome {
    fn new(batch_id: String, accepted: usize, rejected: usize) -> Self {
        Self {
            batch_id,
            status: OutcomeStatus::Empty,
            accepted,
            rejected,
            completed: 0,
            failed: 0,
            local_only: 0,
            track_ids: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// One user-facing line for the whole batch.
    pub fn message(&self) -> String {
        let mut message = match self.status {
            OutcomeStatus::Empty => "No audio files to import".to_string(),
            OutcomeStatus::AllSucceeded => format!("Imported {} tracks", self.completed),
            OutcomeStatus::Partial => format!(
                "Imported {} of {} tracks, {} failed",
                self.completed, self.accepted, self.failed
            ),
            OutcomeStatus::AllFailed => format!("Import failed for all {} files", self.failed),
        };
        if self.local_only > 0 {
            message.push_str(&format!(
                " ({} saved on this device only, sync them to the cloud later)",
                self.local_only
            ));
        }
        if self.rejected > 0 {
            message.push_str(&format!(" ({} non-audio files skipped)", self.rejected));
        }
        message
    }
}

/// A processed file ready to be committed.
#[derive(Debug)]
struct ImportedTrack {
    track: Track,
    local_only: bool,
}

pub struct ImportPipeline {
    library: Arc<Library>,
    handles: Arc<dyn LocalHandleStore>,
    store: Arc<dyn TrackStore>,
    uploads: UploadChain,
    extractor: MetadataExtractor,
    queue: Arc<ImportQueue>,
    events: EventBus,
    config: ImportConfig,
    platform: PlatformProfile,
}

impl ImportPipeline {
    pub fn new(
        library: Arc<Library>,
        handles: Arc<dyn LocalHandleStore>,
        store: Arc<dyn TrackStore>,
        proxy: Option<Arc<dyn UploadProxy>>,
        events: EventBus,
        config: ImportConfig,
        platform: PlatformProfile,
    ) -> Self {
        Self {
            library,
            handles,
            store,
            uploads: UploadChain::new(proxy, config.embed_size_ceiling),
            extractor: MetadataExtractor::with_config(config.metadata.clone()),
            queue: Arc::new(ImportQueue::new()),
            events,
            config,
            platform,
        }
    }

    /// Observable per-file status.
    pub fn queue(&self) -> Arc<ImportQueue> {
        Arc::clone(&self.queue)
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import `files` and report one aggregate outcome.
    ///
    /// Never fails as a whole: per-file errors are counted in the outcome.
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn import_files(&self, files: Vec<Arc<dyn FileSource>>) -> BatchOutcome {
        let ScanResult { accepted, rejected } = scan(files, &self.config).await;

        let batch_id = Uuid::new_v4().to_string();
        let item_ids = self
            .queue
            .enqueue_batch(&batch_id, accepted.iter().map(|file| file.name()));
        let mut outcome = BatchOutcome::new(batch_id.clone(), accepted.len(), rejected);

        let _ = self.events.emit(CoreEvent::Import(ImportEvent::BatchStarted {
            batch_id: batch_id.clone(),
            accepted: accepted.len(),
            rejected,
        }));

        let concurrency = self
            .config
            .concurrency_for(accepted.len(), self.platform.constrained_device);
        info!(%batch_id, accepted = accepted.len(), rejected, concurrency, "Import started");

        let this = self;
        let batch = batch_id.as_str();
        let mut results = stream::iter(accepted.into_iter().zip(item_ids))
            .map(move |(file, item_id)| async move {
                let result = this.process_file(batch, item_id, file.as_ref()).await;
                (item_id, file.name().to_string(), result)
            })
            .buffer_unordered(concurrency);

        let mut pending = Vec::with_capacity(self.config.commit_batch_size);
        while let Some((item_id, file_name, result)) = results.next().await {
            match result {
                Ok(imported) => {
                    self.queue
                        .complete(item_id, imported.track.id.clone(), imported.local_only);
                    self.emit_progress(&batch_id, &file_name, ImportStatus::Completed, 100);

                    outcome.completed += 1;
                    if imported.local_only {
                        outcome.local_only += 1;
                    }
                    pending.push(imported.track);
                    if pending.len() >= self.config.commit_batch_size {
                        self.commit(&mut pending, &mut outcome);
                    }
                }
                Err(err) => {
                    warn!(%batch_id, file = %file_name, error = %err, "Import item failed");
                    self.queue.fail(item_id, err.to_string());
                    self.emit_progress(&batch_id, &file_name, ImportStatus::Failed, 100);

                    outcome.failed += 1;
                    outcome.errors.push(ItemError {
                        file_name,
                        error: err.to_string(),
                    });
                }
            }
        }
        drop(results);
        self.commit(&mut pending, &mut outcome);

        outcome.status = OutcomeStatus::from_counts(outcome.completed, outcome.failed);
        info!(
            %batch_id,
            status = ?outcome.status,
            completed = outcome.completed,
            failed = outcome.failed,
            local_only = outcome.local_only,
            "Import finished"
        );
        let _ = self.events.emit(CoreEvent::Import(ImportEvent::BatchFinished {
            batch_id: batch_id.clone(),
            status: outcome.status,
            completed: outcome.completed,
            failed: outcome.failed,
            local_only: outcome.local_only,
        }));

        self.schedule_clear(batch_id);
        outcome
    }

    async fn process_file(
        &self,
        batch_id: &str,
        item_id: ImportItemId,
        file: &dyn FileSource,
    ) -> Result<ImportedTrack> {
        let file_name = file.name();
        self.report(batch_id, item_id, file_name, ImportStatus::Processing, 5);

        let bytes = file.read().await.map_err(|err| SyncError::Unreadable {
            file_name: file_name.to_string(),
            reason: err.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(SyncError::EmptyFile(file_name.to_string()));
        }

        let metadata = self
            .extractor
            .extract_or_fallback(bytes.clone(), file_name)
            .await;
        self.report(batch_id, item_id, file_name, ImportStatus::Processing, 30);

        let content_type = metadata
            .mime_type
            .clone()
            .or_else(|| MetadataExtractor::sniff_mime_type(&bytes).map(str::to_string))
            .or_else(|| file.mime_type().map(str::to_string))
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        let local = match self.handles.create(bytes.clone(), &content_type).await {
            Ok(handle) => LocalRef::Ephemeral(handle),
            Err(err) => {
                warn!(file = %file_name, error = %err, "No local handle, keeping bytes in memory");
                self_contained(content_type.clone(), bytes.clone())
            }
        };
        self.report(batch_id, item_id, file_name, ImportStatus::Uploading, 40);

        let upload = self.uploads.upload(bytes, file_name, &content_type).await;
        debug!(file = %file_name, tier = upload.tier(), "Upload chain finished");
        self.report(batch_id, item_id, file_name, ImportStatus::Uploading, 80);

        let (file_key, embedded) = match upload {
            UploadOutcome::Stored { file_key } => (Some(file_key), None),
            UploadOutcome::Embed(audio) => (None, Some(audio)),
            UploadOutcome::LocalOnly { reason } => {
                info!(file = %file_name, %reason, "Keeping track on this device only");
                (None, None)
            }
        };

        let record = NewTrackRecord {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            duration: metadata.duration.map(|d| d.as_secs_f64()),
            genre: metadata.genre.clone(),
            file_key: file_key.clone(),
            embedded_audio: embedded.clone(),
        };

        let mut track = match self.store.create_track(&record).await {
            Ok(created) => {
                let mut track = Track::new(TrackId::new(created.id), metadata.title);
                track.sources.embedded = embedded.map(EmbeddedPayload::Loaded);
                track
            }
            Err(err) => {
                warn!(file = %file_name, error = %err, "Creating the track record failed, keeping a local id");
                Track::new(TrackId::new_local(), metadata.title)
            }
        };
        track.artist = metadata.artist;
        track.album = metadata.album;
        track.duration = metadata.duration;
        track.genre = metadata.genre;
        track.sources.cloud = file_key.map(CloudKey::new);
        track.sources.local = Some(local);

        let local_only = track.id.is_local() || !track.has_audio();
        Ok(ImportedTrack { track, local_only })
    }

    fn commit(&self, pending: &mut Vec<Track>, outcome: &mut BatchOutcome) {
        if pending.is_empty() {
            return;
        }

        let ids = self.library.add_batch(std::mem::take(pending));
        debug!(count = ids.len(), "Committed tracks to library");
        let _ = self.events.emit(CoreEvent::Library(LibraryEvent::TracksAdded {
            track_ids: ids.iter().map(|id| id.to_string()).collect(),
        }));
        outcome.track_ids.extend(ids);
    }

    fn report(
        &self,
        batch_id: &str,
        item_id: ImportItemId,
        file_name: &str,
        status: ImportStatus,
        progress: u8,
    ) {
        self.queue.advance(item_id, status, progress);
        self.emit_progress(batch_id, file_name, status, progress);
    }

    fn emit_progress(&self, batch_id: &str, file_name: &str, status: ImportStatus, progress: u8) {
        let _ = self.events.emit(CoreEvent::Import(ImportEvent::ItemProgress {
            batch_id: batch_id.to_string(),
            file_name: file_name.to_string(),
            status: status.to_string(),
            progress,
        }));
    }

    /// Drop the batch from the observable queue after the display hold.
    fn schedule_clear(&self, batch_id: String) {
        let queue = Arc::clone(&self.queue);
        let hold = self.config.display_hold;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            let removed = queue.clear_batch(&batch_id);
            debug!(%batch_id, removed, "Cleared finished import batch");
        });
    }
}
