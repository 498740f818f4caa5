//! # Core Service
//!
//! The single object a UI layer talks to. Reads are side-effect-free
//! projections; imperative calls report through the event bus and the read
//! state, so callers never have to block on them.

use bridge_traits::{FileSource, TokenProvider, TrackStore, TranscriptionApi, UploadProxy};
use core_library::{Library, LibraryError, LibraryHealth, Track, TrackId};
use core_metadata::TranscriptionPoller;
use core_playback::{
    LoadOutcome, MediaCommandHandler, PlaybackEngine, QueueSnapshot, RepeatMode,
    SessionSnapshot, SourceResolver,
};
use core_runtime::config::{CoreConfig, FeatureFlags};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, Receiver};
use core_runtime::retry::BackoffPolicy;
use core_sync::{
    BatchOutcome, CloudSyncProgress, CloudSyncReconciler, CloudSyncReport, ImportPipeline,
    ImportQueueItem, ImportStats,
};
use provider_remote::RemoteConnector;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::ServiceConfig;
use crate::error::{CoreError, Result};
use crate::session_watch::SessionWatch;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<Inner>,
}

struct Inner {
    events: EventBus,
    library: Arc<Library>,
    store: Arc<dyn TrackStore>,
    engine: Arc<PlaybackEngine>,
    import: ImportPipeline,
    /// `None` when no upload proxy is reachable.
    reconciler: Option<CloudSyncReconciler>,
    transcriber: Option<Arc<TranscriptionPoller>>,
    features: FeatureFlags,
    library_backoff: BackoffPolicy,
}

impl CoreService {
    /// Wire every subsystem from the host bridges and component settings.
    ///
    /// Remote collaborators not injected through `config` are served by the
    /// REST connector at `config.api_base_url`. A 401 from that connector is
    /// reported to the host's token provider and published as
    /// `SessionEvent::Expired`.
    pub fn new(config: CoreConfig, service: ServiceConfig) -> Result<Self> {
        config.validate()?;
        service.validate().map_err(CoreError::InitializationFailed)?;

        let events = EventBus::new(service.event_buffer_size);

        let connector = config.api_base_url.as_ref().map(|url| {
            let tokens: Arc<dyn TokenProvider> = Arc::new(SessionWatch::new(
                Arc::clone(&config.token_provider),
                events.clone(),
            ));
            Arc::new(RemoteConnector::new(
                Arc::clone(&config.http_client),
                tokens,
                url.clone(),
            ))
        });

        let store = config
            .track_store
            .clone()
            .or_else(|| connector.clone().map(|c| c as Arc<dyn TrackStore>))
            .ok_or_else(|| {
                CoreError::InitializationFailed("no TrackStore is reachable".to_string())
            })?;
        let proxy = config
            .upload_proxy
            .clone()
            .or_else(|| connector.clone().map(|c| c as Arc<dyn UploadProxy>));
        let transcription_api = config
            .transcription_api
            .clone()
            .or_else(|| connector.clone().map(|c| c as Arc<dyn TranscriptionApi>));

        let library = Arc::new(Library::new());

        let resolver = SourceResolver::new(
            Arc::clone(&store),
            Arc::clone(&config.handle_store),
            Arc::clone(&library),
            Arc::clone(&config.clock),
            config.platform,
        );
        let engine = Arc::new(PlaybackEngine::new(
            Arc::clone(&config.audio_output),
            resolver,
            Arc::clone(&library),
            events.clone(),
            service.playback.clone(),
            config.platform,
        ));

        let import = ImportPipeline::new(
            Arc::clone(&library),
            Arc::clone(&config.handle_store),
            Arc::clone(&store),
            proxy.clone(),
            events.clone(),
            service.import.clone(),
            config.platform,
        );

        let reconciler = proxy.map(|proxy| {
            CloudSyncReconciler::new(
                Arc::clone(&library),
                Arc::clone(&config.handle_store),
                Arc::clone(&store),
                proxy,
                events.clone(),
                service.cloud_sync.clone(),
            )
        });

        let transcriber = transcription_api
            .map(|api| Arc::new(TranscriptionPoller::new(api, service.transcription.clone())));

        info!(
            platform = ?config.platform,
            cloud_sync = config.features.enable_cloud_sync && reconciler.is_some(),
            transcription = config.features.enable_transcription && transcriber.is_some(),
            "Core service initialised"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                events,
                library,
                store,
                engine,
                import,
                reconciler,
                transcriber,
                features: config.features,
                library_backoff: service.library_backoff,
            }),
        })
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn session(&self) -> SessionSnapshot {
        self.inner.engine.snapshot()
    }

    pub fn queue(&self) -> QueueSnapshot {
        self.inner.engine.queue_snapshot()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.inner.library.all()
    }

    pub fn track(&self, id: &TrackId) -> Option<Track> {
        self.inner.library.get(id)
    }

    pub fn library_health(&self) -> LibraryHealth {
        self.inner.library.health_report()
    }

    pub fn import_queue(&self) -> Vec<ImportQueueItem> {
        self.inner.import.queue().snapshot()
    }

    pub fn import_stats(&self) -> ImportStats {
        self.inner.import.queue().stats()
    }

    /// All zeros when no sync is running or cloud sync is unavailable.
    pub fn cloud_sync_progress(&self) -> CloudSyncProgress {
        self.inner
            .reconciler
            .as_ref()
            .map(CloudSyncReconciler::progress)
            .unwrap_or_default()
    }

    /// Whether `request_transcript` can do anything in this build and config.
    pub fn transcription_available(&self) -> bool {
        cfg!(feature = "transcription")
            && self.inner.features.enable_transcription
            && self.inner.transcriber.is_some()
    }

    /// Command table for OS media controls.
    pub fn media_commands(&self) -> MediaCommandHandler {
        self.inner.engine.command_handler()
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub async fn play_track(&self, track_id: TrackId) -> LoadOutcome {
        self.inner.engine.play_track(track_id).await
    }

    pub async fn play(&self) -> Result<()> {
        Ok(self.inner.engine.play().await?)
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.inner.engine.pause().await?)
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        Ok(self.inner.engine.seek(position).await?)
    }

    pub async fn stop(&self) -> Result<()> {
        Ok(self.inner.engine.stop().await?)
    }

    pub async fn next(&self) -> LoadOutcome {
        self.inner.engine.next().await
    }

    pub async fn previous(&self) -> LoadOutcome {
        self.inner.engine.previous().await
    }

    pub async fn handle_user_gesture(&self) -> Option<LoadOutcome> {
        self.inner.engine.handle_user_gesture().await
    }

    pub fn set_queue(&self, tracks: Vec<TrackId>, start: usize) {
        self.inner.engine.set_queue(tracks, start);
    }

    pub fn set_shuffle(&self, enabled: bool) {
        self.inner.engine.set_shuffle(enabled);
    }

    pub fn set_repeat(&self, repeat: RepeatMode) {
        self.inner.engine.set_repeat(repeat);
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    /// Replace the library with the remote store's records.
    #[instrument(skip(self))]
    pub async fn load_library(&self) -> Result<LibraryHealth> {
        let health = self
            .inner
            .library
            .load_from_store(self.inner.store.as_ref(), &self.inner.library_backoff)
            .await?;

        self.emit(LibraryEvent::Loaded {
            track_count: health.total,
        });
        if !health.broken.is_empty() {
            self.emit(LibraryEvent::BrokenTracksDetected {
                track_ids: health.broken.iter().map(ToString::to_string).collect(),
            });
        }

        Ok(health)
    }

    /// Delete the remote record, then drop the track from the queue and the
    /// library. Tracks without a remote record are only dropped locally.
    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn delete_track(&self, track_id: &TrackId) -> Result<()> {
        if !self.inner.library.contains(track_id) {
            return Err(CoreError::TrackNotFound(track_id.to_string()));
        }

        if !track_id.is_local() {
            self.inner.store.delete_track(track_id.as_str()).await?;
        }

        self.inner.engine.forget_track(track_id).await?;
        self.inner.library.remove(track_id);
        info!("Track deleted");

        self.emit(LibraryEvent::TrackRemoved {
            track_id: track_id.to_string(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Import and cloud sync
    // ------------------------------------------------------------------

    /// Import a batch of dropped files.
    ///
    /// With transcription available, every track that got a remote record is
    /// queued for a transcript in the background.
    pub async fn import_files(&self, files: Vec<Arc<dyn FileSource>>) -> BatchOutcome {
        let outcome = self.inner.import.import_files(files).await;

        if self.transcription_available() {
            for track_id in outcome.track_ids.iter().filter(|id| !id.is_local()) {
                if let Err(err) = self.request_transcript(track_id) {
                    debug!(%track_id, error = %err, "Transcript not requested");
                }
            }
        }

        outcome
    }

    /// Upload every track that only exists on this device.
    pub async fn sync_local_tracks_to_cloud(&self) -> Result<CloudSyncReport> {
        if !self.inner.features.enable_cloud_sync {
            return Err(CoreError::FeatureDisabled("cloud sync"));
        }
        let reconciler = self
            .inner
            .reconciler
            .as_ref()
            .ok_or(CoreError::FeatureDisabled("cloud sync without an upload proxy"))?;

        Ok(reconciler.sync_local_only().await?)
    }

    // ------------------------------------------------------------------
    // Transcription
    // ------------------------------------------------------------------

    /// Start a background transcription for `track_id`.
    ///
    /// Returns once the job is spawned. The result lands on the track and as
    /// `TrackUpdated { change: "transcript" }`, or as `TranscriptFailed`.
    pub fn request_transcript(&self, track_id: &TrackId) -> Result<()> {
        if !self.transcription_available() {
            return Err(CoreError::FeatureDisabled("transcription"));
        }
        if !self.inner.library.contains(track_id) {
            return Err(CoreError::TrackNotFound(track_id.to_string()));
        }
        if track_id.is_local() {
            return Err(LibraryError::InvalidInput {
                field: "track_id".to_string(),
                message: "track has no remote record yet".to_string(),
            }
            .into());
        }

        self.spawn_transcription(track_id.clone());
        Ok(())
    }

    #[cfg(feature = "transcription")]
    fn spawn_transcription(&self, track_id: TrackId) {
        if let Some(poller) = &self.inner.transcriber {
            crate::transcription::spawn(
                Arc::clone(poller),
                Arc::clone(&self.inner.library),
                Arc::clone(&self.inner.store),
                self.inner.events.clone(),
                track_id,
            );
        }
    }

    #[cfg(not(feature = "transcription"))]
    fn spawn_transcription(&self, _track_id: TrackId) {}

    fn emit(&self, event: LibraryEvent) {
        let _ = self.inner.events.emit(CoreEvent::Library(event));
    }
}
