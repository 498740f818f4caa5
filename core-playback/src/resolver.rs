//! # Source Resolver
//!
//! Turns a [`Track`] into exactly one playable [`ResolvedSource`].
//!
//! Candidates are tried in priority order:
//!
//! 1. Local copy. Self-contained payloads are trusted unconditionally;
//!    ephemeral handles are probed and skipped when dead. The track itself is
//!    not modified, so a later attempt can still fall through to the cloud.
//! 2. Cloud key. A short-lived stream URL is requested. When the platform
//!    cannot stream inline reliably, the object is downloaded into a fresh
//!    local handle instead.
//! 3. Embedded payload, fetched lazily from the remote store and kept on the
//!    in-memory track.
//!
//! A successful resolution is written back to the track's `cached_source`,
//! making the next resolution of the same track free.

use bridge_traits::{
    error::BridgeError,
    remote::TrackStore,
    storage::LocalHandleStore,
    time::Clock,
    MediaRef,
};
use core_library::{
    AudioSource, CloudKey, EmbeddedPayload, Library, LocalRef, ResolvedSource, SourceOrigin,
    Track,
};
use core_runtime::config::PlatformProfile;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::UnavailableReason;

/// Default MIME type for downloaded objects without better information.
const DOWNLOAD_MIME_TYPE: &str = "audio/mpeg";

pub struct SourceResolver {
    store: Arc<dyn TrackStore>,
    handles: Arc<dyn LocalHandleStore>,
    library: Arc<Library>,
    clock: Arc<dyn Clock>,
    platform: PlatformProfile,
}

/// What went wrong with the candidates that were tried.
#[derive(Default)]
struct Misses {
    dead_handle: bool,
    fetch_error: Option<String>,
    session_expired: bool,
}

impl Misses {
    fn record(&mut self, err: &BridgeError) {
        if err.is_session_expired() {
            self.session_expired = true;
        } else {
            self.fetch_error = Some(err.to_string());
        }
    }

    fn into_reason(self) -> UnavailableReason {
        if self.session_expired {
            UnavailableReason::SessionExpired
        } else if let Some(message) = self.fetch_error {
            UnavailableReason::FetchFailed(message)
        } else if self.dead_handle {
            UnavailableReason::LostToSessionExpiry
        } else {
            UnavailableReason::NeverUploaded
        }
    }
}

impl SourceResolver {
    pub fn new(
        store: Arc<dyn TrackStore>,
        handles: Arc<dyn LocalHandleStore>,
        library: Arc<Library>,
        clock: Arc<dyn Clock>,
        platform: PlatformProfile,
    ) -> Self {
        Self {
            store,
            handles,
            library,
            clock,
            platform,
        }
    }

    /// Resolve `track` to a playable source. Never panics and never returns
    /// anything but a source or a reason.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn resolve(&self, track: &Track) -> Result<ResolvedSource, UnavailableReason> {
        if let Some(cached) = self.reuse_cached(track).await {
            debug!(origin = ?cached.origin, "Reusing resolved source");
            return Ok(cached);
        }

        let mut misses = Misses::default();

        for candidate in track.sources.candidates() {
            let resolved = match candidate {
                AudioSource::Local(local) => self.try_local(&local, &mut misses).await,
                AudioSource::Cloud(key) => self.try_cloud(track, &key, &mut misses).await,
                AudioSource::Embedded(payload) => {
                    self.try_embedded(track, payload, &mut misses).await
                }
            };

            if let Some(resolved) = resolved {
                debug!(origin = ?resolved.origin, "Source resolved");
                self.library.update(&track.id, |t| {
                    t.cached_source = Some(resolved.clone());
                });
                return Ok(resolved);
            }
        }

        let reason = misses.into_reason();
        warn!(%reason, "No playable source");
        Err(reason)
    }

    /// The cached source, if it is still usable.
    async fn reuse_cached(&self, track: &Track) -> Option<ResolvedSource> {
        let cached = track.cached_source.as_ref()?;

        let usable = if cached.is_expired(self.clock.now()) {
            debug!("Cached stream URL expired");
            false
        } else if let Some(handle) = cached.handle() {
            self.handles.probe(handle).await
        } else {
            true
        };

        if usable {
            return Some(cached.clone());
        }

        self.library.update(&track.id, |t| t.cached_source = None);
        None
    }

    async fn try_local(&self, local: &LocalRef, misses: &mut Misses) -> Option<ResolvedSource> {
        match local {
            LocalRef::SelfContained(audio) => {
                Some(ResolvedSource::inline(SourceOrigin::SelfContained, audio))
            }
            LocalRef::Ephemeral(handle) => {
                if self.handles.probe(handle).await {
                    Some(ResolvedSource::new(
                        SourceOrigin::LocalHandle,
                        MediaRef::Handle(handle.clone()),
                    ))
                } else {
                    debug!(%handle, "Local handle no longer resolves, falling through");
                    misses.dead_handle = true;
                    None
                }
            }
        }
    }

    async fn try_cloud(
        &self,
        track: &Track,
        key: &CloudKey,
        misses: &mut Misses,
    ) -> Option<ResolvedSource> {
        let url = match self.store.stream_url(track.id.as_str()).await {
            Ok(url) => url,
            Err(err) => {
                warn!(%key, error = %err, "Failed to get stream URL");
                misses.record(&err);
                return None;
            }
        };

        if self.platform.inline_streaming_reliable {
            return Some(ResolvedSource::stream(url));
        }

        let bytes = match self.store.download(&url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%key, error = %err, "Failed to download cloud object");
                misses.record(&err);
                return None;
            }
        };

        match self.handles.create(bytes, DOWNLOAD_MIME_TYPE).await {
            Ok(handle) => Some(ResolvedSource::new(
                SourceOrigin::CloudDownload,
                MediaRef::Handle(handle),
            )),
            Err(err) => {
                warn!(%key, error = %err, "Failed to materialize downloaded audio");
                misses.record(&err);
                None
            }
        }
    }

    async fn try_embedded(
        &self,
        track: &Track,
        payload: EmbeddedPayload,
        misses: &mut Misses,
    ) -> Option<ResolvedSource> {
        let audio = match payload {
            EmbeddedPayload::Loaded(audio) => audio,
            EmbeddedPayload::OnRecord => match self.store.fetch_audio(track.id.as_str()).await {
                Ok(audio) => {
                    self.library.update(&track.id, |t| {
                        t.sources.embedded = Some(EmbeddedPayload::Loaded(audio.clone()));
                    });
                    audio
                }
                Err(err) => {
                    warn!(error = %err, "Failed to fetch embedded audio");
                    misses.record(&err);
                    return None;
                }
            },
        };

        Some(ResolvedSource::inline(SourceOrigin::Embedded, &audio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        error::Result as BridgeResult,
        remote::{EmbeddedAudio, NewTrackRecord, RemoteTrackRecord, StreamUrl, TrackAnalysis},
        storage::LocalHandle,
        time::SystemClock,
    };
    use bytes::Bytes;
    use core_library::TrackId;
    use mockall::mock;
    use std::collections::HashSet;
    use parking_lot::Mutex;

    mock! {
        Store {}

        #[async_trait]
        impl TrackStore for Store {
            async fn list_tracks(&self) -> BridgeResult<Vec<RemoteTrackRecord>>;
            async fn create_track(&self, record: &NewTrackRecord) -> BridgeResult<RemoteTrackRecord>;
            async fn update_file_key(&self, track_id: &str, file_key: &str) -> BridgeResult<()>;
            async fn update_analysis(&self, track_id: &str, analysis: &TrackAnalysis) -> BridgeResult<()>;
            async fn stream_url(&self, track_id: &str) -> BridgeResult<StreamUrl>;
            async fn fetch_audio(&self, track_id: &str) -> BridgeResult<EmbeddedAudio>;
            async fn download(&self, url: &StreamUrl) -> BridgeResult<Bytes>;
            async fn delete_track(&self, track_id: &str) -> BridgeResult<()>;
        }
    }

    #[derive(Default)]
    struct FakeHandles {
        alive: Mutex<HashSet<String>>,
    }

    impl FakeHandles {
        fn with_alive(ids: &[&str]) -> Self {
            Self {
                alive: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
            }
        }
    }

    #[async_trait]
    impl LocalHandleStore for FakeHandles {
        async fn create(&self, _bytes: Bytes, _mime_type: &str) -> BridgeResult<LocalHandle> {
            let id = format!("mem:{}", self.alive.lock().len());
            self.alive.lock().insert(id.clone());
            Ok(LocalHandle::new(id))
        }

        async fn probe(&self, handle: &LocalHandle) -> bool {
            self.alive.lock().contains(handle.as_str())
        }

        async fn read(&self, handle: &LocalHandle) -> BridgeResult<Bytes> {
            if self.alive.lock().contains(handle.as_str()) {
                Ok(Bytes::from_static(b"audio"))
            } else {
                Err(BridgeError::HandleExpired(handle.to_string()))
            }
        }
    }

    fn stream_url() -> StreamUrl {
        StreamUrl {
            url: "https://cdn.example.com/a.mp3".to_string(),
            expires_at: None,
        }
    }

    fn resolver(
        store: MockStore,
        handles: FakeHandles,
        platform: PlatformProfile,
    ) -> (SourceResolver, Arc<Library>) {
        let library = Arc::new(Library::new());
        let resolver = SourceResolver::new(
            Arc::new(store),
            Arc::new(handles),
            Arc::clone(&library),
            Arc::new(SystemClock),
            platform,
        );
        (resolver, library)
    }

    fn add(library: &Library, track: Track) -> TrackId {
        let id = track.id.clone();
        library.add_batch(vec![track]);
        id
    }

    #[tokio::test]
    async fn test_live_handle_wins() {
        let mut store = MockStore::new();
        store.expect_stream_url().never();
        let (resolver, library) = resolver(
            store,
            FakeHandles::with_alive(&["mem:live"]),
            PlatformProfile::desktop(),
        );
        let id = add(
            &library,
            Track::new(TrackId::new("t1"), "T1")
                .with_local(LocalRef::Ephemeral(LocalHandle::new("mem:live")))
                .with_cloud_key("k"),
        );

        let source = resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        assert_eq!(source.origin, SourceOrigin::LocalHandle);
    }

    #[tokio::test]
    async fn test_dead_handle_falls_through_to_cloud_without_mutating_track() {
        let mut store = MockStore::new();
        store
            .expect_stream_url()
            .times(1)
            .returning(|_| Ok(stream_url()));
        let (resolver, library) = resolver(store, FakeHandles::default(), PlatformProfile::desktop());
        let id = add(
            &library,
            Track::new(TrackId::new("t1"), "T1")
                .with_local(LocalRef::Ephemeral(LocalHandle::new("mem:dead")))
                .with_cloud_key("k"),
        );

        let source = resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        assert_eq!(source.origin, SourceOrigin::CloudStream);
        assert!(library.get(&id).unwrap().sources.local.is_some());
    }

    #[tokio::test]
    async fn test_cached_source_needs_no_second_network_call() {
        let mut store = MockStore::new();
        store
            .expect_stream_url()
            .times(1)
            .returning(|_| Ok(stream_url()));
        let (resolver, library) = resolver(store, FakeHandles::default(), PlatformProfile::desktop());
        let id = add(&library, Track::new(TrackId::new("t1"), "T1").with_cloud_key("k"));

        let first = resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        let second = resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_stream_url_is_refreshed() {
        let mut store = MockStore::new();
        store.expect_stream_url().times(2).returning(|_| {
            Ok(StreamUrl {
                url: "https://cdn.example.com/a.mp3".to_string(),
                expires_at: Some(chrono::Utc::now() - chrono::Duration::seconds(1)),
            })
        });
        let (resolver, library) = resolver(store, FakeHandles::default(), PlatformProfile::desktop());
        let id = add(&library, Track::new(TrackId::new("t1"), "T1").with_cloud_key("k"));

        resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreliable_streaming_downloads_into_handle() {
        let mut store = MockStore::new();
        store
            .expect_stream_url()
            .times(1)
            .returning(|_| Ok(stream_url()));
        store
            .expect_download()
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"full object")));
        let (resolver, library) = resolver(
            store,
            FakeHandles::default(),
            PlatformProfile::mobile_browser(),
        );
        let id = add(&library, Track::new(TrackId::new("t1"), "T1").with_cloud_key("k"));

        let source = resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        assert_eq!(source.origin, SourceOrigin::CloudDownload);
        assert!(source.is_local());
    }

    #[tokio::test]
    async fn test_embedded_payload_fetched_once() {
        let mut store = MockStore::new();
        store.expect_fetch_audio().times(1).returning(|_| {
            Ok(EmbeddedAudio {
                content_type: "audio/mpeg".to_string(),
                bytes: Bytes::from_static(b"legacy"),
            })
        });
        let (resolver, library) = resolver(store, FakeHandles::default(), PlatformProfile::desktop());
        let id = add(
            &library,
            Track::new(TrackId::new("t1"), "T1").with_embedded(EmbeddedPayload::OnRecord),
        );

        let source = resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        assert_eq!(source.origin, SourceOrigin::Embedded);

        // Drop the cache; the payload itself stays loaded on the track.
        library.update(&id, |t| t.cached_source = None);
        let again = resolver.resolve(&library.get(&id).unwrap()).await.unwrap();
        assert_eq!(again.origin, SourceOrigin::Embedded);
    }

    #[tokio::test]
    async fn test_unavailable_reasons() {
        let mut store = MockStore::new();
        store.expect_stream_url().returning(|_| {
            Err(BridgeError::HttpStatus {
                status: 503,
                message: "unavailable".to_string(),
            })
        });
        let (resolver, library) = resolver(store, FakeHandles::default(), PlatformProfile::desktop());

        let broken = add(&library, Track::new(TrackId::new("broken"), "Broken"));
        let lost = add(
            &library,
            Track::new(TrackId::new_local(), "Lost")
                .with_local(LocalRef::Ephemeral(LocalHandle::new("mem:gone"))),
        );
        let flaky = add(&library, Track::new(TrackId::new("flaky"), "Flaky").with_cloud_key("k"));

        assert_eq!(
            resolver.resolve(&library.get(&broken).unwrap()).await,
            Err(UnavailableReason::NeverUploaded)
        );
        assert_eq!(
            resolver.resolve(&library.get(&lost).unwrap()).await,
            Err(UnavailableReason::LostToSessionExpiry)
        );
        assert!(matches!(
            resolver.resolve(&library.get(&flaky).unwrap()).await,
            Err(UnavailableReason::FetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_session_expiry_reason() {
        let mut store = MockStore::new();
        store
            .expect_stream_url()
            .returning(|_| Err(BridgeError::SessionExpired));
        let (resolver, library) = resolver(store, FakeHandles::default(), PlatformProfile::desktop());
        let id = add(&library, Track::new(TrackId::new("t1"), "T1").with_cloud_key("k"));

        assert_eq!(
            resolver.resolve(&library.get(&id).unwrap()).await,
            Err(UnavailableReason::SessionExpired)
        );
    }
}
