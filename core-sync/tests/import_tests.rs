mod common;

use bridge_desktop::{BytesFileSource, MemoryHandleStore};
use bridge_traits::FileSource;
use common::{junk_audio, FakeProxy, FakeStore, UnreadableFile};
use core_library::{Library, LocalRef};
use core_runtime::config::PlatformProfile;
use core_runtime::events::{CoreEvent, EventBus, ImportEvent, LibraryEvent, OutcomeStatus};
use core_sync::{ImportConfig, ImportPipeline, ImportStatus};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    library: Arc<Library>,
    store: Arc<FakeStore>,
    proxy: Arc<FakeProxy>,
    events: EventBus,
    pipeline: ImportPipeline,
}

fn harness(
    store: FakeStore,
    proxy: FakeProxy,
    config: ImportConfig,
    platform: PlatformProfile,
) -> Harness {
    let library = Arc::new(Library::new());
    let store = Arc::new(store);
    let proxy = Arc::new(proxy);
    let events = EventBus::new(1024);
    let pipeline = ImportPipeline::new(
        library.clone(),
        Arc::new(MemoryHandleStore::new()),
        store.clone(),
        Some(proxy.clone()),
        events.clone(),
        config,
        platform,
    );

    Harness {
        library,
        store,
        proxy,
        events,
        pipeline,
    }
}

fn audio_file(name: &str, len: usize) -> Arc<dyn FileSource> {
    Arc::new(BytesFileSource::new(name, junk_audio(len)))
}

fn drain(receiver: &mut core_runtime::events::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_corrupted_files_fail_without_aborting_batch() {
    let h = harness(
        FakeStore::default(),
        FakeProxy::default(),
        ImportConfig::default(),
        PlatformProfile::desktop(),
    );
    let files: Vec<Arc<dyn FileSource>> = vec![
        audio_file("one.mp3", 64),
        Arc::new(UnreadableFile {
            name: "broken.mp3".to_string(),
        }),
        audio_file("two.flac", 64),
        audio_file("empty.mp3", 0),
        audio_file("three.ogg", 64),
        audio_file("cover.jpg", 64),
    ];

    let outcome = h.pipeline.import_files(files).await;

    assert_eq!(outcome.accepted, 5);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(outcome.completed, 3);
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.status, OutcomeStatus::Partial);
    assert_eq!(h.library.len(), 3);
    assert_eq!(outcome.track_ids.len(), 3);

    let mut failed: Vec<_> = outcome.errors.iter().map(|e| e.file_name.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["broken.mp3", "empty.mp3"]);

    let stats = h.pipeline.queue().stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 2);
    let broken = h
        .pipeline
        .queue()
        .snapshot()
        .into_iter()
        .find(|item| item.file_name == "broken.mp3")
        .unwrap();
    assert_eq!(broken.status, ImportStatus::Failed);
    assert!(broken.error.unwrap().contains("corrupted file"));
}

#[tokio::test]
async fn test_proxy_failure_embeds_small_files_and_keeps_large_ones_local() {
    let config = ImportConfig {
        embed_size_ceiling: 100,
        ..Default::default()
    };
    let h = harness(
        FakeStore::default(),
        FakeProxy::failing(),
        config,
        PlatformProfile::mobile_browser(),
    );
    let files = vec![
        audio_file("first.mp3", 50),
        audio_file("second.mp3", 500),
        audio_file("third.mp3", 50),
    ];

    let outcome = h.pipeline.import_files(files).await;

    assert_eq!(outcome.completed, 3);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.local_only, 1);
    assert_eq!(outcome.status, OutcomeStatus::AllSucceeded);

    let tracks = h.library.all();
    let by_title = |title: &str| tracks.iter().find(|t| t.title == title).unwrap().clone();

    let first = by_title("first");
    let second = by_title("second");
    let third = by_title("third");
    assert!(first.has_audio());
    assert!(third.has_audio());
    assert!(!second.has_audio());
    assert!(second.is_local_only());

    // Every track stays playable from its local handle.
    for track in [&first, &second, &third] {
        assert!(matches!(track.sources.local, Some(LocalRef::Ephemeral(_))));
    }

    let created = h.store.created.lock();
    assert_eq!(created.len(), 3);
    let second_record = created.iter().find(|r| r.title == "second").unwrap();
    assert!(second_record.embedded_audio.is_none());
    assert!(second_record.file_key.is_none());
}

#[tokio::test]
async fn test_proxy_success_sets_cloud_key() {
    let h = harness(
        FakeStore::default(),
        FakeProxy::default(),
        ImportConfig::default(),
        PlatformProfile::desktop(),
    );

    let outcome = h.pipeline.import_files(vec![audio_file("So What.mp3", 64)]).await;

    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.local_only, 0);
    let track = h.library.get(&outcome.track_ids[0]).unwrap();
    assert_eq!(track.id.as_str(), "trk-1");
    assert_eq!(track.title, "So What");
    assert_eq!(track.artist, "Unknown Artist");
    assert_eq!(
        track.sources.cloud.as_ref().map(|k| k.as_str()),
        Some("audio/So What.mp3")
    );
    assert_eq!(h.proxy.uploads.lock().len(), 1);
}

#[tokio::test]
async fn test_record_failure_keeps_local_id() {
    let h = harness(
        FakeStore::failing_create(),
        FakeProxy::default(),
        ImportConfig::default(),
        PlatformProfile::desktop(),
    );

    let outcome = h.pipeline.import_files(vec![audio_file("demo.mp3", 64)]).await;

    assert_eq!(outcome.completed, 1);
    assert_eq!(outcome.local_only, 1);
    let track = h.library.get(&outcome.track_ids[0]).unwrap();
    assert!(track.id.is_local());
    assert!(track.sources.local.is_some());
}

#[tokio::test]
async fn test_tracks_are_committed_in_batches() {
    let config = ImportConfig {
        commit_batch_size: 2,
        ..Default::default()
    };
    let h = harness(
        FakeStore::default(),
        FakeProxy::default(),
        config,
        PlatformProfile::desktop(),
    );
    let mut receiver = h.events.subscribe();
    let files = (0..5)
        .map(|i| audio_file(&format!("track-{i}.mp3"), 32))
        .collect();

    h.pipeline.import_files(files).await;

    let events = drain(&mut receiver);
    let commit_sizes: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Library(LibraryEvent::TracksAdded { track_ids }) => Some(track_ids.len()),
            _ => None,
        })
        .collect();
    assert_eq!(commit_sizes, vec![2, 2, 1]);

    let finished: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, CoreEvent::Import(ImportEvent::BatchFinished { .. })))
        .collect();
    assert_eq!(finished.len(), 1);
    assert!(matches!(
        finished[0],
        CoreEvent::Import(ImportEvent::BatchFinished {
            completed: 5,
            failed: 0,
            ..
        })
    ));
}

#[tokio::test]
async fn test_concurrency_is_capped_on_constrained_devices() {
    let files = || {
        (0..4)
            .map(|i| audio_file(&format!("t{i}.mp3"), 32))
            .collect::<Vec<_>>()
    };

    // Long enough for both desktop workers to overlap inside the proxy.
    let desktop = harness(
        FakeStore::default(),
        FakeProxy::with_latency(Duration::from_millis(200)),
        ImportConfig::default(),
        PlatformProfile::desktop(),
    );
    desktop.pipeline.import_files(files()).await;
    assert_eq!(desktop.proxy.max_in_flight(), 2);

    let mobile = harness(
        FakeStore::default(),
        FakeProxy::with_latency(Duration::from_millis(20)),
        ImportConfig::default(),
        PlatformProfile::mobile_browser(),
    );
    mobile.pipeline.import_files(files()).await;
    assert_eq!(mobile.proxy.max_in_flight(), 1);
}

#[tokio::test]
async fn test_finished_batch_leaves_queue_after_display_hold() {
    let config = ImportConfig {
        display_hold: Duration::from_millis(50),
        ..Default::default()
    };
    let h = harness(
        FakeStore::default(),
        FakeProxy::default(),
        config,
        PlatformProfile::desktop(),
    );

    let outcome = h.pipeline.import_files(vec![audio_file("a.mp3", 16)]).await;
    assert_eq!(outcome.completed, 1);
    assert_eq!(h.pipeline.queue().snapshot().len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.pipeline.queue().is_empty());
}

#[tokio::test]
async fn test_empty_batch_reports_empty_outcome() {
    let h = harness(
        FakeStore::default(),
        FakeProxy::default(),
        ImportConfig::default(),
        PlatformProfile::desktop(),
    );

    let outcome = h.pipeline.import_files(vec![audio_file("notes.txt", 8)]).await;

    assert_eq!(outcome.status, OutcomeStatus::Empty);
    assert_eq!(outcome.rejected, 1);
    assert!(h.library.is_empty());
    assert!(outcome.message().contains("1 non-audio files skipped"));
}
