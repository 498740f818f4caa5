#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{
    BridgeError, EmbeddedAudio, FileSource, NewTrackRecord, RemoteTrackRecord, StreamUrl,
    TrackAnalysis, TrackStore, UploadProxy,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Remote store that keeps created records and file key updates in memory.
#[derive(Default)]
pub struct FakeStore {
    pub created: Mutex<Vec<NewTrackRecord>>,
    pub updates: Mutex<Vec<(String, String)>>,
    pub update_attempts: AtomicUsize,
    /// Errors returned by `update_file_key` before it starts succeeding.
    pub update_failures: Mutex<VecDeque<BridgeError>>,
    pub fail_create: Mutex<bool>,
}

impl FakeStore {
    pub fn failing_create() -> Self {
        let store = Self::default();
        *store.fail_create.lock() = true;
        store
    }

    pub fn with_update_failures(failures: Vec<BridgeError>) -> Self {
        let store = Self::default();
        *store.update_failures.lock() = failures.into();
        store
    }
}

#[async_trait]
impl TrackStore for FakeStore {
    async fn list_tracks(&self) -> Result<Vec<RemoteTrackRecord>> {
        Ok(Vec::new())
    }

    async fn create_track(&self, record: &NewTrackRecord) -> Result<RemoteTrackRecord> {
        if *self.fail_create.lock() {
            return Err(BridgeError::HttpStatus {
                status: 503,
                message: "unavailable".to_string(),
            });
        }

        let mut created = self.created.lock();
        created.push(record.clone());
        Ok(RemoteTrackRecord {
            id: format!("trk-{}", created.len()),
            title: record.title.clone(),
            artist: record.artist.clone(),
            album: record.album.clone(),
            duration: record.duration,
            genre: record.genre.clone(),
            file_key: record.file_key.clone(),
            has_embedded_audio: record.embedded_audio.is_some(),
            transcript: None,
        })
    }

    async fn update_file_key(&self, track_id: &str, file_key: &str) -> Result<()> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.update_failures.lock().pop_front() {
            return Err(err);
        }
        self.updates
            .lock()
            .push((track_id.to_string(), file_key.to_string()));
        Ok(())
    }

    async fn update_analysis(&self, _track_id: &str, _analysis: &TrackAnalysis) -> Result<()> {
        Ok(())
    }

    async fn stream_url(&self, _track_id: &str) -> Result<StreamUrl> {
        Err(BridgeError::NotAvailable("stream_url".to_string()))
    }

    async fn fetch_audio(&self, _track_id: &str) -> Result<EmbeddedAudio> {
        Err(BridgeError::NotAvailable("fetch_audio".to_string()))
    }

    async fn download(&self, _url: &StreamUrl) -> Result<Bytes> {
        Err(BridgeError::NotAvailable("download".to_string()))
    }

    async fn delete_track(&self, _track_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Upload proxy that records file names and tracks how many uploads overlap.
#[derive(Default)]
pub struct FakeProxy {
    pub fail: bool,
    pub latency: Duration,
    pub uploads: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeProxy {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadProxy for FakeProxy {
    async fn upload(&self, _bytes: Bytes, filename: &str, _content_type: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(BridgeError::HttpStatus {
                status: 502,
                message: "proxy down".to_string(),
            });
        }
        self.uploads.lock().push(filename.to_string());
        Ok(format!("audio/{}", filename))
    }
}

/// A file whose read always fails.
pub struct UnreadableFile {
    pub name: String,
}

#[async_trait]
impl FileSource for UnreadableFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> Option<&str> {
        Some("audio/mpeg")
    }

    fn size(&self) -> u64 {
        1024
    }

    async fn read(&self) -> Result<Bytes> {
        Err(BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "corrupted file",
        )))
    }
}

/// `len` bytes that no container parser accepts.
pub fn junk_audio(len: usize) -> Bytes {
    Bytes::from(vec![0x5a; len])
}
