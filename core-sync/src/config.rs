//! Import and cloud sync settings.

use core_metadata::ExtractorConfig;
use core_runtime::retry::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Import pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Files filtered per scan chunk before yielding.
    #[serde(default = "default_scan_chunk_size")]
    pub scan_chunk_size: usize,

    /// Files processed at once on capable devices.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Files processed at once on constrained devices and for large batches.
    #[serde(default = "default_constrained_concurrency")]
    pub constrained_concurrency: usize,

    /// Batches larger than this use `constrained_concurrency`.
    #[serde(default = "default_large_batch_threshold")]
    pub large_batch_threshold: usize,

    #[serde(default)]
    pub metadata: ExtractorConfig,

    /// Largest file (bytes) embedded in the record when the proxy upload fails.
    #[serde(default = "default_embed_size_ceiling")]
    pub embed_size_ceiling: u64,

    /// Tracks flushed into the library per commit.
    #[serde(default = "default_commit_batch_size")]
    pub commit_batch_size: usize,

    /// How long a finished batch stays visible in the import queue.
    #[serde(default = "default_display_hold")]
    pub display_hold: Duration,

    #[serde(default = "default_audio_mime_types")]
    pub audio_mime_types: Vec<String>,

    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            scan_chunk_size: default_scan_chunk_size(),
            max_concurrency: default_max_concurrency(),
            constrained_concurrency: default_constrained_concurrency(),
            large_batch_threshold: default_large_batch_threshold(),
            metadata: ExtractorConfig::default(),
            embed_size_ceiling: default_embed_size_ceiling(),
            commit_batch_size: default_commit_batch_size(),
            display_hold: default_display_hold(),
            audio_mime_types: default_audio_mime_types(),
            audio_extensions: default_audio_extensions(),
        }
    }
}

impl ImportConfig {
    /// Concurrency cap for a batch of `batch_len` files.
    pub fn concurrency_for(&self, batch_len: usize, constrained_device: bool) -> usize {
        if constrained_device || batch_len > self.large_batch_threshold {
            self.constrained_concurrency
        } else {
            self.max_concurrency
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.scan_chunk_size == 0 {
            return Err("scan_chunk_size must be > 0".to_string());
        }
        if self.max_concurrency == 0 || self.constrained_concurrency == 0 {
            return Err("concurrency caps must be > 0".to_string());
        }
        if self.commit_batch_size == 0 {
            return Err("commit_batch_size must be > 0".to_string());
        }
        if self.audio_mime_types.is_empty() && self.audio_extensions.is_empty() {
            return Err("at least one audio MIME type or extension is required".to_string());
        }
        self.metadata.validate()
    }
}

fn default_scan_chunk_size() -> usize {
    50
}

fn default_max_concurrency() -> usize {
    2
}

fn default_constrained_concurrency() -> usize {
    1
}

fn default_large_batch_threshold() -> usize {
    100
}

fn default_embed_size_ceiling() -> u64 {
    8 * 1024 * 1024 // 8 MB
}

fn default_commit_batch_size() -> usize {
    5
}

fn default_display_hold() -> Duration {
    Duration::from_secs(3)
}

fn default_audio_mime_types() -> Vec<String> {
    [
        "audio/mpeg",
        "audio/mp3",
        "audio/mp4",
        "audio/x-m4a",
        "audio/aac",
        "audio/flac",
        "audio/x-flac",
        "audio/ogg",
        "audio/opus",
        "audio/wav",
        "audio/x-wav",
        "audio/webm",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_audio_extensions() -> Vec<String> {
    ["mp3", "m4a", "aac", "flac", "ogg", "oga", "opus", "wav", "webm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Cloud sync reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSyncConfig {
    /// Backoff for the idempotent `PUT track/{id}` file key update.
    #[serde(default = "default_record_backoff")]
    pub record_backoff: BackoffPolicy,
}

impl Default for CloudSyncConfig {
    fn default() -> Self {
        Self {
            record_backoff: default_record_backoff(),
        }
    }
}

impl CloudSyncConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.record_backoff.validate()
    }
}

fn default_record_backoff() -> BackoffPolicy {
    BackoffPolicy::new(3, Duration::from_millis(500))
}
