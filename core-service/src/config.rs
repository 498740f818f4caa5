//! Component settings the façade hands to each subsystem.
//!
//! Bridges and platform facts live in [`CoreConfig`](core_runtime::config::CoreConfig);
//! everything here is plain tunables with serde defaults, so a host can load
//! it from JSON and override single fields.

use core_metadata::TranscriptionConfig;
use core_playback::PlaybackConfig;
use core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE;
use core_runtime::retry::BackoffPolicy;
use core_sync::{CloudSyncConfig, ImportConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub cloud_sync: CloudSyncConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Backoff for `GET tracks` when loading the library.
    #[serde(default)]
    pub library_backoff: BackoffPolicy,

    /// Capacity of the event bus ring buffer. Slow subscribers past this
    /// many events start lagging.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            import: ImportConfig::default(),
            cloud_sync: CloudSyncConfig::default(),
            transcription: TranscriptionConfig::default(),
            library_backoff: BackoffPolicy::default(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

impl ServiceConfig {
    /// Validate every section, prefixing the failing one.
    pub fn validate(&self) -> Result<(), String> {
        self.playback
            .validate()
            .map_err(|e| format!("playback: {}", e))?;
        self.import.validate().map_err(|e| format!("import: {}", e))?;
        self.cloud_sync
            .validate()
            .map_err(|e| format!("cloud_sync: {}", e))?;
        self.transcription
            .validate()
            .map_err(|e| format!("transcription: {}", e))?;
        self.library_backoff
            .validate()
            .map_err(|e| format!("library_backoff: {}", e))?;
        if self.event_buffer_size == 0 {
            return Err("event_buffer_size must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{ "event_buffer_size": 32 }"#).unwrap();

        assert_eq!(config.event_buffer_size, 32);
        assert_eq!(config.import, ImportConfig::default());
        assert_eq!(config.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_validate_names_failing_section() {
        let config = ServiceConfig {
            library_backoff: BackoffPolicy::new(0, std::time::Duration::ZERO),
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.starts_with("library_backoff:"));
    }
}
