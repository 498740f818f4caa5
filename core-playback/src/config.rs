//! # Playback Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Ready-wait bound for handles and in-memory payloads.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_local_ready_timeout")]
    pub local_ready_timeout: Duration,

    /// Ready-wait bound for network streams.
    ///
    /// Default: 20 seconds.
    #[serde(default = "default_network_ready_timeout")]
    pub network_ready_timeout: Duration,

    /// Delay before the single retry of a locally sourced track that failed
    /// with a format or transient output error.
    ///
    /// Default: 500 milliseconds.
    #[serde(default = "default_format_retry_delay")]
    pub format_retry_delay: Duration,

    /// Retries granted per track per session for local format/transient
    /// failures.
    ///
    /// Default: 1.
    #[serde(default = "default_max_local_retries")]
    pub max_local_retries: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            local_ready_timeout: default_local_ready_timeout(),
            network_ready_timeout: default_network_ready_timeout(),
            format_retry_delay: default_format_retry_delay(),
            max_local_retries: default_max_local_retries(),
        }
    }
}

impl PlaybackConfig {
    pub fn ready_timeout(&self, local: bool) -> Duration {
        if local {
            self.local_ready_timeout
        } else {
            self.network_ready_timeout
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.local_ready_timeout.is_zero() || self.network_ready_timeout.is_zero() {
            return Err("ready timeouts must be > 0".to_string());
        }

        if self.local_ready_timeout > self.network_ready_timeout {
            return Err("local_ready_timeout cannot exceed network_ready_timeout".to_string());
        }

        Ok(())
    }
}

fn default_local_ready_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_network_ready_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_format_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_local_retries() -> u32 {
    1
}
