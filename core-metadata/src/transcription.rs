//! Transcription job polling.

use bridge_traits::remote::{Transcript, TranscriptionApi, TranscriptionStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{MetadataError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Status checks after the initial request before giving up.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

impl TranscriptionConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be > 0".to_string());
        }
        if self.max_polls == 0 {
            return Err("max_polls must be > 0".to_string());
        }
        Ok(())
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_polls() -> u32 {
    120
}

/// Requests a transcription and polls its status at a fixed interval until
/// it is `completed` or `failed`.
pub struct TranscriptionPoller {
    api: Arc<dyn TranscriptionApi>,
    config: TranscriptionConfig,
}

impl TranscriptionPoller {
    pub fn new(api: Arc<dyn TranscriptionApi>, config: TranscriptionConfig) -> Self {
        Self { api, config }
    }

    #[instrument(skip(self), fields(max_polls = self.config.max_polls))]
    pub async fn run(&self, track_id: &str) -> Result<Transcript> {
        let mut status = self.api.request(track_id).await?;
        let mut polls = 0;

        loop {
            match status {
                TranscriptionStatus::Completed(transcript) => {
                    info!(polls, segments = transcript.segments.len(), "Transcription completed");
                    return Ok(transcript);
                }
                TranscriptionStatus::Failed(reason) => {
                    warn!(polls, %reason, "Transcription failed");
                    return Err(MetadataError::TranscriptionFailed(reason));
                }
                TranscriptionStatus::Pending | TranscriptionStatus::Processing => {}
            }

            if polls >= self.config.max_polls {
                warn!(polls, "Transcription did not finish in time");
                return Err(MetadataError::TranscriptionTimedOut { polls });
            }

            tokio::time::sleep(self.config.poll_interval).await;
            polls += 1;
            status = self.api.status(track_id).await?;
            debug!(polls, ?status, "Transcription status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::remote::TranscriptSegment;
    use mockall::{mock, Sequence};

    mock! {
        Api {}

        #[async_trait]
        impl TranscriptionApi for Api {
            async fn request(&self, track_id: &str) -> BridgeResult<TranscriptionStatus>;
            async fn status(&self, track_id: &str) -> BridgeResult<TranscriptionStatus>;
        }
    }

    fn transcript() -> Transcript {
        Transcript {
            text: "hello world".to_string(),
            segments: vec![TranscriptSegment {
                start: 0.0,
                end: 1.5,
                text: "hello world".to_string(),
            }],
        }
    }

    fn config(max_polls: u32) -> TranscriptionConfig {
        TranscriptionConfig {
            poll_interval: Duration::from_secs(2),
            max_polls,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_completed() {
        let mut api = MockApi::new();
        let mut seq = Sequence::new();
        api.expect_request()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TranscriptionStatus::Pending));
        api.expect_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TranscriptionStatus::Processing));
        api.expect_status()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TranscriptionStatus::Completed(transcript())));

        let poller = TranscriptionPoller::new(Arc::new(api), config(10));
        let start = tokio::time::Instant::now();
        let result = poller.run("trk_1").await.unwrap();

        assert_eq!(result.text, "hello world");
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_completed_on_request() {
        let mut api = MockApi::new();
        api.expect_request()
            .returning(|_| Ok(TranscriptionStatus::Completed(transcript())));
        api.expect_status().never();

        let poller = TranscriptionPoller::new(Arc::new(api), config(10));
        assert!(poller.run("trk_1").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status() {
        let mut api = MockApi::new();
        api.expect_request()
            .returning(|_| Ok(TranscriptionStatus::Processing));
        api.expect_status()
            .returning(|_| Ok(TranscriptionStatus::Failed("no speech".to_string())));

        let poller = TranscriptionPoller::new(Arc::new(api), config(10));
        let err = poller.run("trk_1").await.unwrap_err();
        assert!(matches!(err, MetadataError::TranscriptionFailed(reason) if reason == "no speech"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_polls() {
        let mut api = MockApi::new();
        api.expect_request()
            .returning(|_| Ok(TranscriptionStatus::Pending));
        api.expect_status()
            .times(3)
            .returning(|_| Ok(TranscriptionStatus::Pending));

        let poller = TranscriptionPoller::new(Arc::new(api), config(3));
        let err = poller.run("trk_1").await.unwrap_err();
        assert!(matches!(err, MetadataError::TranscriptionTimedOut { polls: 3 }));
    }

    #[tokio::test]
    async fn test_session_expiry_propagates() {
        let mut api = MockApi::new();
        api.expect_request()
            .returning(|_| Err(BridgeError::SessionExpired));

        let poller = TranscriptionPoller::new(Arc::new(api), config(3));
        let err = poller.run("trk_1").await.unwrap_err();
        assert!(matches!(err, MetadataError::Bridge(BridgeError::SessionExpired)));
    }

    #[test]
    fn test_config_validation() {
        assert!(config(0).validate().is_err());
        assert!(TranscriptionConfig::default().validate().is_ok());
    }
}
