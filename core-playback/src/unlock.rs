//! Audio unlock handshake for gesture-gated platforms.
//!
//! The first user gesture runs a one-shot routine: resume the suspended
//! processing graph, then play and stop a near-silent buffer. A play request
//! that arrives before the routine finishes is parked and handed back exactly
//! once when it completes.

use bridge_traits::{error::Result, AudioOutput};
use core_library::TrackId;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockState {
    Locked,
    Unlocking,
    Unlocked,
}

pub struct AudioUnlock {
    output: Arc<dyn AudioOutput>,
    state: Mutex<UnlockState>,
    pending: Mutex<Option<TrackId>>,
}

impl AudioUnlock {
    pub fn new(output: Arc<dyn AudioOutput>, requires_gesture: bool) -> Self {
        let state = if requires_gesture {
            UnlockState::Locked
        } else {
            UnlockState::Unlocked
        };

        Self {
            output,
            state: Mutex::new(state),
            pending: Mutex::new(None),
        }
    }

    pub fn state(&self) -> UnlockState {
        *self.state.lock()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == UnlockState::Unlocked
    }

    /// Park a play request until unlock completes. The latest request wins.
    pub fn defer(&self, track_id: TrackId) {
        debug!(%track_id, "Deferring play until audio is unlocked");
        *self.pending.lock() = Some(track_id);
    }

    /// Run the unlock routine if it has not run yet.
    ///
    /// Returns the parked play request, if any. Concurrent and repeated calls
    /// return `None`, so the request is replayed exactly once.
    pub async fn unlock(&self) -> Result<Option<TrackId>> {
        {
            let mut state = self.state.lock();
            if *state != UnlockState::Locked {
                return Ok(None);
            }
            *state = UnlockState::Unlocking;
        }

        if let Err(err) = self.run_handshake().await {
            warn!(error = %err, "Audio unlock failed");
            *self.state.lock() = UnlockState::Locked;
            return Err(err);
        }

        *self.state.lock() = UnlockState::Unlocked;
        let pending = self.pending.lock().take();
        info!(replay = pending.is_some(), "Audio unlocked");
        Ok(pending)
    }

    async fn run_handshake(&self) -> Result<()> {
        self.output.resume_processing().await?;
        self.output.prime_silence().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{MediaRef, OutputBinding, OutputFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct PrimingOutput {
        primed: AtomicU32,
    }

    #[async_trait]
    impl AudioOutput for PrimingOutput {
        async fn bind(&self, _media: MediaRef) -> Result<OutputBinding> {
            Ok(OutputBinding(1))
        }
        async fn wait_ready(&self, _binding: OutputBinding) -> Result<()> {
            Ok(())
        }
        async fn play(&self, _binding: OutputBinding) -> std::result::Result<(), OutputFailure> {
            Ok(())
        }
        async fn pause(&self, _binding: OutputBinding) -> Result<()> {
            Ok(())
        }
        async fn seek(&self, _binding: OutputBinding, _position: Duration) -> Result<()> {
            Ok(())
        }
        async fn position(&self, _binding: OutputBinding) -> Result<Duration> {
            Ok(Duration::ZERO)
        }
        async fn release(&self, _binding: OutputBinding) -> Result<()> {
            Ok(())
        }
        async fn prime_silence(&self) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.primed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_play_replayed_exactly_once() {
        let output = Arc::new(PrimingOutput::default());
        let unlock = AudioUnlock::new(output.clone(), true);
        assert!(!unlock.is_unlocked());

        let (first, second) = tokio::join!(unlock.unlock(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            unlock.defer(TrackId::new("song"));
            unlock.unlock().await
        });

        assert_eq!(first.unwrap(), Some(TrackId::new("song")));
        assert_eq!(second.unwrap(), None);
        assert_eq!(unlock.unlock().await.unwrap(), None);
        assert_eq!(output.primed.load(Ordering::SeqCst), 1);
        assert!(unlock.is_unlocked());
    }

    #[tokio::test]
    async fn test_no_gesture_platform_starts_unlocked() {
        let output = Arc::new(PrimingOutput::default());
        let unlock = AudioUnlock::new(output.clone(), false);

        assert!(unlock.is_unlocked());
        assert_eq!(unlock.unlock().await.unwrap(), None);
        assert_eq!(output.primed.load(Ordering::SeqCst), 0);
    }
}
