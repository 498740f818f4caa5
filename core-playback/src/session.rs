//! Playback session state.
//!
//! [`PlaybackSession`] is owned by the engine and mutated only by the load
//! holding the current `load_id`. Everyone else sees [`SessionSnapshot`].

use bridge_traits::OutputBinding;
use core_library::{ResolvedSource, TrackId};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Loading { load_id: u64 },
    /// Bound and ready, waiting for a user gesture to start.
    Ready,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

/// The source currently attached to the output device.
///
/// Once registered here the binding belongs to the session: whoever takes it
/// out releases it.
#[derive(Debug, Clone)]
pub struct ActiveBinding {
    pub binding: OutputBinding,
    /// Load that registered the binding.
    pub load_id: u64,
    pub track_id: TrackId,
    pub source: ResolvedSource,
}

#[derive(Debug)]
pub struct PlaybackSession {
    pub current_track: Option<TrackId>,
    pub state: PlaybackState,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub active: Option<ActiveBinding>,
    /// Track blocked by a gesture requirement, replayed on the next
    /// user-initiated play.
    pub pending_play: Option<TrackId>,
    pub last_error: Option<String>,
    retries: HashMap<TrackId, u32>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_track: None,
            state: PlaybackState::Idle,
            position: Duration::ZERO,
            duration: None,
            active: None,
            pending_play: None,
            last_error: None,
            retries: HashMap::new(),
        }
    }
}

impl PlaybackSession {
    /// Start tracking a new load. Returns the binding it displaces, which the
    /// caller must release.
    pub fn begin_load(
        &mut self,
        track_id: TrackId,
        load_id: u64,
        duration: Option<Duration>,
    ) -> Option<ActiveBinding> {
        self.current_track = Some(track_id);
        self.state = PlaybackState::Loading { load_id };
        self.position = Duration::ZERO;
        self.duration = duration;
        self.pending_play = None;
        self.last_error = None;
        self.active.take()
    }

    /// Take the active binding if `load_id` registered it.
    pub fn take_active_for(&mut self, load_id: u64) -> Option<ActiveBinding> {
        if self.active.as_ref().map(|active| active.load_id) == Some(load_id) {
            self.active.take()
        } else {
            None
        }
    }

    /// Record a local retry for `track_id`; `false` once the budget is spent.
    pub fn try_consume_retry(&mut self, track_id: &TrackId, budget: u32) -> bool {
        let used = self.retries.entry(track_id.clone()).or_insert(0);
        if *used >= budget {
            return false;
        }
        *used += 1;
        true
    }

    pub fn retries_used(&self, track_id: &TrackId) -> u32 {
        self.retries.get(track_id).copied().unwrap_or(0)
    }

    pub fn active_binding(&self) -> Option<OutputBinding> {
        self.active.as_ref().map(|active| active.binding)
    }

    pub fn snapshot(&self, load_id: u64) -> SessionSnapshot {
        SessionSnapshot {
            current_track: self.current_track.clone(),
            load_id,
            state: self.state,
            is_playing: self.state.is_playing(),
            position_ms: self.position.as_millis() as u64,
            duration_ms: self.duration.map(|d| d.as_millis() as u64),
            awaiting_gesture: self.pending_play.is_some(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Side-effect-free read projection of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub current_track: Option<TrackId>,
    pub load_id: u64,
    pub state: PlaybackState,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
    pub awaiting_gesture: bool,
    pub last_error: Option<String>,
}
