//! # Events
//!
//! Everything the core reports without being asked travels as a
//! [`CoreEvent`] over a `tokio::sync::broadcast` channel. UI collaborators
//! subscribe and render; imperative calls never make them wait.
//!
//! Emitters ignore the send result: an event with nobody listening is
//! dropped. A subscriber that falls more than the buffer size behind gets
//! `RecvError::Lagged` and keeps receiving from the oldest retained event.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::default();
//! let mut ui = bus.subscribe();
//!
//! let _ = bus.emit(CoreEvent::Session(SessionEvent::Expired));
//! assert_eq!(ui.recv().await.ok(), Some(CoreEvent::Session(SessionEvent::Expired)));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Library(LibraryEvent),
    Import(ImportEvent),
    CloudSync(CloudSyncEvent),
    Playback(PlaybackEvent),
    Session(SessionEvent),
}

/// Aggregate result of a batch (import or cloud sync).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    /// Nothing to do.
    Empty,
    AllSucceeded,
    Partial,
    AllFailed,
}

impl OutcomeStatus {
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (0, 0) => OutcomeStatus::Empty,
            (_, 0) => OutcomeStatus::AllSucceeded,
            (0, _) => OutcomeStatus::AllFailed,
            _ => OutcomeStatus::Partial,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Library replaced from the remote store.
    Loaded { track_count: usize },
    /// Tracks committed by the import pipeline (one event per commit batch).
    TracksAdded { track_ids: Vec<String> },
    TrackUpdated {
        track_id: String,
        /// What changed (e.g. "file_key", "transcript").
        change: String,
    },
    TrackRemoved { track_id: String },
    /// Tracks with no audio source at all. They stay in the library until the
    /// user cleans them up.
    BrokenTracksDetected { track_ids: Vec<String> },
    TranscriptFailed { track_id: String, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ImportEvent {
    BatchStarted {
        batch_id: String,
        accepted: usize,
        /// Files dropped by the audio allow-list, reported once.
        rejected: usize,
    },
    ItemProgress {
        batch_id: String,
        file_name: String,
        status: String,
        progress: u8,
    },
    BatchFinished {
        batch_id: String,
        status: OutcomeStatus,
        completed: usize,
        failed: usize,
        /// Completed items that could not reach the cloud.
        local_only: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CloudSyncEvent {
    Started { total: usize },
    TrackSynced { track_id: String },
    TrackFailed {
        track_id: String,
        reason: String,
        /// The local copy is gone; only a re-import can recover it.
        lost_to_session_expiry: bool,
    },
    Finished {
        status: OutcomeStatus,
        synced: usize,
        failed: usize,
        lost_to_session_expiry: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    Loading { track_id: String, load_id: u64 },
    Playing { track_id: String },
    Paused { track_id: String, position_ms: u64 },
    Stopped { track_id: Option<String> },
    /// Playback is blocked until the next user-initiated play.
    AwaitingGesture { track_id: String },
    /// A newer load took over before this one finished.
    Superseded { track_id: String, load_id: u64 },
    Failed {
        track_id: String,
        message: String,
        /// Suggested user action ("re-import", "try again").
        remediation: String,
    },
    QueueEnded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The remote store answered 401.
    Expired,
}

/// Broadcast hub. Every clone is another producer handle on the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is the per-subscriber backlog before `Lagged`.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Number of subscribers reached; `Err` when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Receives events emitted from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
