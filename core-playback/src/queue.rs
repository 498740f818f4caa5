//! Play queue with repeat and shuffle.

use core_library::TrackId;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// Where the queue moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStep {
    /// Play the same track again from the start.
    Restart(TrackId),
    /// Load a different track.
    Load(TrackId),
    /// Nothing left to play.
    End,
}

/// Read projection for UI collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub tracks: Vec<TrackId>,
    pub current_index: Option<usize>,
    pub repeat: RepeatMode,
    pub shuffled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    /// Playback order. Shuffled when `shuffled` is set.
    order: Vec<TrackId>,
    /// Order as given by the caller.
    original: Vec<TrackId>,
    index: Option<usize>,
    repeat: RepeatMode,
    shuffled: bool,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue. `start` is clamped to the queue length.
    pub fn set(&mut self, tracks: Vec<TrackId>, start: usize) {
        self.index = if tracks.is_empty() {
            None
        } else {
            Some(start.min(tracks.len() - 1))
        };
        self.original = tracks.clone();
        self.order = tracks;

        if self.shuffled {
            self.shuffle_with(&mut rand::thread_rng());
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn current(&self) -> Option<&TrackId> {
        self.index.and_then(|i| self.order.get(i))
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    /// Point the queue at `id` if it is queued.
    pub fn select(&mut self, id: &TrackId) -> bool {
        match self.order.iter().position(|t| t == id) {
            Some(i) => {
                self.index = Some(i);
                true
            }
            None => false,
        }
    }

    /// The current track finished on its own.
    pub fn on_track_end(&mut self) -> QueueStep {
        match (self.repeat, self.current()) {
            (_, None) => QueueStep::End,
            (RepeatMode::One, Some(id)) => QueueStep::Restart(id.clone()),
            _ => self.step_forward(),
        }
    }

    /// User skip. Repeat-one does not pin a skip to the same track.
    pub fn next(&mut self) -> QueueStep {
        if self.current().is_none() {
            return QueueStep::End;
        }
        self.step_forward()
    }

    pub fn previous(&mut self) -> QueueStep {
        let Some(index) = self.index else {
            return QueueStep::End;
        };

        let target = match (index, self.repeat) {
            (0, RepeatMode::All) => self.order.len() - 1,
            (0, _) => 0,
            (i, _) => i - 1,
        };
        self.index = Some(target);
        QueueStep::Load(self.order[target].clone())
    }

    fn step_forward(&mut self) -> QueueStep {
        let Some(index) = self.index else {
            return QueueStep::End;
        };

        if index + 1 < self.order.len() {
            self.index = Some(index + 1);
        } else if self.repeat == RepeatMode::All {
            self.index = Some(0);
        } else {
            return QueueStep::End;
        }

        match self.current() {
            Some(id) => QueueStep::Load(id.clone()),
            None => QueueStep::End,
        }
    }

    /// Toggle shuffle. The current track keeps playing: it stays current and
    /// only the tracks around it move.
    pub fn set_shuffle(&mut self, enabled: bool) {
        self.set_shuffle_with(enabled, &mut rand::thread_rng());
    }

    pub fn set_shuffle_with<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) {
        if enabled == self.shuffled {
            return;
        }
        self.shuffled = enabled;

        if enabled {
            self.shuffle_with(rng);
        } else {
            let current = self.current().cloned();
            self.order = self.original.clone();
            self.index = current.and_then(|id| self.order.iter().position(|t| *t == id));
        }
    }

    /// Shuffle with the current track moved to the front.
    fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let current = self.current().cloned();
        let mut rest: Vec<TrackId> = self
            .original
            .iter()
            .filter(|id| Some(*id) != current.as_ref())
            .cloned()
            .collect();
        rest.shuffle(rng);

        match current {
            Some(id) => {
                self.order = std::iter::once(id).chain(rest).collect();
                self.index = Some(0);
            }
            None => self.order = rest,
        }
    }

    /// Drop `id` from the queue. Returns `true` if it was the current track.
    pub fn remove(&mut self, id: &TrackId) -> bool {
        self.original.retain(|t| t != id);
        let Some(position) = self.order.iter().position(|t| t == id) else {
            return false;
        };
        self.order.remove(position);

        let was_current = self.index == Some(position);
        self.index = match self.index {
            _ if self.order.is_empty() => None,
            Some(i) if i > position => Some(i - 1),
            Some(i) if i >= self.order.len() => Some(self.order.len() - 1),
            other => other,
        };
        was_current
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.order.clone(),
            current_index: self.index,
            repeat: self.repeat,
            shuffled: self.shuffled,
        }
    }
}
