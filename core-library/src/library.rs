//! In-memory track cache.
//!
//! The remote store is the system of record; [`Library`] holds the session's
//! view of it plus everything the store cannot know about: ephemeral local
//! handles, lazily fetched embedded payloads and resolved-source caches.

use bridge_traits::{error::BridgeError, remote::TrackStore};
use core_runtime::retry::{retry_with_backoff, BackoffPolicy};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

use crate::error::{LibraryError, Result};
use crate::models::{EmbeddedPayload, Track, TrackId};

/// Summary of playability across the library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryHealth {
    pub total: usize,
    pub playable: usize,
    pub local_only: usize,
    /// Tracks with no source at all. Surfaced for cleanup, never dropped.
    pub broken: Vec<TrackId>,
}

#[derive(Default)]
struct Inner {
    tracks: HashMap<TrackId, Track>,
    order: Vec<TrackId>,
}

impl Inner {
    fn insert(&mut self, track: Track) {
        if !self.tracks.contains_key(&track.id) {
            self.order.push(track.id.clone());
        }
        self.tracks.insert(track.id.clone(), track);
    }
}

/// Ordered, shared track cache.
#[derive(Default)]
pub struct Library {
    inner: RwLock<Inner>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.inner.read().tracks.contains_key(id)
    }

    pub fn get(&self, id: &TrackId) -> Option<Track> {
        self.inner.read().tracks.get(id).cloned()
    }

    /// All tracks in insertion order.
    pub fn all(&self) -> Vec<Track> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tracks.get(id).cloned())
            .collect()
    }

    /// Insert or replace a batch under a single write lock. Returns the ids
    /// in batch order.
    pub fn add_batch(&self, tracks: Vec<Track>) -> Vec<TrackId> {
        let mut inner = self.inner.write();
        tracks
            .into_iter()
            .map(|track| {
                let id = track.id.clone();
                inner.insert(track);
                id
            })
            .collect()
    }

    /// Mutate one track in place and return the updated copy.
    pub fn update<F>(&self, id: &TrackId, f: F) -> Option<Track>
    where
        F: FnOnce(&mut Track),
    {
        let mut inner = self.inner.write();
        let track = inner.tracks.get_mut(id)?;
        f(track);
        Some(track.clone())
    }

    pub fn remove(&self, id: &TrackId) -> Option<Track> {
        let mut inner = self.inner.write();
        let removed = inner.tracks.remove(id)?;
        inner.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn replace_all(&self, tracks: Vec<Track>) {
        let mut inner = self.inner.write();
        inner.tracks.clear();
        inner.order.clear();
        for track in tracks {
            inner.insert(track);
        }
    }

    /// Move a track to a new id, keeping its position. Used once a
    /// `local-…` track gets its remote record.
    pub fn rekey(&self, old: &TrackId, new: TrackId) -> Result<Track> {
        let mut inner = self.inner.write();
        if inner.tracks.contains_key(&new) {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: format!("track {} already exists", new),
            });
        }

        let mut track = inner
            .tracks
            .remove(old)
            .ok_or_else(|| LibraryError::NotFound { id: old.to_string() })?;

        track.id = new.clone();
        if let Some(slot) = inner.order.iter_mut().find(|id| *id == old) {
            *slot = new.clone();
        }
        inner.tracks.insert(new, track.clone());
        Ok(track)
    }

    /// Tracks whose only copy is local.
    pub fn local_only_tracks(&self) -> Vec<Track> {
        self.all()
            .into_iter()
            .filter(|track| track.is_local_only())
            .collect()
    }

    /// Tracks the cloud sync has work for, in library order: a local copy
    /// without an object-storage copy, or no remote record yet.
    pub fn pending_cloud_upload(&self) -> Vec<Track> {
        self.all()
            .into_iter()
            .filter(|track| track.needs_cloud_upload() || track.id.is_local())
            .collect()
    }

    pub fn broken_tracks(&self) -> Vec<TrackId> {
        self.all()
            .into_iter()
            .filter(|track| track.is_broken())
            .map(|track| track.id)
            .collect()
    }

    pub fn health_report(&self) -> LibraryHealth {
        let inner = self.inner.read();
        let mut health = LibraryHealth {
            total: inner.order.len(),
            ..Default::default()
        };

        for track in inner.order.iter().filter_map(|id| inner.tracks.get(id)) {
            if track.is_broken() {
                health.broken.push(track.id.clone());
            } else {
                health.playable += 1;
            }
            if track.is_local_only() {
                health.local_only += 1;
            }
        }

        health
    }

    /// Replace the cache with `GET tracks`.
    ///
    /// Session-scoped state the store does not know about is carried over:
    /// local copies, loaded embedded payloads and resolved-source caches of
    /// tracks that still exist, plus every `local-…` track. Ephemeral handles
    /// are kept as-is and probed at first resolution.
    #[instrument(skip_all)]
    pub async fn load_from_store(
        &self,
        store: &dyn TrackStore,
        policy: &BackoffPolicy,
    ) -> Result<LibraryHealth> {
        let records = retry_with_backoff(
            policy,
            "list tracks",
            |err: &BridgeError| err.is_transient(),
            |_| store.list_tracks(),
        )
        .await?;

        debug!(count = records.len(), "Fetched track records");

        let (mut previous, previous_order) = {
            let inner = self.inner.read();
            (inner.tracks.clone(), inner.order.clone())
        };

        let mut seen = HashSet::with_capacity(records.len());
        let mut loaded = Vec::with_capacity(records.len());

        for record in records {
            let mut track = Track::from_record(record);
            if !seen.insert(track.id.clone()) {
                warn!(track_id = %track.id, "Duplicate track record ignored");
                continue;
            }
            if let Err(reason) = track.validate() {
                warn!(track_id = %track.id, %reason, "Track record failed validation");
            }

            if let Some(existing) = previous.remove(&track.id) {
                track.sources.local = existing.sources.local;
                let loaded_payload = matches!(
                    existing.sources.embedded,
                    Some(EmbeddedPayload::Loaded(_))
                );
                if track.sources.embedded.is_some() && loaded_payload {
                    track.sources.embedded = existing.sources.embedded;
                }
                track.cached_source = existing.cached_source;
                if track.transcript.is_none() {
                    track.transcript = existing.transcript;
                }
            }
            loaded.push(track);
        }

        let pending_local: Vec<Track> = previous_order
            .iter()
            .filter(|id| id.is_local())
            .filter_map(|id| previous.remove(id))
            .collect();

        if !pending_local.is_empty() {
            debug!(count = pending_local.len(), "Keeping tracks without remote record");
        }
        loaded.extend(pending_local);

        self.replace_all(loaded);

        let health = self.health_report();
        info!(
            total = health.total,
            playable = health.playable,
            local_only = health.local_only,
            broken = health.broken.len(),
            "Library loaded"
        );
        if !health.broken.is_empty() {
            warn!(count = health.broken.len(), "Library contains tracks without audio");
        }

        Ok(health)
    }
}
