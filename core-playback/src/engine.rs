//! # Playback Engine
//!
//! Owns the single audio output and drives
//! `Idle → Loading → Ready → Playing ⇄ Paused → Idle | Loading`.
//!
//! ## Load tokens
//!
//! Every load takes a fresh `load_id` from a monotonic counter. After each
//! suspension point (resolve, bind, ready-wait, play, retry delay) the load
//! compares its id with the counter and, if a newer load exists, releases
//! whatever output binding it created and returns
//! [`LoadOutcome::Superseded`] without touching the session. Starting a new
//! load, or `stop`, is the only way to cancel one.
//!
//! A binding registered as the session's active one is owned by the session.
//! Whatever bumps the counter takes it out and releases it, so the previous
//! track goes silent as soon as the next load starts, even if that load
//! later fails.
//!
//! ## Failure policy
//!
//! - Gesture required: the track is parked and started by the next
//!   user-initiated `play`; no automatic retry.
//! - Format or transient failure of a locally sourced track: one retry after
//!   `format_retry_delay`, then the track's retry budget is spent for the
//!   session.
//! - Anything else: surfaced as [`PlaybackEvent::Failed`], session goes idle.

use bridge_traits::{AudioOutput, OutputBinding, OutputFailure};
use core_library::{Library, ResolvedSource, TrackId};
use core_runtime::config::PlatformProfile;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::commands::MediaCommandHandler;
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::queue::{PlayQueue, QueueSnapshot, QueueStep, RepeatMode};
use crate::resolver::SourceResolver;
use crate::session::{ActiveBinding, PlaybackSession, PlaybackState, SessionSnapshot};
use crate::unlock::{AudioUnlock, UnlockState};

/// How a load (or restart) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Playing,
    /// Parked until the next user-initiated play.
    AwaitingGesture,
    /// A newer load took over; nothing was changed.
    Superseded,
    /// Nothing left in the queue.
    QueueEnded,
    Failed {
        message: String,
        remediation: String,
    },
}

enum Attempt {
    Playing,
    /// Carries a binding only if it never became the active one.
    Stale(Option<OutputBinding>),
    /// Any binding from the attempt is still the session's active one.
    Failed(PlaybackError),
}

pub struct PlaybackEngine {
    output: Arc<dyn AudioOutput>,
    resolver: SourceResolver,
    library: Arc<Library>,
    events: EventBus,
    config: PlaybackConfig,
    unlock: AudioUnlock,
    load_counter: AtomicU64,
    session: Mutex<PlaybackSession>,
    queue: Mutex<PlayQueue>,
}

impl PlaybackEngine {
    pub fn new(
        output: Arc<dyn AudioOutput>,
        resolver: SourceResolver,
        library: Arc<Library>,
        events: EventBus,
        config: PlaybackConfig,
        platform: PlatformProfile,
    ) -> Self {
        Self {
            unlock: AudioUnlock::new(Arc::clone(&output), platform.requires_user_gesture),
            output,
            resolver,
            library,
            events,
            config,
            load_counter: AtomicU64::new(0),
            session: Mutex::new(PlaybackSession::default()),
            queue: Mutex::new(PlayQueue::new()),
        }
    }

    /// The command table handed to the platform's media-control layer.
    pub fn command_handler(self: &Arc<Self>) -> MediaCommandHandler {
        MediaCommandHandler::new(Arc::clone(self))
    }

    // ------------------------------------------------------------------
    // Read projections
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        let load_id = self.current_load_id();
        self.session.lock().snapshot(load_id)
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue.lock().snapshot()
    }

    pub fn unlock_state(&self) -> UnlockState {
        self.unlock.state()
    }

    // ------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------

    pub fn set_queue(&self, tracks: Vec<TrackId>, start: usize) {
        self.queue.lock().set(tracks, start);
    }

    pub fn set_shuffle(&self, enabled: bool) {
        self.queue.lock().set_shuffle(enabled);
    }

    pub fn set_repeat(&self, repeat: RepeatMode) {
        self.queue.lock().set_repeat(repeat);
    }

    /// Drop a deleted track from the queue, stopping it if it is current.
    pub async fn forget_track(&self, track_id: &TrackId) -> Result<()> {
        self.queue.lock().remove(track_id);
        let is_current = self.session.lock().current_track.as_ref() == Some(track_id);
        if is_current {
            self.stop().await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // User-initiated calls
    // ------------------------------------------------------------------

    /// Play `track_id` now. Counts as a user gesture.
    pub async fn play_track(&self, track_id: TrackId) -> LoadOutcome {
        self.queue.lock().select(&track_id);

        match self.unlock.state() {
            UnlockState::Unlocked => self.request_load(track_id).await,
            UnlockState::Unlocking => {
                self.unlock.defer(track_id.clone());
                self.emit(PlaybackEvent::AwaitingGesture {
                    track_id: track_id.to_string(),
                });
                LoadOutcome::AwaitingGesture
            }
            UnlockState::Locked => {
                self.unlock.defer(track_id);
                self.handle_user_gesture()
                    .await
                    .unwrap_or(LoadOutcome::AwaitingGesture)
            }
        }
    }

    /// First user interaction: unlock audio and replay a parked request.
    ///
    /// Returns `None` when there was nothing to replay.
    pub async fn handle_user_gesture(&self) -> Option<LoadOutcome> {
        match self.unlock.unlock().await {
            Ok(Some(track_id)) => Some(self.request_load(track_id).await),
            Ok(None) => None,
            Err(err) => Some(LoadOutcome::Failed {
                message: err.to_string(),
                remediation: "Press play".to_string(),
            }),
        }
    }

    /// Resume, start a parked track, or load the current queue entry.
    pub async fn play(&self) -> Result<()> {
        if !self.unlock.is_unlocked() {
            let parked = self.session.lock().current_track.clone();
            if let Some(track_id) = parked.or_else(|| self.queue.lock().current().cloned()) {
                self.unlock.defer(track_id);
            }
            self.handle_user_gesture().await;
            return Ok(());
        }

        let (pending, binding, state) = {
            let mut session = self.session.lock();
            (
                session.pending_play.take(),
                session.active_binding(),
                session.state,
            )
        };

        if let Some(track_id) = pending {
            return match binding {
                Some(binding) => self.start_bound(track_id, binding).await,
                None => {
                    self.request_load(track_id).await;
                    Ok(())
                }
            };
        }

        match (state, binding) {
            (PlaybackState::Playing, _) | (PlaybackState::Loading { .. }, _) => Ok(()),
            (PlaybackState::Paused, Some(binding)) => {
                let track_id = self.current_track().ok_or(PlaybackError::NoTrackLoaded)?;
                self.start_bound(track_id, binding).await
            }
            _ => {
                let track_id = self
                    .queue
                    .lock()
                    .current()
                    .cloned()
                    .or_else(|| self.current_track())
                    .ok_or(PlaybackError::EmptyQueue)?;
                self.request_load(track_id).await;
                Ok(())
            }
        }
    }

    pub async fn pause(&self) -> Result<()> {
        let (state, binding, track_id) = {
            let session = self.session.lock();
            (
                session.state,
                session.active_binding(),
                session.current_track.clone(),
            )
        };

        if let PlaybackState::Loading { .. } = state {
            // Abandon the in-flight load; `play` reloads the same track.
            self.load_counter.fetch_add(1, Ordering::SeqCst);
            let detached = {
                let mut session = self.session.lock();
                session.state = PlaybackState::Idle;
                session.active.take()
            };
            if let Some(detached) = detached {
                self.release_output(detached.binding).await;
            }
            return Ok(());
        }

        let binding = binding.ok_or(PlaybackError::NoTrackLoaded)?;
        let track_id = track_id.ok_or(PlaybackError::NoTrackLoaded)?;

        self.output.pause(binding).await?;
        let position = self.output.position(binding).await.ok();

        let mut session = self.session.lock();
        if session.active_binding() != Some(binding) {
            return Ok(());
        }
        if let Some(position) = position {
            session.position = position;
        }
        session.state = PlaybackState::Paused;
        let position_ms = session.position.as_millis() as u64;
        drop(session);

        self.emit(PlaybackEvent::Paused {
            track_id: track_id.to_string(),
            position_ms,
        });
        Ok(())
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        let binding = self
            .session
            .lock()
            .active_binding()
            .ok_or(PlaybackError::NoTrackLoaded)?;

        self.output.seek(binding, position).await?;

        let mut session = self.session.lock();
        if session.active_binding() == Some(binding) {
            session.position = position;
        }
        Ok(())
    }

    /// Cancel any in-flight load and release the output.
    pub async fn stop(&self) -> Result<()> {
        self.load_counter.fetch_add(1, Ordering::SeqCst);

        let (active, track_id) = {
            let mut session = self.session.lock();
            session.state = PlaybackState::Idle;
            session.pending_play = None;
            session.position = Duration::ZERO;
            (session.active.take(), session.current_track.clone())
        };

        if let Some(active) = active {
            self.output.release(active.binding).await?;
        }

        self.emit(PlaybackEvent::Stopped {
            track_id: track_id.map(|id| id.to_string()),
        });
        Ok(())
    }

    pub async fn next(&self) -> LoadOutcome {
        let step = self.queue.lock().next();
        self.follow(step).await
    }

    pub async fn previous(&self) -> LoadOutcome {
        let step = self.queue.lock().previous();
        self.follow(step).await
    }

    /// The output reported the end of the current track.
    pub async fn on_track_ended(&self) -> LoadOutcome {
        let step = self.queue.lock().on_track_end();
        self.follow(step).await
    }

    /// Pull the playback position from the output into the session.
    pub async fn refresh_position(&self) -> Result<Duration> {
        let binding = self
            .session
            .lock()
            .active_binding()
            .ok_or(PlaybackError::NoTrackLoaded)?;
        let position = self.output.position(binding).await?;

        let mut session = self.session.lock();
        if session.active_binding() == Some(binding) {
            session.position = position;
        }
        Ok(position)
    }

    // ------------------------------------------------------------------
    // Load state machine
    // ------------------------------------------------------------------

    /// Load and start `track_id`, superseding any load in flight.
    #[instrument(skip(self, track_id), fields(track_id = %track_id))]
    pub async fn request_load(&self, track_id: TrackId) -> LoadOutcome {
        let load_id = self.load_counter.fetch_add(1, Ordering::SeqCst) + 1;

        let track = self.library.get(&track_id);

        let began = {
            let mut session = self.session.lock();
            (!self.is_stale(load_id)).then(|| {
                session.begin_load(
                    track_id.clone(),
                    load_id,
                    track.as_ref().and_then(|track| track.duration),
                )
            })
        };
        let Some(displaced) = began else {
            return self.supersede(load_id, &track_id, None).await;
        };
        self.emit(PlaybackEvent::Loading {
            track_id: track_id.to_string(),
            load_id,
        });
        debug!(load_id, "Load started");

        if let Some(displaced) = displaced {
            debug!(load_id, previous = %displaced.track_id, "Releasing previous track");
            self.release_output(displaced.binding).await;
            if self.is_stale(load_id) {
                return self.supersede(load_id, &track_id, None).await;
            }
        }

        let Some(track) = track else {
            return self
                .fail(load_id, &track_id, PlaybackError::TrackNotFound(track_id.to_string()))
                .await;
        };

        let resolved = self.resolver.resolve(&track).await;
        if self.is_stale(load_id) {
            return self.supersede(load_id, &track_id, None).await;
        }

        let source = match resolved {
            Ok(source) => source,
            Err(reason) => return self.fail(load_id, &track_id, reason.into()).await,
        };

        loop {
            match self.attempt(load_id, &track_id, &source).await {
                Attempt::Playing => {
                    self.session.lock().state = PlaybackState::Playing;
                    info!(load_id, origin = ?source.origin, "Playback started");
                    self.emit(PlaybackEvent::Playing {
                        track_id: track_id.to_string(),
                    });
                    return LoadOutcome::Playing;
                }
                Attempt::Stale(binding) => {
                    return self.supersede(load_id, &track_id, binding).await;
                }
                Attempt::Failed(err) if err.is_gesture_required() => {
                    return self.park_for_gesture(&track_id);
                }
                Attempt::Failed(err)
                    if source.is_local()
                        && err.is_retryable_locally()
                        && self
                            .session
                            .lock()
                            .try_consume_retry(&track_id, self.config.max_local_retries) =>
                {
                    warn!(load_id, error = %err, "Local playback failed, retrying once");
                    self.release_active(load_id).await;

                    tokio::time::sleep(self.config.format_retry_delay).await;
                    if self.is_stale(load_id) {
                        return self.supersede(load_id, &track_id, None).await;
                    }
                }
                Attempt::Failed(err) => {
                    return self.fail(load_id, &track_id, err).await;
                }
            }
        }
    }

    /// Bind, wait for ready, play. Checks the load token after every await.
    async fn attempt(
        &self,
        load_id: u64,
        track_id: &TrackId,
        source: &ResolvedSource,
    ) -> Attempt {
        let bound = self.output.bind(source.media.clone()).await;
        if self.is_stale(load_id) {
            return Attempt::Stale(bound.ok());
        }
        let binding = match bound {
            Ok(binding) => binding,
            Err(err) => return Attempt::Failed(err.into()),
        };

        {
            let mut session = self.session.lock();
            if self.is_stale(load_id) {
                return Attempt::Stale(Some(binding));
            }
            session.active = Some(ActiveBinding {
                binding,
                load_id,
                track_id: track_id.clone(),
                source: source.clone(),
            });
        }

        let timeout = self.config.ready_timeout(source.is_local());
        let ready = tokio::time::timeout(timeout, self.output.wait_ready(binding)).await;
        if self.is_stale(load_id) {
            return Attempt::Stale(None);
        }
        match ready {
            Err(_) => return Attempt::Failed(PlaybackError::ReadyTimeout(timeout)),
            Ok(Err(err)) => return Attempt::Failed(err.into()),
            Ok(Ok(())) => {}
        }

        let played = self.output.play(binding).await;
        if self.is_stale(load_id) {
            return Attempt::Stale(None);
        }
        match played {
            Ok(()) => Attempt::Playing,
            Err(failure) => Attempt::Failed(failure.into()),
        }
    }

    /// Start an already-bound source (resume, parked gesture, repeat-one).
    async fn start_bound(&self, track_id: TrackId, binding: OutputBinding) -> Result<()> {
        let load_id = self.current_load_id();
        let played = self.output.play(binding).await;
        if self.is_stale(load_id) {
            return Ok(());
        }

        match played {
            Ok(()) => {
                self.session.lock().state = PlaybackState::Playing;
                self.emit(PlaybackEvent::Playing {
                    track_id: track_id.to_string(),
                });
                Ok(())
            }
            Err(OutputFailure::GestureRequired) => {
                self.park_for_gesture(&track_id);
                Ok(())
            }
            Err(failure) => {
                self.fail(load_id, &track_id, PlaybackError::Output(failure.clone()))
                    .await;
                Err(PlaybackError::Output(failure))
            }
        }
    }

    async fn follow(&self, step: QueueStep) -> LoadOutcome {
        match step {
            QueueStep::Load(track_id) => self.request_load(track_id).await,
            QueueStep::Restart(track_id) => self.restart(track_id).await,
            QueueStep::End => {
                if let Err(err) = self.stop().await {
                    warn!(error = %err, "Failed to release output at queue end");
                }
                self.emit(PlaybackEvent::QueueEnded);
                LoadOutcome::QueueEnded
            }
        }
    }

    /// Repeat-one: seek the bound source back to zero. The resolver is not
    /// consulted again.
    async fn restart(&self, track_id: TrackId) -> LoadOutcome {
        let binding = {
            let session = self.session.lock();
            session
                .active
                .as_ref()
                .filter(|active| active.track_id == track_id)
                .map(|active| active.binding)
        };

        let Some(binding) = binding else {
            return self.request_load(track_id).await;
        };

        let load_id = self.current_load_id();
        let sought = self.output.seek(binding, Duration::ZERO).await;
        if self.is_stale(load_id) {
            return LoadOutcome::Superseded;
        }
        if let Err(err) = sought {
            return self.fail(load_id, &track_id, err.into()).await;
        }
        self.session.lock().position = Duration::ZERO;

        match self.start_bound(track_id, binding).await {
            Ok(()) if self.session.lock().pending_play.is_some() => LoadOutcome::AwaitingGesture,
            Ok(()) if self.is_stale(load_id) => LoadOutcome::Superseded,
            Ok(()) => LoadOutcome::Playing,
            Err(err) => LoadOutcome::Failed {
                message: err.to_string(),
                remediation: err.remediation().to_string(),
            },
        }
    }

    fn park_for_gesture(&self, track_id: &TrackId) -> LoadOutcome {
        {
            let mut session = self.session.lock();
            session.pending_play = Some(track_id.clone());
            session.state = PlaybackState::Ready;
        }
        info!(%track_id, "Playback blocked until user gesture");
        self.emit(PlaybackEvent::AwaitingGesture {
            track_id: track_id.to_string(),
        });
        LoadOutcome::AwaitingGesture
    }

    async fn supersede(
        &self,
        load_id: u64,
        track_id: &TrackId,
        binding: Option<OutputBinding>,
    ) -> LoadOutcome {
        debug!(load_id, %track_id, "Load superseded");
        if let Some(binding) = binding {
            self.release_output(binding).await;
        }
        self.emit(PlaybackEvent::Superseded {
            track_id: track_id.to_string(),
            load_id,
        });
        LoadOutcome::Superseded
    }

    async fn fail(&self, load_id: u64, track_id: &TrackId, err: PlaybackError) -> LoadOutcome {
        self.release_active(load_id).await;
        if self.is_stale(load_id) {
            return self.supersede(load_id, track_id, None).await;
        }

        let message = err.to_string();
        let remediation = err.remediation().to_string();
        warn!(load_id, %track_id, error = %message, "Playback failed");

        {
            let mut session = self.session.lock();
            session.state = PlaybackState::Idle;
            session.last_error = Some(message.clone());
        }
        self.emit(PlaybackEvent::Failed {
            track_id: track_id.to_string(),
            message: message.clone(),
            remediation: remediation.clone(),
        });

        LoadOutcome::Failed {
            message,
            remediation,
        }
    }

    /// Release the active binding if `load_id` still owns it.
    async fn release_active(&self, load_id: u64) {
        let owned = self.session.lock().take_active_for(load_id);
        if let Some(owned) = owned {
            self.release_output(owned.binding).await;
        }
    }

    async fn release_output(&self, binding: OutputBinding) {
        if let Err(err) = self.output.release(binding).await {
            warn!(?binding, error = %err, "Failed to release output binding");
        }
    }

    fn current_load_id(&self) -> u64 {
        self.load_counter.load(Ordering::SeqCst)
    }

    fn is_stale(&self, load_id: u64) -> bool {
        self.current_load_id() != load_id
    }

    fn current_track(&self) -> Option<TrackId> {
        self.session.lock().current_track.clone()
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.emit(CoreEvent::Playback(event));
    }
}
