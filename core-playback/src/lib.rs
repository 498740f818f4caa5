//! # Playback Module
//!
//! Source resolution and the playback state machine.
//!
//! ## Overview
//!
//! This module handles:
//! - Resolving a track to exactly one playable source (local handle,
//!   self-contained payload, cloud stream or download, embedded payload)
//! - The load/play/advance state machine with load-token cancellation
//! - Play queue with repeat and shuffle
//! - The audio unlock handshake for gesture-gated platforms
//! - The media command table exposed to OS media controls

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod unlock;

pub use commands::{MediaCommand, MediaCommandHandler};
pub use config::PlaybackConfig;
pub use engine::{LoadOutcome, PlaybackEngine};
pub use error::{PlaybackError, Result, UnavailableReason};
pub use queue::{PlayQueue, QueueSnapshot, QueueStep, RepeatMode};
pub use resolver::SourceResolver;
pub use session::{PlaybackSession, PlaybackState, SessionSnapshot};
pub use unlock::{AudioUnlock, UnlockState};
