//! Audio output bridge.
//!
//! There is exactly one active output device and the playback engine is its
//! only caller. A source is bound first, which yields an [`OutputBinding`];
//! every later call names that binding so a superseded load can release its
//! own resources without touching the one that replaced it.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

use crate::error::Result;
use crate::remote::StreamUrl;
use crate::storage::LocalHandle;

/// Concrete playable reference handed to the output device.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRef {
    /// Session-scoped local handle.
    Handle(LocalHandle),
    /// Self-contained encoded payload.
    Inline { content_type: String, bytes: Bytes },
    /// Remote stream.
    Stream(StreamUrl),
}

impl MediaRef {
    /// Local references are expected to be ready quickly; streams are not.
    pub fn is_local(&self) -> bool {
        !matches!(self, MediaRef::Stream(_))
    }
}

/// Identifies one bind call on the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputBinding(pub u64);

/// Why `play` did not start audio.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputFailure {
    /// The platform blocks audio until the user interacts with the page/app.
    #[error("playback requires a user gesture")]
    GestureRequired,

    #[error("format or decoding error: {0}")]
    Format(String),

    #[error("transient output error: {0}")]
    Transient(String),

    #[error("output error: {0}")]
    Other(String),
}

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Attach `media` to the output. Replaces whatever was bound before.
    async fn bind(&self, media: MediaRef) -> Result<OutputBinding>;

    /// Resolve once the bound media can start playing. The engine applies its
    /// own timeout around this call.
    async fn wait_ready(&self, binding: OutputBinding) -> Result<()>;

    async fn play(&self, binding: OutputBinding) -> std::result::Result<(), OutputFailure>;

    async fn pause(&self, binding: OutputBinding) -> Result<()>;

    async fn seek(&self, binding: OutputBinding, position: Duration) -> Result<()>;

    /// Current playback position of `binding`.
    async fn position(&self, binding: OutputBinding) -> Result<Duration>;

    /// Detach `binding` and free whatever the host allocated for it. A no-op
    /// when `binding` is no longer the active one.
    async fn release(&self, binding: OutputBinding) -> Result<()>;

    /// Resume a suspended processing graph (first user gesture).
    async fn resume_processing(&self) -> Result<()> {
        Ok(())
    }

    /// Play and immediately stop a near-silent buffer so later `play` calls
    /// are no longer gesture-gated.
    async fn prime_silence(&self) -> Result<()> {
        Ok(())
    }
}
