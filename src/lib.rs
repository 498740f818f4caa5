//! Workspace umbrella crate.
//!
//! Exposes feature flags that map onto the individual workspace crates
//! (`core-service`, `core-playback`, `core-sync`, `core-metadata`) so a host
//! application can depend on `cadence-workspace` alone and pick what it needs.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "engine-only")]
pub use core_playback as playback;

#[cfg(feature = "engine-only")]
pub use core_sync as sync;

#[cfg(feature = "transcription")]
pub use core_metadata as metadata;
