//! # Import & Cloud Sync
//!
//! Moves audio from the device into the library and, later, into the cloud.
//!
//! ## Overview
//!
//! - [`ImportPipeline`] scans a batch of dropped files, processes each one
//!   under a concurrency cap (metadata, local handle, upload fallback chain,
//!   remote record) and commits the produced tracks in small batches.
//! - [`ImportQueue`] holds the per-file status UI collaborators observe.
//! - [`CloudSyncReconciler`] uploads tracks that only have a local copy, one at
//!   a time, and reports audio lost to session expiry separately from
//!   ordinary failures.
//!
//! Neither component touches the audio output device.

pub mod config;
pub mod error;
pub mod import;
pub mod import_queue;
pub mod reconciler;
pub mod scan;
pub mod upload;

pub use config::{CloudSyncConfig, ImportConfig};
pub use error::{Result, SyncError};
pub use import::{BatchOutcome, ImportPipeline, ItemError};
pub use import_queue::{ImportItemId, ImportQueue, ImportQueueItem, ImportStats, ImportStatus};
pub use reconciler::{CloudSyncProgress, CloudSyncReconciler, CloudSyncReport, SyncFailure};
pub use upload::{UploadChain, UploadOutcome};
