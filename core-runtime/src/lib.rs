//! # Core Runtime Module
//!
//! Foundational infrastructure shared by every core crate:
//! - Logging and tracing setup
//! - `CoreConfig` builder with fail-fast bridge validation
//! - Event bus carrying library, import, cloud sync, playback and session events
//! - The backoff helper used for idempotent remote operations

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod retry;

pub use error::{Error, Result};
