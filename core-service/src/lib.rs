//! Core service façade.
//!
//! Wires the host-provided bridges (HTTP client, token provider, audio output,
//! local handle store) into the library, playback engine, import pipeline and
//! cloud sync reconciler, and exposes them to a UI layer through
//! [`CoreService`].
//!
//! Desktop hosts typically enable the `desktop-shims` feature, which supplies
//! a `reqwest` HTTP client and an in-memory handle store when none is
//! injected. The `transcription` feature enables background transcript jobs.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::{CoreService, ServiceConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .token_provider(Arc::new(my_tokens))
//!     .audio_output(Arc::new(my_output))
//!     .enable_cloud_sync(true)
//!     .build()?;
//!
//! let core = CoreService::new(config, ServiceConfig::default())?;
//! core.load_library().await?;
//! ```

pub mod config;
pub mod error;
mod service;
mod session_watch;
#[cfg(feature = "transcription")]
mod transcription;

pub use config::ServiceConfig;
pub use error::{CoreError, Result};
pub use service::CoreService;
