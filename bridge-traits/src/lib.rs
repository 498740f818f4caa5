//! # Host Bridge Traits
//!
//! Capabilities the core needs but cannot provide on its own.
//!
//! ## Overview
//!
//! Each trait is a seam between the platform-neutral core and the host
//! (desktop binary, mobile shell, browser). The core receives trait objects
//! through `core_runtime::config::CoreConfig` and never assumes anything about
//! how they are implemented.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Executes requests built by the remote store connector
//! - [`TokenProvider`](auth::TokenProvider) - Opaque bearer-token source, told about 401s
//!
//! ### Remote collaborators
//! - [`TrackStore`](remote::TrackStore) - Track CRUD (`GET tracks`, `POST track`, ...)
//! - [`UploadProxy`](remote::UploadProxy) - All-or-nothing object upload
//! - [`TranscriptionApi`](remote::TranscriptionApi) - Fire-and-forget transcription jobs
//!
//! ### Local audio
//! - [`LocalHandleStore`](storage::LocalHandleStore) - Session-scoped handles to raw bytes
//! - [`FileSource`](storage::FileSource) - One user-selected input file
//! - [`AudioOutput`](playback::AudioOutput) - The single output device
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! should map an HTTP 401 to `SessionExpired` and a dead local handle to
//! `HandleExpired`; the core treats both as unrecoverable and never retries
//! them.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`
//! across tasks.

pub mod auth;
pub mod error;
pub mod http;
pub mod playback;
pub mod remote;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use auth::TokenProvider;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use playback::{AudioOutput, MediaRef, OutputBinding, OutputFailure};
pub use remote::{
    EmbeddedAudio, NewTrackRecord, RemoteTrackRecord, StreamUrl, TrackAnalysis, TrackStore,
    Transcript, TranscriptSegment, TranscriptionApi, TranscriptionStatus, UploadProxy,
};
pub use storage::{FileSource, LocalHandle, LocalHandleStore};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
