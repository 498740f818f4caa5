//! # Desktop Bridge Implementations
//!
//! Default bridge adapters for desktop hosts (macOS, Windows, Linux):
//! - [`ReqwestHttpClient`] - `HttpClient` over `reqwest`
//! - [`MemoryHandleStore`] - `LocalHandleStore` in process memory
//! - [`PathFileSource`] / [`BytesFileSource`] - `FileSource` for the import pipeline
//! - [`StaticTokenProvider`] - `TokenProvider` holding a host-supplied token
//!
//! `core-runtime` picks up the HTTP client and handle store automatically when
//! its `desktop-shims` feature is enabled.
//!
//! ```ignore
//! use bridge_desktop::{MemoryHandleStore, ReqwestHttpClient, StaticTokenProvider};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new()?);
//! let handles = Arc::new(MemoryHandleStore::new());
//! let tokens = Arc::new(StaticTokenProvider::new(session_token));
//! ```

mod auth;
mod files;
mod handles;
mod http;

pub use auth::StaticTokenProvider;
pub use files::{guess_mime_type, BytesFileSource, PathFileSource};
pub use handles::MemoryHandleStore;
pub use http::ReqwestHttpClient;
