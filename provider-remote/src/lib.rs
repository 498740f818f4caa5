//! # Remote Track Store Provider
//!
//! REST implementation of the remote store contracts in `bridge-traits`:
//!
//! - [`TrackStore`](bridge_traits::TrackStore): track record CRUD, stream URLs
//!   and legacy embedded audio
//! - [`UploadProxy`](bridge_traits::UploadProxy): raw audio upload returning an
//!   object-storage key
//! - [`TranscriptionApi`](bridge_traits::TranscriptionApi): transcription jobs
//!
//! All traffic goes through the host-provided `HttpClient`, authenticated with
//! the bearer token from the host's `TokenProvider`.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::RemoteConnector;
pub use error::{ApiError, Result};
