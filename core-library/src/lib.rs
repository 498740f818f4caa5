//! # Library Module
//!
//! Track domain model and the session's in-memory library.
//!
//! ## Overview
//!
//! - [`Track`](models::Track) with a tagged [`AudioSource`](models::AudioSource)
//!   per physical copy (local, embedded, cloud)
//! - [`Library`](library::Library), the ordered track cache shared by the
//!   resolver, the import pipeline and the cloud sync reconciler
//! - Library loading from the remote store and a broken-track health report

pub mod error;
pub mod library;
pub mod models;

pub use error::{LibraryError, Result};
pub use library::{Library, LibraryHealth};
pub use models::{
    AudioSource, AudioSources, CloudKey, EmbeddedPayload, LocalRef, ResolvedSource, SourceOrigin,
    Track, TrackId,
};
