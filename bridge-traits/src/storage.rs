//! Local audio storage abstractions
//!
//! Two capabilities live here:
//!
//! - [`LocalHandleStore`] materialises raw bytes into an *ephemeral* handle the
//!   audio output can play directly. Handles live only as long as the host
//!   session (a page reload, an app restart) and must be probed before trust.
//! - [`FileSource`] is one user-selected input file handed to the import
//!   pipeline.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::error::Result;

/// Opaque reference to bytes held by the host for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalHandle(String);

impl LocalHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-scoped handle storage.
///
/// The core never deletes handles. They are invalidated externally and the
/// core only finds out through [`probe`](LocalHandleStore::probe) or a failed
/// [`read`](LocalHandleStore::read).
#[async_trait]
pub trait LocalHandleStore: Send + Sync {
    /// Store `bytes` and return a handle the audio output can bind to.
    async fn create(&self, bytes: Bytes, mime_type: &str) -> Result<LocalHandle>;

    /// Cheap existence check. Must not read the full payload.
    async fn probe(&self, handle: &LocalHandle) -> bool;

    /// Re-materialise the raw bytes behind `handle`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::HandleExpired`](crate::error::BridgeError::HandleExpired)
    /// when the handle no longer resolves.
    async fn read(&self, handle: &LocalHandle) -> Result<Bytes>;
}

/// One file picked or dropped by the user.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// File name including extension, without any directory part.
    fn name(&self) -> &str;

    /// MIME type declared by the host, if any.
    fn mime_type(&self) -> Option<&str>;

    /// Size in bytes as reported by the host.
    fn size(&self) -> u64;

    /// Read the whole file.
    async fn read(&self) -> Result<Bytes>;
}

impl fmt::Debug for dyn FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSource")
            .field("name", &self.name())
            .field("mime_type", &self.mime_type())
            .field("size", &self.size())
            .finish()
    }
}
