//! In-memory ephemeral handle store.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{LocalHandle, LocalHandleStore},
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

struct Entry {
    bytes: Bytes,
    mime_type: String,
}

/// Keeps imported audio in process memory, keyed by `mem:` handles.
///
/// Handles die with the process, which is the desktop equivalent of a page
/// reload. [`invalidate_all`](MemoryHandleStore::invalidate_all) drops every
/// handle at once to reproduce that in tests.
#[derive(Default)]
pub struct MemoryHandleStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every handle. Returns how many were dropped.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "Invalidated all local handles");
        dropped
    }

    /// Forget a single handle.
    pub fn invalidate(&self, handle: &LocalHandle) -> bool {
        self.entries.lock().remove(handle.as_str()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// MIME type recorded when `handle` was created.
    pub fn mime_type(&self, handle: &LocalHandle) -> Option<String> {
        self.entries
            .lock()
            .get(handle.as_str())
            .map(|entry| entry.mime_type.clone())
    }
}

#[async_trait]
impl LocalHandleStore for MemoryHandleStore {
    async fn create(&self, bytes: Bytes, mime_type: &str) -> Result<LocalHandle> {
        if bytes.is_empty() {
            return Err(BridgeError::OperationFailed(
                "Refusing to create a handle for an empty payload".to_string(),
            ));
        }

        let id = format!("mem:{}", Uuid::new_v4());
        self.entries.lock().insert(
            id.clone(),
            Entry {
                bytes,
                mime_type: mime_type.to_string(),
            },
        );
        Ok(LocalHandle::new(id))
    }

    async fn probe(&self, handle: &LocalHandle) -> bool {
        self.entries.lock().contains_key(handle.as_str())
    }

    async fn read(&self, handle: &LocalHandle) -> Result<Bytes> {
        self.entries
            .lock()
            .get(handle.as_str())
            .map(|entry| entry.bytes.clone())
            .ok_or_else(|| BridgeError::HandleExpired(handle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_probe_read() {
        let store = MemoryHandleStore::new();
        let handle = store
            .create(Bytes::from_static(b"ID3audio"), "audio/mpeg")
            .await
            .unwrap();

        assert!(handle.as_str().starts_with("mem:"));
        assert!(store.probe(&handle).await);
        assert_eq!(store.read(&handle).await.unwrap(), Bytes::from_static(b"ID3audio"));
        assert_eq!(store.mime_type(&handle).as_deref(), Some("audio/mpeg"));
    }

    #[tokio::test]
    async fn test_invalidate_all_expires_handles() {
        let store = MemoryHandleStore::new();
        let handle = store
            .create(Bytes::from_static(b"fLaC"), "audio/flac")
            .await
            .unwrap();

        assert_eq!(store.invalidate_all(), 1);
        assert!(!store.probe(&handle).await);
        assert!(matches!(
            store.read(&handle).await,
            Err(BridgeError::HandleExpired(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_rejected() {
        let store = MemoryHandleStore::new();
        assert!(store.create(Bytes::new(), "audio/mpeg").await.is_err());
        assert!(store.is_empty());
    }
}
