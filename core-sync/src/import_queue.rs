//! Observable per-file import status.
//!
//! The import pipeline is the only writer. UI collaborators read
//! [`ImportQueue::snapshot`] and [`ImportQueue::stats`].

use core_library::TrackId;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ImportItemId(Uuid);

impl ImportItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImportItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImportItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Uploading => "uploading",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input file of an import batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportQueueItem {
    pub id: ImportItemId,
    pub batch_id: String,
    pub file_name: String,
    pub status: ImportStatus,
    /// 0-100
    pub progress: u8,
    /// Set once the item completes.
    pub track_id: Option<TrackId>,
    /// Completed, but nothing reached the remote store.
    pub local_only: bool,
    /// Set once the item fails.
    pub error: Option<String>,
}

impl ImportQueueItem {
    fn new(batch_id: &str, file_name: &str) -> Self {
        Self {
            id: ImportItemId::new(),
            batch_id: batch_id.to_string(),
            file_name: file_name.to_string(),
            status: ImportStatus::Pending,
            progress: 0,
            track_id: None,
            local_only: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total: usize,
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct ImportQueue {
    items: RwLock<Vec<ImportQueueItem>>,
}

impl ImportQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pending item per file name. Returns ids in input order.
    pub fn enqueue_batch<'a, I>(&self, batch_id: &str, file_names: I) -> Vec<ImportItemId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut items = self.items.write();
        file_names
            .into_iter()
            .map(|name| {
                let item = ImportQueueItem::new(batch_id, name);
                let id = item.id;
                items.push(item);
                id
            })
            .collect()
    }

    /// Move an item forward. Terminal items are left alone; progress never
    /// goes backwards.
    pub fn advance(&self, id: ImportItemId, status: ImportStatus, progress: u8) {
        self.with_item(id, |item| {
            if item.status.is_terminal() {
                return;
            }
            item.status = status;
            item.progress = item.progress.max(progress.min(100));
        });
    }

    pub fn complete(&self, id: ImportItemId, track_id: TrackId, local_only: bool) {
        self.with_item(id, |item| {
            item.status = ImportStatus::Completed;
            item.progress = 100;
            item.track_id = Some(track_id);
            item.local_only = local_only;
            item.error = None;
        });
    }

    pub fn fail(&self, id: ImportItemId, error: impl Into<String>) {
        let error = error.into();
        self.with_item(id, |item| {
            item.status = ImportStatus::Failed;
            item.progress = 100;
            item.error = Some(error);
        });
    }

    pub fn get(&self, id: ImportItemId) -> Option<ImportQueueItem> {
        self.items.read().iter().find(|item| item.id == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<ImportQueueItem> {
        self.items.read().clone()
    }

    pub fn stats(&self) -> ImportStats {
        let items = self.items.read();
        let mut stats = ImportStats {
            total: items.len(),
            ..Default::default()
        };
        for item in items.iter() {
            match item.status {
                ImportStatus::Pending => stats.pending += 1,
                ImportStatus::Uploading | ImportStatus::Processing => stats.active += 1,
                ImportStatus::Completed => stats.completed += 1,
                ImportStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Drop every item of `batch_id`. Returns how many were removed.
    pub fn clear_batch(&self, batch_id: &str) -> usize {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|item| item.batch_id != batch_id);
        before - items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn with_item<F>(&self, id: ImportItemId, f: F)
    where
        F: FnOnce(&mut ImportQueueItem),
    {
        if let Some(item) = self.items.write().iter_mut().find(|item| item.id == id) {
            f(item);
        }
    }
}
