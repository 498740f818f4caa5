//! File sources for the import pipeline.

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::FileSource};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// MIME type for common audio extensions. `None` for anything else, so the
/// import allow-list can still decide by extension.
pub fn guess_mime_type(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "aac" => "audio/mp4",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => return None,
    };
    Some(mime)
}

/// A file on the local disk, read lazily.
#[derive(Debug, Clone)]
pub struct PathFileSource {
    path: PathBuf,
    name: String,
    mime_type: Option<String>,
    size: u64,
}

impl PathFileSource {
    /// Stat `path` and build a source for it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = guess_mime_type(&name).map(str::to_string);

        Ok(Self {
            path,
            name,
            mime_type,
            size: metadata.len(),
        })
    }

    /// Every regular file directly inside `dir`, sorted by name.
    pub async fn list_dir(dir: impl AsRef<Path>) -> Result<Vec<Self>> {
        let mut entries = fs::read_dir(dir.as_ref()).await?;
        let mut sources = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                sources.push(Self::open(entry.path()).await?);
            }
        }
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = sources.len(), "Listed import directory");
        Ok(sources)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileSource for PathFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(fs::read(&self.path).await?))
    }
}

/// A file whose bytes are already in memory (drag and drop, tests).
#[derive(Debug, Clone)]
pub struct BytesFileSource {
    name: String,
    mime_type: Option<String>,
    bytes: Bytes,
}

impl BytesFileSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = guess_mime_type(&name).map(str::to_string);
        Self {
            name,
            mime_type,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

#[async_trait]
impl FileSource for BytesFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    async fn read(&self) -> Result<Bytes> {
        Ok(self.bytes.clone())
    }
}
