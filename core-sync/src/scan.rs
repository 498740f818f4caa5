//! Stage one of an import: keep the audio files, count the rest.

use bridge_traits::FileSource;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ImportConfig;

#[derive(Debug, Default)]
pub struct ScanResult {
    pub accepted: Vec<Arc<dyn FileSource>>,
    pub rejected: usize,
}

/// Filter `files` by the audio allow-list in chunks of
/// `config.scan_chunk_size`, yielding to the scheduler between chunks.
///
/// Rejections are summarised once at the end instead of per file.
pub async fn scan(files: Vec<Arc<dyn FileSource>>, config: &ImportConfig) -> ScanResult {
    let total = files.len();
    let chunk_size = config.scan_chunk_size.max(1);
    let mut result = ScanResult {
        accepted: Vec::with_capacity(total),
        rejected: 0,
    };

    let mut files = files.into_iter().peekable();
    let mut chunk_index = 0;
    while files.peek().is_some() {
        for file in files.by_ref().take(chunk_size) {
            if is_audio(file.as_ref(), config) {
                result.accepted.push(file);
            } else {
                result.rejected += 1;
            }
        }

        chunk_index += 1;
        debug!(chunk_index, scanned = result.accepted.len() + result.rejected, total, "Scanned chunk");
        tokio::task::yield_now().await;
    }

    info!(
        accepted = result.accepted.len(),
        rejected = result.rejected,
        "Scan complete"
    );
    result
}

/// Declared MIME type first, then the file extension.
pub fn is_audio(file: &dyn FileSource, config: &ImportConfig) -> bool {
    if let Some(mime) = file.mime_type() {
        let mime = mime.to_ascii_lowercase();
        if config.audio_mime_types.iter().any(|m| *m == mime) {
            return true;
        }
    }

    match file.name().rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            config.audio_extensions.iter().any(|e| *e == ext)
        }
        None => false,
    }
}
