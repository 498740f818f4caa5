//! Audio Tag Extraction
//!
//! Parses in-memory audio with the `lofty` crate. Supports ID3v2, Vorbis
//! Comments, MP4 tags, FLAC and anything else `lofty` can probe.
//!
//! ## Overview
//!
//! - [`MetadataExtractor::parse`] is the raw, blocking parse
//! - [`MetadataExtractor::extract_or_fallback`] runs it on the blocking pool
//!   under a timeout and never fails: on timeout or parse error the title is
//!   derived from the file name and artist/album become "Unknown Artist" /
//!   "Unknown Album"
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::extractor::MetadataExtractor;
//!
//! # async fn example(bytes: bytes::Bytes) {
//! let extractor = MetadataExtractor::new();
//! let metadata = extractor.extract_or_fallback(bytes, "01 - Intro.mp3").await;
//! println!("{} by {}", metadata.title, metadata.artist);
//! # }
//! ```

use bytes::Bytes;
use core_runtime::retry::{retry_with_backoff, BackoffPolicy};
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::picture::{MimeType, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Metadata for one imported file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: Option<String>,
    pub duration: Option<Duration>,
    /// Container MIME type as detected by the probe.
    pub mime_type: Option<String>,
    /// Front cover if present, otherwise the first picture.
    pub artwork: Option<Artwork>,
    /// `false` when any field came from the filename fallback.
    pub from_tags: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artwork {
    pub mime_type: String,
    pub data: Bytes,
}

/// Extraction limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Upper bound for the whole extraction of one file.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Attempts for the blocking parse task.
    #[serde(default = "default_parse_backoff")]
    pub parse_backoff: BackoffPolicy,

    #[serde(default = "default_true")]
    pub extract_artwork: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            parse_backoff: default_parse_backoff(),
            extract_artwork: true,
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.timeout.is_zero() {
            return Err("metadata timeout must be > 0".to_string());
        }
        self.parse_backoff.validate()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_parse_backoff() -> BackoffPolicy {
    BackoffPolicy::new(2, Duration::from_millis(100))
}

fn default_true() -> bool {
    true
}

/// Audio metadata extractor.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    parse_options: ParseOptions,
    config: ExtractorConfig,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self {
            parse_options: ParseOptions::new(),
            config,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract metadata, falling back to the file name on any failure.
    ///
    /// Parsing runs on the blocking pool. The whole call, retries included,
    /// is bounded by the configured timeout so one malformed file cannot
    /// stall a batch.
    pub async fn extract_or_fallback(&self, bytes: Bytes, file_name: &str) -> ExtractedMetadata {
        let attempt = retry_with_backoff(
            &self.config.parse_backoff,
            "parse metadata",
            MetadataError::is_transient,
            |_| self.parse_blocking(bytes.clone(), file_name.to_string()),
        );
        self.bounded(file_name, attempt).await
    }

    /// Run `attempt` under the per-file timeout, degrading to
    /// [`MetadataExtractor::fallback`] on expiry or error.
    async fn bounded<F>(&self, file_name: &str, attempt: F) -> ExtractedMetadata
    where
        F: Future<Output = Result<ExtractedMetadata>>,
    {
        let timeout = self.config.timeout;
        let outcome = match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(MetadataError::Timeout(timeout)),
        };

        match outcome {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(file = %file_name, error = %err, "Metadata extraction failed, using file name");
                Self::fallback(file_name)
            }
        }
    }

    async fn parse_blocking(&self, bytes: Bytes, file_name: String) -> Result<ExtractedMetadata> {
        let extractor = self.clone();
        tokio::task::spawn_blocking(move || extractor.parse(&bytes, &file_name))
            .await
            .map_err(|e| MetadataError::TaskFailed(e.to_string()))?
    }

    /// Blocking container parse.
    ///
    /// Returns an error when the bytes cannot be probed or read. A readable
    /// file without tags succeeds with filename-derived text fields.
    pub fn parse(&self, bytes: &Bytes, file_name: &str) -> Result<ExtractedMetadata> {
        debug!(file = %file_name, size = bytes.len(), "Extracting metadata");

        if bytes.is_empty() {
            return Err(MetadataError::Parse("file is empty".to_string()));
        }

        let tagged_file = Probe::new(Cursor::new(bytes.clone()))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::Parse(format!("Failed to probe file: {}", e)))?
            .read()
            .map_err(|e| MetadataError::Parse(format!("Failed to parse file: {}", e)))?;

        let file_type = tagged_file.file_type();
        let mime_type = Self::file_type_to_mime_type(file_type);
        if mime_type.is_none() {
            return Err(MetadataError::UnsupportedFormat(format!("{:?}", file_type)));
        }

        let duration = Some(tagged_file.properties().duration()).filter(|d| !d.is_zero());

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        let mut metadata = Self::fallback(file_name);
        metadata.duration = duration;
        metadata.mime_type = mime_type.map(str::to_string);

        match tag {
            Some(tag) => {
                let title = tag.title().map(|s| Self::normalize_text(&s));
                let artist = tag.artist().map(|s| Self::normalize_text(&s));
                let album = tag.album().map(|s| Self::normalize_text(&s));

                metadata.from_tags = title.is_some() && artist.is_some() && album.is_some();
                if let Some(title) = title.filter(|t| !t.is_empty()) {
                    metadata.title = title;
                }
                if let Some(artist) = artist.filter(|a| !a.is_empty()) {
                    metadata.artist = artist;
                }
                if let Some(album) = album.filter(|a| !a.is_empty()) {
                    metadata.album = album;
                }
                metadata.genre = tag
                    .genre()
                    .map(|s| Self::normalize_text(&s))
                    .filter(|g| !g.is_empty());

                if self.config.extract_artwork {
                    metadata.artwork = Self::extract_artwork(tag);
                }
            }
            None => {
                debug!(file = %file_name, "No tags found, using file name as title");
            }
        }

        Ok(metadata)
    }

    /// Filename-derived metadata: the stem becomes the title.
    pub fn fallback(file_name: &str) -> ExtractedMetadata {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(Self::normalize_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown Title".to_string());

        ExtractedMetadata {
            title: stem,
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            genre: None,
            duration: None,
            mime_type: None,
            artwork: None,
            from_tags: false,
        }
    }

    /// Collapse whitespace runs and drop control characters.
    fn normalize_text(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .filter(|c| !c.is_control())
            .collect()
    }

    fn extract_artwork(tag: &Tag) -> Option<Artwork> {
        let pictures = tag.pictures();
        let picture = pictures
            .iter()
            .find(|pic| pic.pic_type() == PictureType::CoverFront)
            .or_else(|| pictures.first())?;

        let mime_type = picture.mime_type().and_then(Self::image_mime_type)?;
        if picture.data().is_empty() {
            return None;
        }

        Some(Artwork {
            mime_type: mime_type.to_string(),
            data: Bytes::copy_from_slice(picture.data()),
        })
    }

    fn image_mime_type(mime_type: &MimeType) -> Option<&'static str> {
        match mime_type {
            MimeType::Png => Some("image/png"),
            MimeType::Jpeg => Some("image/jpeg"),
            MimeType::Tiff => Some("image/tiff"),
            MimeType::Bmp => Some("image/bmp"),
            MimeType::Gif => Some("image/gif"),
            _ => None,
        }
    }

    /// MIME type from the container magic bytes alone, without parsing tags.
    pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
        FileType::from_buffer(bytes).and_then(Self::file_type_to_mime_type)
    }

    pub fn file_type_to_mime_type(file_type: FileType) -> Option<&'static str> {
        let mime = match file_type {
            FileType::Aac => "audio/aac",
            FileType::Aiff => "audio/aiff",
            FileType::Ape => "audio/ape",
            FileType::Flac => "audio/flac",
            FileType::Mpeg => "audio/mpeg",
            FileType::Mp4 => "audio/mp4",
            FileType::Mpc => "audio/musepack",
            FileType::Opus => "audio/opus",
            FileType::Vorbis => "audio/ogg",
            FileType::Speex => "audio/speex",
            FileType::Wav => "audio/wav",
            FileType::WavPack => "audio/wavpack",
            _ => return None,
        };
        Some(mime)
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            MetadataExtractor::normalize_text("  Hello   World  "),
            "Hello World"
        );
        assert_eq!(
            MetadataExtractor::normalize_text("Title\nWith\tWhitespace"),
            "Title With Whitespace"
        );
    }

    #[test]
    fn test_fallback_uses_file_stem() {
        let metadata = MetadataExtractor::fallback("03 - Blue in Green.flac");
        assert_eq!(metadata.title, "03 - Blue in Green");
        assert_eq!(metadata.artist, UNKNOWN_ARTIST);
        assert_eq!(metadata.album, UNKNOWN_ALBUM);
        assert!(!metadata.from_tags);

        assert_eq!(MetadataExtractor::fallback("").title, "Unknown Title");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let extractor = MetadataExtractor::new();
        let bytes = Bytes::from_static(b"This is not a valid audio file");
        assert!(extractor.parse(&bytes, "corrupt.mp3").is_err());
        assert!(extractor.parse(&Bytes::new(), "empty.mp3").is_err());
    }

    #[test]
    fn test_sniff_mime_type() {
        assert_eq!(
            MetadataExtractor::sniff_mime_type(b"fLaC\x00\x00\x00\x22"),
            Some("audio/flac")
        );
        assert_eq!(MetadataExtractor::sniff_mime_type(b"plain text"), None);
    }

    #[test]
    fn test_file_type_to_mime_type() {
        assert_eq!(
            MetadataExtractor::file_type_to_mime_type(FileType::Mpeg),
            Some("audio/mpeg")
        );
        assert_eq!(
            MetadataExtractor::file_type_to_mime_type(FileType::Flac),
            Some("audio/flac")
        );
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(
            MetadataExtractor::image_mime_type(&MimeType::Jpeg),
            Some("image/jpeg")
        );
        assert_eq!(
            MetadataExtractor::image_mime_type(&MimeType::Png),
            Some("image/png")
        );
    }

    #[test]
    fn test_config_validation() {
        let config = ExtractorConfig {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_parse_falls_back_without_holding_the_batch() {
        let extractor = MetadataExtractor::with_config(ExtractorConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        });
        let parsed = ExtractedMetadata {
            artist: "Nina Simone".to_string(),
            from_tags: true,
            ..MetadataExtractor::fallback("Sinnerman.mp3")
        };

        let started = tokio::time::Instant::now();
        let (stalled, quick) = tokio::join!(
            extractor.bounded(
                "Hung Track.mp3",
                std::future::pending::<Result<ExtractedMetadata>>()
            ),
            extractor.bounded("Sinnerman.mp3", async { Ok(parsed.clone()) }),
        );
        let elapsed = started.elapsed();

        assert_eq!(stalled.title, "Hung Track");
        assert_eq!(stalled.artist, UNKNOWN_ARTIST);
        assert!(!stalled.from_tags);
        assert_eq!(quick.artist, "Nina Simone");
        assert!(quick.from_tags);
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }
}
