//! # Metadata Module
//!
//! Extracts track metadata from raw audio files and drives transcription jobs.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag extraction (ID3, Vorbis, MP4, FLAC) through `lofty`
//! - Filename-derived fallback metadata when parsing fails or times out
//! - Polling the transcription service until a job completes or fails

pub mod error;
pub mod extractor;
pub mod transcription;

pub use error::{MetadataError, Result};
pub use extractor::{Artwork, ExtractedMetadata, ExtractorConfig, MetadataExtractor};
pub use transcription::{TranscriptionConfig, TranscriptionPoller};
