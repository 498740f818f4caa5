//! Remote API wire types
//!
//! JSON bodies exchanged with the track API. Field names are camelCase on the
//! wire; binary payloads travel as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::{
    EmbeddedAudio, NewTrackRecord, RemoteTrackRecord, Transcript, TranscriptSegment,
    TranscriptionStatus,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Track resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDto {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub artist: String,

    #[serde(default)]
    pub album: String,

    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub genre: Option<String>,

    /// Object storage key of the uploaded audio
    #[serde(default)]
    pub file_key: Option<String>,

    /// Legacy records carry the audio inline
    #[serde(default)]
    pub has_embedded_audio: bool,

    #[serde(default)]
    pub transcript: Option<String>,
}

impl From<TrackDto> for RemoteTrackRecord {
    fn from(dto: TrackDto) -> Self {
        RemoteTrackRecord {
            id: dto.id,
            title: dto.title,
            artist: dto.artist,
            album: dto.album,
            duration: dto.duration,
            genre: dto.genre,
            file_key: dto.file_key,
            has_embedded_audio: dto.has_embedded_audio,
            transcript: dto.transcript,
        }
    }
}

/// `GET tracks` response
#[derive(Debug, Deserialize)]
pub struct TracksListResponse {
    pub tracks: Vec<TrackDto>,
}

/// `POST tracks` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrackBody {
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<InlineAudioDto>,
}

impl From<&NewTrackRecord> for CreateTrackBody {
    fn from(record: &NewTrackRecord) -> Self {
        CreateTrackBody {
            title: record.title.clone(),
            artist: record.artist.clone(),
            album: record.album.clone(),
            duration: record.duration,
            genre: record.genre.clone(),
            file_key: record.file_key.clone(),
            audio: record.embedded_audio.as_ref().map(InlineAudioDto::encode),
        }
    }
}

/// Audio payload embedded in a record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineAudioDto {
    pub content_type: String,
    /// Base64
    pub data: String,
}

impl InlineAudioDto {
    pub fn encode(audio: &EmbeddedAudio) -> Self {
        Self {
            content_type: audio.content_type.clone(),
            data: STANDARD.encode(&audio.bytes),
        }
    }

    pub fn decode(self) -> Result<EmbeddedAudio> {
        let bytes = STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| ApiError::ParseError(format!("Invalid base64 audio: {}", e)))?;
        Ok(EmbeddedAudio {
            content_type: self.content_type,
            bytes: Bytes::from(bytes),
        })
    }
}

/// `PUT tracks/{id}` body for the file key
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKeyUpdate<'a> {
    pub file_key: &'a str,
}

/// `PUT tracks/{id}` body for the analysis
#[derive(Debug, Serialize)]
pub struct AnalysisUpdate {
    pub analysis: AnalysisDto,
}

#[derive(Debug, Serialize)]
pub struct AnalysisDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptDto>,
}

/// `GET tracks/{id}/stream-url` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamUrlResponse {
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `POST upload` response
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDto {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<SegmentDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDto {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl From<TranscriptDto> for Transcript {
    fn from(dto: TranscriptDto) -> Self {
        Transcript {
            text: dto.text,
            segments: dto
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
        }
    }
}

impl From<&Transcript> for TranscriptDto {
    fn from(transcript: &Transcript) -> Self {
        TranscriptDto {
            text: transcript.text.clone(),
            segments: transcript
                .segments
                .iter()
                .map(|s| SegmentDto {
                    start: s.start,
                    end: s.end,
                    text: s.text.clone(),
                })
                .collect(),
        }
    }
}

/// `POST transcribe/{id}` and `GET transcribe/{id}` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    pub status: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub segments: Vec<SegmentDto>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TranscriptionResponse {
    pub fn into_status(self) -> Result<TranscriptionStatus> {
        match self.status.as_str() {
            "pending" | "queued" => Ok(TranscriptionStatus::Pending),
            "processing" => Ok(TranscriptionStatus::Processing),
            "completed" => {
                let text = self.text.ok_or_else(|| {
                    ApiError::InvalidResponse("completed transcription without text".to_string())
                })?;
                Ok(TranscriptionStatus::Completed(
                    TranscriptDto {
                        text,
                        segments: self.segments,
                    }
                    .into(),
                ))
            }
            "failed" => Ok(TranscriptionStatus::Failed(
                self.error.unwrap_or_else(|| "transcription failed".to_string()),
            )),
            other => Err(ApiError::InvalidResponse(format!(
                "unknown transcription status: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_track() {
        let json = r#"{
            "id": "trk_1",
            "title": "So What",
            "artist": "Miles Davis",
            "album": "Kind of Blue",
            "duration": 562.0,
            "fileKey": "audio/so-what.mp3",
            "hasEmbeddedAudio": false
        }"#;

        let record: RemoteTrackRecord = serde_json::from_str::<TrackDto>(json).unwrap().into();
        assert_eq!(record.id, "trk_1");
        assert_eq!(record.file_key.as_deref(), Some("audio/so-what.mp3"));
        assert_eq!(record.genre, None);
    }

    #[test]
    fn test_create_body_embeds_base64_audio() {
        let record = NewTrackRecord {
            title: "Demo".to_string(),
            embedded_audio: Some(EmbeddedAudio {
                content_type: "audio/mpeg".to_string(),
                bytes: Bytes::from_static(b"abc"),
            }),
            ..Default::default()
        };

        let json = serde_json::to_value(CreateTrackBody::from(&record)).unwrap();
        assert_eq!(json["audio"]["data"], "YWJj");
        assert_eq!(json["audio"]["contentType"], "audio/mpeg");
        assert!(json.get("fileKey").is_none());
    }

    #[test]
    fn test_inline_audio_decode() {
        let audio = InlineAudioDto {
            content_type: "audio/ogg".to_string(),
            data: "YWJj".to_string(),
        }
        .decode()
        .unwrap();
        assert_eq!(&audio.bytes[..], b"abc");

        let bad = InlineAudioDto {
            content_type: "audio/ogg".to_string(),
            data: "***".to_string(),
        };
        assert!(bad.decode().is_err());
    }

    #[test]
    fn test_transcription_status_mapping() {
        let completed: TranscriptionResponse = serde_json::from_str(
            r#"{"status":"completed","text":"hello","segments":[{"start":0.0,"end":1.5,"text":"hello"}]}"#,
        )
        .unwrap();
        match completed.into_status().unwrap() {
            TranscriptionStatus::Completed(t) => assert_eq!(t.segments.len(), 1),
            other => panic!("unexpected status {other:?}"),
        }

        let failed: TranscriptionResponse =
            serde_json::from_str(r#"{"status":"failed","error":"no speech"}"#).unwrap();
        assert_eq!(
            failed.into_status().unwrap(),
            TranscriptionStatus::Failed("no speech".to_string())
        );

        let unknown: TranscriptionResponse =
            serde_json::from_str(r#"{"status":"exploded"}"#).unwrap();
        assert!(unknown.into_status().is_err());
    }
}
