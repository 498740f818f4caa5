//! Remote track API connector
//!
//! Implements `TrackStore`, `UploadProxy` and `TranscriptionApi` over the
//! injected `HttpClient`.

use async_trait::async_trait;
use bridge_traits::auth::TokenProvider;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::{
    EmbeddedAudio, NewTrackRecord, RemoteTrackRecord, StreamUrl, TrackAnalysis, TrackStore,
    TranscriptionApi, TranscriptionStatus, UploadProxy,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::ApiError;
use crate::types::{
    AnalysisDto, AnalysisUpdate, CreateTrackBody, FileKeyUpdate, InlineAudioDto,
    StreamUrlResponse, TrackDto, TracksListResponse, TranscriptionResponse, UploadResponse,
};

/// Timeout for JSON requests
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for raw audio transfers
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Remote API connector
///
/// Every request carries the current bearer token. A 401 is reported to the
/// [`TokenProvider`] and surfaces as `BridgeError::SessionExpired`. Nothing is
/// retried here; idempotent calls are retried by their callers.
///
/// # Example
///
/// ```ignore
/// use provider_remote::RemoteConnector;
/// use bridge_traits::TrackStore;
///
/// let connector = RemoteConnector::new(http_client, token_provider, "https://api.example.com");
/// let tracks = connector.list_tracks().await?;
/// ```
pub struct RemoteConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn TokenProvider>,
    base_url: String,
}

impl RemoteConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn TokenProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            tokens,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn track_url(&self, track_id: &str, suffix: &str) -> String {
        let mut url = self.url(&format!("tracks/{}", track_id));
        if !suffix.is_empty() {
            url.push('/');
            url.push_str(suffix);
        }
        url
    }

    /// Execute an authenticated request and map the status.
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http_client
            .execute(request.bearer_token(token))
            .await?;

        if response.is_unauthorized() {
            warn!("Remote API rejected the session token");
            self.tokens.on_session_expired();
            return Err(ApiError::Unauthorized.into());
        }

        if !response.is_success() {
            warn!(status = response.status, "Remote API request failed");
            let message = response
                .text()
                .unwrap_or_else(|_| format!("{} bytes of non-text body", response.body.len()));
            return Err(ApiError::Status {
                status_code: response.status,
                message,
            }
            .into());
        }

        debug!(status = response.status, "Remote API request succeeded");
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.send(request).await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            ApiError::ParseError(format!("Failed to parse response body: {}", e)).into()
        })
    }

    fn get(&self, url: String) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, url)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT)
    }
}

#[async_trait]
impl TrackStore for RemoteConnector {
    #[instrument(skip(self))]
    async fn list_tracks(&self) -> Result<Vec<RemoteTrackRecord>> {
        let response: TracksListResponse = self.send_json(self.get(self.url("tracks"))).await?;
        info!("Listed {} tracks from the remote store", response.tracks.len());
        Ok(response.tracks.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, record), fields(title = %record.title))]
    async fn create_track(&self, record: &NewTrackRecord) -> Result<RemoteTrackRecord> {
        let timeout = if record.embedded_audio.is_some() {
            TRANSFER_TIMEOUT
        } else {
            API_TIMEOUT
        };
        let request = HttpRequest::new(HttpMethod::Post, self.url("tracks"))
            .json(&CreateTrackBody::from(record))?
            .timeout(timeout);

        let created: TrackDto = self.send_json(request).await?;
        info!(track_id = %created.id, "Created track record");
        Ok(created.into())
    }

    #[instrument(skip(self))]
    async fn update_file_key(&self, track_id: &str, file_key: &str) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Put, self.track_url(track_id, ""))
            .json(&FileKeyUpdate { file_key })?
            .timeout(API_TIMEOUT);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, analysis))]
    async fn update_analysis(&self, track_id: &str, analysis: &TrackAnalysis) -> Result<()> {
        let body = AnalysisUpdate {
            analysis: AnalysisDto {
                transcript: analysis.transcript.as_ref().map(Into::into),
            },
        };
        let request = HttpRequest::new(HttpMethod::Put, self.track_url(track_id, ""))
            .json(&body)?
            .timeout(API_TIMEOUT);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stream_url(&self, track_id: &str) -> Result<StreamUrl> {
        let response: StreamUrlResponse = self
            .send_json(self.get(self.track_url(track_id, "stream-url")))
            .await?;
        if response.url.is_empty() {
            return Err(ApiError::InvalidResponse("empty stream url".to_string()).into());
        }
        Ok(StreamUrl {
            url: response.url,
            expires_at: response.expires_at,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_audio(&self, track_id: &str) -> Result<EmbeddedAudio> {
        let request = self
            .get(self.track_url(track_id, "audio"))
            .timeout(TRANSFER_TIMEOUT);
        let payload: InlineAudioDto = self.send_json(request).await?;
        Ok(payload.decode()?)
    }

    /// Stream URLs are pre-signed; no bearer token is attached.
    #[instrument(skip(self, url))]
    async fn download(&self, url: &StreamUrl) -> Result<Bytes> {
        let request = HttpRequest::new(HttpMethod::Get, url.url.clone()).timeout(TRANSFER_TIMEOUT);
        let response = self.http_client.execute(request).await?;
        let response = response.error_for_status()?;
        debug!(bytes = response.body.len(), "Downloaded audio");
        Ok(response.body)
    }

    #[instrument(skip(self))]
    async fn delete_track(&self, track_id: &str) -> Result<()> {
        let request =
            HttpRequest::new(HttpMethod::Delete, self.track_url(track_id, "")).timeout(API_TIMEOUT);
        self.send(request).await?;
        info!(track_id, "Deleted track record");
        Ok(())
    }
}

#[async_trait]
impl UploadProxy for RemoteConnector {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, bytes: Bytes, filename: &str, content_type: &str) -> Result<String> {
        let request = HttpRequest::new(HttpMethod::Post, self.url("upload"))
            .header("Content-Type", content_type)
            .header("X-File-Name", filename)
            .body(bytes)
            .timeout(TRANSFER_TIMEOUT);

        let response: UploadResponse = self.send_json(request).await?;
        if response.key.is_empty() {
            return Err(BridgeError::OperationFailed(
                "upload returned an empty key".to_string(),
            ));
        }
        info!(key = %response.key, "Uploaded audio");
        Ok(response.key)
    }
}

#[async_trait]
impl TranscriptionApi for RemoteConnector {
    #[instrument(skip(self))]
    async fn request(&self, track_id: &str) -> Result<TranscriptionStatus> {
        let request = HttpRequest::new(HttpMethod::Post, self.url(&format!("transcribe/{}", track_id)))
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT);
        let response: TranscriptionResponse = self.send_json(request).await?;
        Ok(response.into_status()?)
    }

    #[instrument(skip(self))]
    async fn status(&self, track_id: &str) -> Result<TranscriptionStatus> {
        let response: TranscriptionResponse = self
            .send_json(self.get(self.url(&format!("transcribe/{}", track_id))))
            .await?;
        Ok(response.into_status()?)
    }
}
