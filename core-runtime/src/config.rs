//! # Core Configuration Module
//!
//! Collects the host bridges and platform settings the core is built from.
//!
//! ## Overview
//!
//! [`CoreConfig`] is assembled through [`CoreConfigBuilder`]. The builder fails
//! fast with [`Error::CapabilityMissing`] when a required bridge is absent, so
//! a misconfigured host finds out at startup rather than on first playback.
//!
//! ## Required Dependencies
//!
//! - `TokenProvider` - Bearer token for the remote store
//! - `AudioOutput` - The single output device
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - desktop default: reqwest
//! - `LocalHandleStore` - desktop default: in-memory store
//! - `TrackStore`, `UploadProxy`, `TranscriptionApi` - default to the REST
//!   connector built from `api_base_url`
//! - `Clock` - defaults to the system clock
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlatformProfile};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .token_provider(Arc::new(MyTokenProvider))
//!     .audio_output(Arc::new(MyAudioOutput))
//!     .platform(PlatformProfile::mobile_browser())
//!     .enable_transcription(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AudioOutput, Clock, HttpClient, LocalHandleStore, SystemClock, TokenProvider, TrackStore,
    TranscriptionApi, UploadProxy,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Core configuration.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the track API and upload proxy. `None` only when every
    /// remote collaborator is injected directly.
    pub api_base_url: Option<String>,

    pub http_client: Arc<dyn HttpClient>,

    pub token_provider: Arc<dyn TokenProvider>,

    pub audio_output: Arc<dyn AudioOutput>,

    pub handle_store: Arc<dyn LocalHandleStore>,

    /// Overrides the REST track store.
    pub track_store: Option<Arc<dyn TrackStore>>,

    /// Overrides the REST upload proxy.
    pub upload_proxy: Option<Arc<dyn UploadProxy>>,

    /// Overrides the REST transcription client.
    pub transcription_api: Option<Arc<dyn TranscriptionApi>>,

    pub clock: Arc<dyn Clock>,

    pub platform: PlatformProfile,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("http_client", &"HttpClient { ... }")
            .field("token_provider", &"TokenProvider { ... }")
            .field("audio_output", &"AudioOutput { ... }")
            .field("handle_store", &"LocalHandleStore { ... }")
            .field(
                "track_store",
                &self.track_store.as_ref().map(|_| "TrackStore { ... }"),
            )
            .field(
                "upload_proxy",
                &self.upload_proxy.as_ref().map(|_| "UploadProxy { ... }"),
            )
            .field(
                "transcription_api",
                &self
                    .transcription_api
                    .as_ref()
                    .map(|_| "TranscriptionApi { ... }"),
            )
            .field("platform", &self.platform)
            .field("features", &self.features)
            .finish()
    }
}

/// What the host platform can and cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Phones and tablets: imports run one file at a time.
    #[serde(default)]
    pub constrained_device: bool,

    /// When `false`, cloud tracks are downloaded in full and played from a
    /// local handle instead of being streamed.
    #[serde(default = "default_true")]
    pub inline_streaming_reliable: bool,

    /// Audio stays blocked until the first user gesture.
    #[serde(default)]
    pub requires_user_gesture: bool,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::desktop()
    }
}

impl PlatformProfile {
    pub fn desktop() -> Self {
        Self {
            constrained_device: false,
            inline_streaming_reliable: true,
            requires_user_gesture: false,
        }
    }

    /// Mobile browsers: constrained, gesture-gated and unreliable with inline
    /// streams.
    pub fn mobile_browser() -> Self {
        Self {
            constrained_device: true,
            inline_streaming_reliable: false,
            requires_user_gesture: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Feature flags for optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Request transcripts for imported tracks.
    #[serde(default)]
    pub enable_transcription: bool,

    /// Allow the cloud sync reconciler to run.
    #[serde(default)]
    pub enable_cloud_sync: bool,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks the base URL shape and that every enabled feature has a remote
    /// collaborator to talk to.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.api_base_url {
            if url.trim().is_empty() {
                return Err(Error::Config("API base URL cannot be empty".to_string()));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "API base URL must start with http:// or https://, got '{}'",
                    url
                )));
            }
        }

        let has_base = self.api_base_url.is_some();

        if !has_base && self.track_store.is_none() {
            return Err(Error::Config(
                "No API base URL and no TrackStore provided. \
                 Set .api_base_url() or inject a TrackStore implementation."
                    .to_string(),
            ));
        }

        if self.features.enable_cloud_sync && !has_base && self.upload_proxy.is_none() {
            return Err(Error::Config(
                "Cloud sync enabled but no UploadProxy is reachable. \
                 Disable the feature, set .api_base_url() or inject an UploadProxy."
                    .to_string(),
            ));
        }

        if self.features.enable_transcription && !has_base && self.transcription_api.is_none() {
            return Err(Error::Config(
                "Transcription enabled but no TranscriptionApi is reachable. \
                 Disable the feature, set .api_base_url() or inject a TranscriptionApi."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to build default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "HttpClient implementation is required to reach the track API. \
         Desktop: enable the 'desktop-shims' feature to use the reqwest client. \
         Mobile/Web: inject the platform's native HTTP stack.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_handle_store() -> Result<Arc<dyn LocalHandleStore>> {
    use bridge_desktop::MemoryHandleStore;

    Ok(Arc::new(MemoryHandleStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_handle_store() -> Result<Arc<dyn LocalHandleStore>> {
    Err(capability_missing(
        "LocalHandleStore",
        "LocalHandleStore implementation is required so imported files are playable \
         before upload. Desktop: enable the 'desktop-shims' feature. \
         Web: inject an object-URL backed store.",
    ))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    handle_store: Option<Arc<dyn LocalHandleStore>>,
    track_store: Option<Arc<dyn TrackStore>>,
    upload_proxy: Option<Arc<dyn UploadProxy>>,
    transcription_api: Option<Arc<dyn TranscriptionApi>>,
    clock: Option<Arc<dyn Clock>>,
    platform: PlatformProfile,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Base URL of the track API, without a trailing slash.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.api_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the bearer-token provider (required).
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Sets the audio output device (required).
    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn handle_store(mut self, store: Arc<dyn LocalHandleStore>) -> Self {
        self.handle_store = Some(store);
        self
    }

    pub fn track_store(mut self, store: Arc<dyn TrackStore>) -> Self {
        self.track_store = Some(store);
        self
    }

    pub fn upload_proxy(mut self, proxy: Arc<dyn UploadProxy>) -> Self {
        self.upload_proxy = Some(proxy);
        self
    }

    pub fn transcription_api(mut self, api: Arc<dyn TranscriptionApi>) -> Self {
        self.transcription_api = Some(api);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn platform(mut self, platform: PlatformProfile) -> Self {
        self.platform = platform;
        self
    }

    pub fn enable_transcription(mut self, enabled: bool) -> Self {
        self.features.enable_transcription = enabled;
        self
    }

    pub fn enable_cloud_sync(mut self, enabled: bool) -> Self {
        self.features.enable_cloud_sync = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds and validates the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when `TokenProvider` or `AudioOutput` is absent,
    ///   or when a defaultable bridge is absent without `desktop-shims`
    /// - `Config` when [`CoreConfig::validate`] fails
    pub fn build(self) -> Result<CoreConfig> {
        let token_provider = self.token_provider.ok_or_else(|| {
            capability_missing(
                "TokenProvider",
                "TokenProvider implementation is required to authenticate against the \
                 track API. Inject the host's session/token source.",
            )
        })?;

        let audio_output = self.audio_output.ok_or_else(|| {
            capability_missing(
                "AudioOutput",
                "AudioOutput implementation is required for playback. \
                 Inject the platform audio element/engine adapter.",
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let handle_store = match self.handle_store {
            Some(store) => store,
            None => provide_default_handle_store()?,
        };

        let config = CoreConfig {
            api_base_url: self.api_base_url,
            http_client,
            token_provider,
            audio_output,
            handle_store,
            track_store: self.track_store,
            upload_proxy: self.upload_proxy,
            transcription_api: self.transcription_api,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            platform: self.platform,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
