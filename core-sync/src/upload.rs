//! Upload fallback chain: proxy, then embed, then local-only.
//!
//! Raw-byte uploads are all-or-nothing and are not retried here. A failed
//! tier falls through to the next one.

use bridge_traits::{EmbeddedAudio, UploadProxy};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where the bytes ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Stored in object storage under this key.
    Stored { file_key: String },
    /// Small enough to travel inside the track record.
    Embed(EmbeddedAudio),
    /// Nothing left the device.
    LocalOnly { reason: String },
}

impl UploadOutcome {
    pub fn tier(&self) -> &'static str {
        match self {
            UploadOutcome::Stored { .. } => "proxy",
            UploadOutcome::Embed(_) => "embed",
            UploadOutcome::LocalOnly { .. } => "local",
        }
    }
}

#[derive(Clone)]
pub struct UploadChain {
    proxy: Option<Arc<dyn UploadProxy>>,
    embed_size_ceiling: u64,
}

impl UploadChain {
    pub fn new(proxy: Option<Arc<dyn UploadProxy>>, embed_size_ceiling: u64) -> Self {
        Self {
            proxy,
            embed_size_ceiling,
        }
    }

    pub async fn upload(&self, bytes: Bytes, file_name: &str, content_type: &str) -> UploadOutcome {
        let proxy_error = match &self.proxy {
            Some(proxy) => match proxy.upload(bytes.clone(), file_name, content_type).await {
                Ok(file_key) => {
                    debug!(file_name, %file_key, "Stored via upload proxy");
                    return UploadOutcome::Stored { file_key };
                }
                Err(err) => {
                    warn!(file_name, error = %err, "Upload proxy failed");
                    err.to_string()
                }
            },
            None => "no upload proxy configured".to_string(),
        };

        let size = bytes.len() as u64;
        if size <= self.embed_size_ceiling {
            debug!(file_name, size, "Falling back to embedded payload");
            return UploadOutcome::Embed(EmbeddedAudio {
                content_type: content_type.to_string(),
                bytes,
            });
        }

        UploadOutcome::LocalOnly {
            reason: format!(
                "{} ({} bytes exceeds the {} byte embed limit)",
                proxy_error, size, self.embed_size_ceiling
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result;
    use bridge_traits::BridgeError;
    use mockall::mock;

    mock! {
        Proxy {}

        #[async_trait]
        impl UploadProxy for Proxy {
            async fn upload(&self, bytes: Bytes, filename: &str, content_type: &str) -> Result<String>;
        }
    }

    fn failing_proxy() -> Arc<dyn UploadProxy> {
        let mut proxy = MockProxy::new();
        proxy
            .expect_upload()
            .returning(|_, _, _| Err(BridgeError::HttpStatus {
                status: 502,
                message: "bad gateway".to_string(),
            }));
        Arc::new(proxy)
    }

    #[tokio::test]
    async fn test_proxy_success() {
        let mut proxy = MockProxy::new();
        proxy
            .expect_upload()
            .withf(|_, name, mime| name == "a.mp3" && mime == "audio/mpeg")
            .times(1)
            .returning(|_, _, _| Ok("audio/a.mp3".to_string()));
        let chain = UploadChain::new(Some(Arc::new(proxy)), 4);

        let outcome = chain
            .upload(Bytes::from_static(b"0123456789"), "a.mp3", "audio/mpeg")
            .await;
        assert_eq!(
            outcome,
            UploadOutcome::Stored {
                file_key: "audio/a.mp3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_proxy_failure_embeds_small_files() {
        let chain = UploadChain::new(Some(failing_proxy()), 16);
        let outcome = chain
            .upload(Bytes::from_static(b"small"), "a.mp3", "audio/mpeg")
            .await;
        assert_eq!(outcome.tier(), "embed");
    }

    #[tokio::test]
    async fn test_proxy_failure_keeps_large_files_local() {
        let chain = UploadChain::new(Some(failing_proxy()), 4);
        let outcome = chain
            .upload(Bytes::from_static(b"too large"), "a.mp3", "audio/mpeg")
            .await;

        match outcome {
            UploadOutcome::LocalOnly { reason } => assert!(reason.contains("bad gateway")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
