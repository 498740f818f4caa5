//! Fixed bearer token for desktop sessions and tests.

use async_trait::async_trait;
use bridge_traits::{
    auth::TokenProvider,
    error::{BridgeError, Result},
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Serves a token set by the host until the remote store rejects it.
///
/// After a 401 the token is cleared and every call fails with
/// `SessionExpired` until [`set_token`](StaticTokenProvider::set_token) is
/// called again.
pub struct StaticTokenProvider {
    token: RwLock<Option<String>>,
    expirations: AtomicU32,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            expirations: AtomicU32::new(0),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// How many times the remote store reported the session as expired.
    pub fn expiration_count(&self) -> u32 {
        self.expirations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String> {
        self.token.read().clone().ok_or(BridgeError::SessionExpired)
    }

    fn on_session_expired(&self) {
        self.expirations.fetch_add(1, Ordering::SeqCst);
        if self.token.write().take().is_some() {
            warn!("Bearer token rejected by remote store, sign-in required");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_cleared_on_expiry() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.bearer_token().await.unwrap(), "abc");

        provider.on_session_expired();
        assert!(provider.bearer_token().await.unwrap_err().is_session_expired());
        assert_eq!(provider.expiration_count(), 1);

        provider.set_token("def");
        assert_eq!(provider.bearer_token().await.unwrap(), "def");
    }
}
