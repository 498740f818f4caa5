//! Bearer-token provider.
//!
//! Token issuance and refresh belong to the host. The core only asks for the
//! current token and reports when the remote store rejected it.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token for the remote store.
    async fn bearer_token(&self) -> Result<String>;

    /// Called once per rejected request (HTTP 401). Hosts typically clear the
    /// cached token and prompt the user to sign in again.
    fn on_session_expired(&self) {}
}
