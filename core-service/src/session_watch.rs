//! Token provider wrapper that turns a 401 into a `SessionEvent::Expired`.

use async_trait::async_trait;
use bridge_traits::auth::TokenProvider;
use bridge_traits::error::Result;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use std::sync::Arc;
use tracing::warn;

/// Sits between the REST connector and the host's [`TokenProvider`].
///
/// The host is notified first, then the event goes out on the bus.
pub(crate) struct SessionWatch {
    inner: Arc<dyn TokenProvider>,
    events: EventBus,
}

impl SessionWatch {
    pub(crate) fn new(inner: Arc<dyn TokenProvider>, events: EventBus) -> Self {
        Self { inner, events }
    }
}

#[async_trait]
impl TokenProvider for SessionWatch {
    async fn bearer_token(&self) -> Result<String> {
        self.inner.bearer_token().await
    }

    fn on_session_expired(&self) {
        self.inner.on_session_expired();
        warn!("Session expired, publishing to subscribers");
        let _ = self.events.emit(CoreEvent::Session(SessionEvent::Expired));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::StaticTokenProvider;

    #[tokio::test]
    async fn test_expiry_reaches_host_and_bus() {
        let host = Arc::new(StaticTokenProvider::new("t0k3n"));
        let events = EventBus::new(8);
        let mut receiver = events.subscribe();
        let watch = SessionWatch::new(host.clone(), events);

        assert_eq!(watch.bearer_token().await.unwrap(), "t0k3n");
        watch.on_session_expired();

        assert_eq!(host.expiration_count(), 1);
        assert_eq!(
            receiver.try_recv().unwrap(),
            CoreEvent::Session(SessionEvent::Expired)
        );
        assert!(watch.bearer_token().await.unwrap_err().is_session_expired());
    }
}
