//! Session lifecycle for MCP Streamable HTTP connections.
//!
//! A session starts with an `initialize` handshake, is addressed by the
//! `mcp-session-id` header on every later request, and ends on an explicit
//! DELETE or when its store entry expires.

pub mod store;
pub mod transport;

pub use store::{MemorySessionStore, SessionStore};
pub use transport::{PostOutcome, TransportError, TransportHandle};

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque, unguessable session identifier.
///
/// Generated by the server when a handshake succeeds; clients echo it back
/// but never choose it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Spawn the background task that evicts expired sessions.
///
/// Every evicted handle is closed, so its push streams end and its close
/// callback fires even though no client asked for it.
pub fn spawn_reaper(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = store.reap_expired().await;
            if expired.is_empty() {
                continue;
            }
            for (id, handle) in expired {
                info!("Session {} expired, closing transport", id);
                handle.close().await;
            }
            debug!("{} session(s) remain after reaping", store.len().await);
        }
    })
}

/// Close every stored session. Used on shutdown so open streams end.
pub async fn close_all(store: &dyn SessionStore) -> usize {
    let drained = store.drain().await;
    let count = drained.len();
    for (_, handle) in drained {
        handle.close().await;
    }
    if count > 0 {
        info!("Closed {} session(s)", count);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::McpServer;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[tokio::test]
    async fn test_reaper_closes_expired_handles() {
        let store: Arc<dyn SessionStore> =
            Arc::new(MemorySessionStore::new(Duration::from_millis(20), false));
        let server = Arc::new(McpServer::default());
        let id = SessionId::generate();
        let handle = Arc::new(TransportHandle::new(id.clone(), server));
        store.put(id.clone(), handle.clone()).await;

        let reaper = spawn_reaper(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        reaper.abort();

        assert!(handle.is_closed());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_close_all_drains_store() {
        let store = MemorySessionStore::default();
        let server = Arc::new(McpServer::default());
        let mut handles = Vec::new();
        for _ in 0..3 {
            let id = SessionId::generate();
            let handle = Arc::new(TransportHandle::new(id.clone(), server.clone()));
            store.put(id, handle.clone()).await;
            handles.push(handle);
        }

        assert_eq!(close_all(&store).await, 3);
        assert_eq!(store.len().await, 0);
        assert!(handles.iter().all(|h| h.is_closed()));
    }
}
