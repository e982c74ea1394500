//! Time-bounded session store.
//!
//! Maps session identifiers to shared transport handles. The store holds the
//! owning reference; request tasks borrow a clone of the `Arc` for the
//! duration of one request.

use super::{SessionId, TransportHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error};

/// Default session lifetime, measured from insertion.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Storage for live sessions.
///
/// All mutation of session entries goes through this trait. Implementations
/// must be safe to call from many request tasks at once.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up a live session. Expired entries are reported as absent.
    async fn get(&self, id: &str) -> Option<Arc<TransportHandle>>;

    /// Insert or overwrite a session, restarting its expiry clock.
    async fn put(&self, id: SessionId, handle: Arc<TransportHandle>);

    /// Remove a session. Removing an unknown identifier is a no-op.
    async fn remove(&self, id: &str) -> Option<Arc<TransportHandle>>;

    /// Remove and return every expired entry.
    async fn reap_expired(&self) -> Vec<(SessionId, Arc<TransportHandle>)>;

    /// Remove and return every entry.
    async fn drain(&self) -> Vec<(SessionId, Arc<TransportHandle>)>;

    /// Number of stored entries, including expired ones not yet reaped.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

struct SessionEntry {
    handle: Arc<TransportHandle>,
    inserted_at: Instant,
}

impl SessionEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

/// In-memory session store (sessions are lost on restart).
#[derive(Clone)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    ttl: Duration,
    /// Refresh the expiry clock on every successful lookup.
    sliding_expiry: bool,
}

impl MemorySessionStore {
    /// Create a store with the given TTL and expiry policy.
    pub fn new(ttl: Duration, sliding_expiry: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            sliding_expiry,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL, false)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> Option<Arc<TransportHandle>> {
        if self.sliding_expiry {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(id)?;
            if entry.is_expired(self.ttl) {
                return None;
            }
            entry.inserted_at = Instant::now();
            return Some(entry.handle.clone());
        }

        let entries = self.entries.read().await;
        entries
            .get(id)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.handle.clone())
    }

    async fn put(&self, id: SessionId, handle: Arc<TransportHandle>) {
        let mut entries = self.entries.write().await;
        let entry = SessionEntry {
            handle: handle.clone(),
            inserted_at: Instant::now(),
        };
        if let Some(previous) = entries.insert(id.clone(), entry) {
            if !Arc::ptr_eq(&previous.handle, &handle) && !previous.is_expired(self.ttl) {
                error!("Session id collision: {} replaced a live transport", id);
            }
        }
        debug!("Stored session {} ({} total)", id, entries.len());
    }

    async fn remove(&self, id: &str) -> Option<Arc<TransportHandle>> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(id).map(|entry| entry.handle);
        if removed.is_some() {
            debug!("Removed session {}", id);
        }
        removed
    }

    async fn reap_expired(&self) -> Vec<(SessionId, Arc<TransportHandle>)> {
        let mut entries = self.entries.write().await;
        let expired: Vec<SessionId> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.handle)))
            .collect()
    }

    async fn drain(&self) -> Vec<(SessionId, Arc<TransportHandle>)> {
        let mut entries = self.entries.write().await;
        entries
            .drain()
            .map(|(id, entry)| (id, entry.handle))
            .collect()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
