//! Application state management.

use crate::config::{Config, SecurityConfig};
use crate::mcp::McpServer;
use crate::session::{MemorySessionStore, SessionStore};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Live sessions, indexed by session id
    sessions: Arc<dyn SessionStore>,
    /// Protocol server bound to every new session
    server: Arc<McpServer>,
    /// Host/origin allow-lists for the MCP endpoint
    security: SecurityConfig,
}

impl AppState {
    /// Create new application state with the given session store.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        server: Arc<McpServer>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                sessions,
                server,
                security,
            }),
        }
    }

    /// Build state from loaded configuration, using the in-memory store.
    pub fn from_config(config: &Config) -> Self {
        let store = MemorySessionStore::new(config.session.ttl(), config.session.sliding_expiry);
        Self::new(
            Arc::new(store),
            Arc::new(McpServer::new(config.capabilities.clone())),
            config.security.clone(),
        )
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        self.inner.sessions.clone()
    }

    pub fn server(&self) -> Arc<McpServer> {
        self.inner.server.clone()
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.inner.security
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
