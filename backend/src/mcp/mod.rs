//! MCP (Model Context Protocol) server.
//!
//! The [`McpServer`] owns request/response semantics for every session:
//! the handshake, tool listing and invocation, and resource reads. It is
//! shared by all sessions and reaches back into a session only through the
//! [`Peer`] trait.

pub mod error;
pub mod registry;
pub mod resources;
pub mod server;
pub mod tools;

pub use error::CapabilityError;
pub use registry::{Resource, Tool};
pub use server::McpServer;

use tether_types::{JsonRpcRequest, LogLevel};

/// The session a request arrived on, as seen by the protocol server.
pub trait Peer: Send + Sync {
    fn session_id(&self) -> &str;

    /// Push a notification to the session's open streams.
    ///
    /// Returns the number of streams that received it.
    fn notify(&self, notification: JsonRpcRequest) -> usize;

    /// Minimum level of log notifications the client wants.
    fn log_level(&self) -> LogLevel;

    fn set_log_level(&self, level: LogLevel);
}
