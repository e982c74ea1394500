//! Shared types for the Tether MCP server.
//!
//! This crate contains the JSON-RPC 2.0 wire types and the MCP protocol
//! payloads exchanged between clients and the backend.

/// Default port for the Tether backend server.
pub const DEFAULT_PORT: u16 = 3001;

/// Header carrying the session identifier, in both directions.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Header carrying the negotiated protocol version on follow-up requests.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

pub mod jsonrpc;
pub mod mcp;

pub use jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcPayload, JsonRpcRequest, JsonRpcResponse};
pub use mcp::{
    negotiate_protocol_version, CallToolParams, InitializeParams, LogLevel, ReadResourceParams,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
