//! API handlers.

pub mod mcp;
pub mod security;
