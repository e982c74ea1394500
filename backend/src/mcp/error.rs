//! Capability execution errors.

use tether_types::jsonrpc::error_codes;
use thiserror::Error;

/// Error raised by a tool or resource handler.
///
/// Scoped to a single request: it becomes a JSON-RPC error response and the
/// session stays usable.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status} for {url}")]
    Upstream { url: String, status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CapabilityError {
    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            CapabilityError::UnknownTool(_)
            | CapabilityError::ResourceNotFound(_)
            | CapabilityError::InvalidArguments(_) => error_codes::INVALID_PARAMS,
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    /// Whether the caller sent something unusable, as opposed to the
    /// capability failing while running.
    pub fn is_client_error(&self) -> bool {
        self.code() == error_codes::INVALID_PARAMS
    }
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
