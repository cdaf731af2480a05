//! Transport error types

use thiserror::Error;

/// Errors raised while building or executing a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request URL could not be built
    #[error("invalid request URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request could not be completed (connection, timeout, redirect loop)
    #[error("request to '{url}' failed: {reason}")]
    Request { url: String, reason: String },

    /// The response body could not be read
    #[error("cannot read response body from '{url}': {reason}")]
    Body { url: String, reason: String },

    /// The HTTP client could not be created
    #[error("cannot create HTTP client: {0}")]
    Client(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
