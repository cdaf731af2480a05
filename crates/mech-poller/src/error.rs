//! Poller error types

use mech_transport::TransportError;
use thiserror::Error;

/// Result type for poller operations
pub type PollResult<T> = Result<T, PollError>;

/// Why a history response could not be used
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("HTTP code {0}")]
    Status(u16),

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("'{0}' is not an array")]
    NotAnArray(&'static str),
}
