//! Bounded rendering of status documents
//!
//! Status documents are served from a fixed-size budget. A document that
//! does not fit is never truncated: the caller gets an error carrying the
//! size that would have been needed.

use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors that can occur while rendering a status document
#[derive(Debug, Error)]
pub enum RenderError {
    /// The document does not fit in the allowed size
    #[error("status buffer too small (need {needed} bytes, limit {limit})")]
    Overflow { needed: usize, limit: usize },

    /// The document could not be serialized
    #[error("failed to serialize status: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `value` as JSON, failing if the result exceeds `limit` bytes
pub fn render_bounded<T: Serialize + ?Sized>(value: &T, limit: usize) -> Result<String, RenderError> {
    let text = serde_json::to_string(value)?;
    if text.len() > limit {
        error!(needed = text.len(), limit, "STATUS BUFFER TOO SMALL");
        return Err(RenderError::Overflow {
            needed: text.len(),
            limit,
        });
    }
    Ok(text)
}
