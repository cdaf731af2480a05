//! Errors in provider status reports

use thiserror::Error;

/// Result type for report processing
pub type ReportResult<T> = Result<T, ReportError>;

/// A provider report that cannot be used
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("JSON syntax error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no {0} data")]
    MissingField(&'static str),
}
