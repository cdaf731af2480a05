//! Audit events
//!
//! Audit events are the human-readable trail of what the automation did:
//! a control point was routed, activated or cancelled, or a rule reported
//! something. They are fired on the event bus and written to the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(category, name, action, description)` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Category of the event (e.g. "CONTROL")
    pub category: String,

    /// Name of the object the event is about
    pub name: String,

    /// What happened (e.g. "ACTIVATED")
    pub action: String,

    /// Free-form details
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// When the event was recorded
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Create a new event stamped with the current time
    pub fn new(
        category: impl Into<String>,
        name: impl Into<String>,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            action: action.into(),
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.category, self.name, self.action)?;
        if !self.description.is_empty() {
            write!(f, " {}", self.description)?;
        }
        Ok(())
    }
}
