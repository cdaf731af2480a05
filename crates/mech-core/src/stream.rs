//! History streams served by the history providers

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the incremental history streams ingested from a history provider
///
/// Both streams follow the same protocol and only differ by their endpoints
/// and by the name of the record array in the response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Events: `(timestamp, category, name, action, ..., id)`
    Events,
    /// Sensor readings: `(timestamp, location, name, value, ..., id)`
    Sensors,
}

impl StreamKind {
    /// Path of the "latest id" snapshot, relative to the provider URL
    pub fn latest_path(self) -> &'static str {
        match self {
            StreamKind::Events => "/log/events/latest",
            StreamKind::Sensors => "/log/sensor/data/latest",
        }
    }

    /// Path of the incremental fetch, relative to the provider URL
    pub fn fetch_path(self) -> &'static str {
        match self {
            StreamKind::Events => "/log/events",
            StreamKind::Sensors => "/log/sensor/data",
        }
    }

    /// Name of the record array under `saga` in a fetch response
    pub fn records_field(self) -> &'static str {
        match self {
            StreamKind::Events => "events",
            StreamKind::Sensors => "sensor",
        }
    }

    /// Name used in logs and status documents
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Events => "events",
            StreamKind::Sensors => "sensors",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
