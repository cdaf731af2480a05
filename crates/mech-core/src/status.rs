//! Control point status codes

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Status of a control point as seen by this process
///
/// The status is reported to clients as a single character:
/// `u` (unknown), `i` (inactive), `a` (active), `e` (error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlStatus {
    /// Never actuated and never routed
    #[default]
    Unknown,
    /// Known provider, not activated by this process
    Inactive,
    /// Activated by this process
    Active,
    /// The owning provider rejected the last request
    Error,
}

impl ControlStatus {
    /// The single-character code used in status documents
    pub fn code(self) -> char {
        match self {
            ControlStatus::Unknown => 'u',
            ControlStatus::Inactive => 'i',
            ControlStatus::Active => 'a',
            ControlStatus::Error => 'e',
        }
    }

    /// Parse a single-character code
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'u' => Some(ControlStatus::Unknown),
            'i' => Some(ControlStatus::Inactive),
            'a' => Some(ControlStatus::Active),
            'e' => Some(ControlStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for ControlStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.code())
    }
}

impl<'de> Deserialize<'de> for ControlStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = char::deserialize(deserializer)?;
        ControlStatus::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid control status '{code}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for status in [
            ControlStatus::Unknown,
            ControlStatus::Inactive,
            ControlStatus::Active,
            ControlStatus::Error,
        ] {
            assert_eq!(ControlStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(ControlStatus::from_code('x'), None);
    }

    #[test]
    fn test_serializes_as_single_character() {
        let json = serde_json::to_string(&ControlStatus::Active).unwrap();
        assert_eq!(json, "\"a\"");

        let status: ControlStatus = serde_json::from_str("\"e\"").unwrap();
        assert_eq!(status, ControlStatus::Error);
    }
}
