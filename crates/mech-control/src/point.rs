//! Control point record

use mech_core::ControlStatus;

/// A named actuator, as known to this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPoint {
    pub name: String,
    /// Base URL of the owning provider, empty until discovered
    pub provider: String,
    /// Last reported state, `None` until first observed
    pub state: Option<String>,
    pub status: ControlStatus,
    /// End of the current pulse, in seconds
    pub deadline: Option<i64>,
}

impl ControlPoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: String::new(),
            state: None,
            status: ControlStatus::Unknown,
            deadline: None,
        }
    }

    /// Whether a provider is known for this point
    pub fn is_routed(&self) -> bool {
        !self.provider.is_empty()
    }

    /// Seconds left in the current pulse, 0 unless active with a deadline
    pub fn remaining(&self, now: i64) -> i64 {
        match (self.status, self.deadline) {
            (ControlStatus::Active, Some(deadline)) => (deadline - now).max(0),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_point_is_unknown() {
        let point = ControlPoint::new("pump");
        assert_eq!(point.status, ControlStatus::Unknown);
        assert!(point.state.is_none());
        assert!(!point.is_routed());
    }

    #[test]
    fn test_remaining() {
        let mut point = ControlPoint::new("pump");
        point.deadline = Some(110);
        assert_eq!(point.remaining(100), 0);

        point.status = ControlStatus::Active;
        assert_eq!(point.remaining(100), 10);
        assert_eq!(point.remaining(120), 0);

        point.deadline = None;
        assert_eq!(point.remaining(100), 0);
    }
}
