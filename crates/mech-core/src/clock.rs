//! Time sources
//!
//! Everything in mech runs on one logical clock. Production code reads the
//! system time; tests drive a [`MockClock`] by hand.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, RwLock};

/// A source of the current time
pub trait Clock: Send + Sync {
    /// The current time
    fn now(&self) -> DateTime<Utc>;

    /// The current time in whole seconds since the epoch
    fn now_secs(&self) -> i64 {
        self.now().timestamp()
    }

    /// The current time in milliseconds since the epoch
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Thread-safe handle to a clock
pub type SharedClock = Arc<dyn Clock>;

/// The wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A controllable time source for testing
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock starting at the current time
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a mock clock starting at a specific time
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(time)),
        }
    }

    /// Create a mock clock starting at a number of seconds since the epoch
    pub fn at_secs(secs: i64) -> Self {
        Self::at(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    /// Set the current mock time
    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = time;
    }

    /// Advance time by a duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }

    /// Advance time by seconds
    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}
