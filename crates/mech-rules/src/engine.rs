//! The rule engine and rule host seams

use crate::error::RuleResult;

/// Opaque handle to a rule, valid for the engine that returned it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleId(pub usize);

/// What a rule can do to the world
pub trait RuleHost {
    /// Turn a control point on, for `pulse` seconds (0: until cancelled)
    ///
    /// Returns false when the point has no known provider.
    fn start(&mut self, point: &str, pulse: i64, reason: &str) -> bool;

    /// Turn one control point off, or with `None` every point this process
    /// started with a pulse that has not expired yet
    fn cancel(&mut self, point: Option<&str>, reason: &str);

    /// Last known state of a control point, empty if never observed
    fn state(&mut self, point: &str) -> String;

    /// Record an audit event
    fn event(&mut self, category: &str, name: &str, action: &str, text: &str);
}

/// A store of rules addressed by key
pub trait RuleEngine: Send {
    /// Whether the rules are loaded and can be evaluated
    fn ready(&self) -> bool;

    /// Find the rule defined for `key`
    fn lookup(&self, key: &str) -> Option<RuleId>;

    /// Run a rule with its positional arguments
    fn invoke(&mut self, rule: RuleId, args: &[&str], host: &mut dyn RuleHost) -> RuleResult<()>;

    /// Periodic housekeeping, `now` in seconds
    fn background(&mut self, _now: i64) {}

    /// Number of rules currently defined
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
