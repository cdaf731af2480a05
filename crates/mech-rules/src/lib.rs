//! Rule dispatch for mech
//!
//! Events, sensor readings and control state changes are turned into rule
//! keys, most specific first. The [`Dispatcher`] asks the [`RuleEngine`] for
//! each key in turn and invokes the first rule it finds, exactly once.
//!
//! | Trigger | Keys tried, in order (extra arguments) |
//! |---|---|
//! | event `(c, n, a)` | `EVENT.c.n.a` (), `EVENT.c.n` (a), `EVENT.c` (n, a) |
//! | sensor `(l, n, v)` | `SENSOR.l.n` (v), `SENSOR.l` (n, v) |
//! | control `(p, s)` | `POINT.p` (s) |
//!
//! Rules act on the world through a [`RuleHost`]. The engine itself is
//! pluggable; [`RuleBook`] is the YAML implementation.

mod book;
mod dispatcher;
mod engine;
mod error;

pub use book::RuleBook;
pub use dispatcher::{Dispatcher, DispatcherStatus};
pub use engine::{RuleEngine, RuleHost, RuleId};
pub use error::{RuleError, RuleResult};

/// Reason given to the actuator when a rule does not name one
pub const DEFAULT_REASON: &str = "MECH TRIGGER";
