//! Control points for mech
//!
//! This crate keeps track of every control point ever referenced, learns
//! which provider owns each of them through periodic discovery, and turns
//! rule requests into start/cancel commands sent to that provider.
//!
//! [`Controls`] is the single owner of that state. It is also the
//! [`RuleHost`](mech_rules::RuleHost) that rules act through, so a state
//! change reported by a provider can run a rule which in turn starts or
//! cancels other points.

mod controls;
mod duration;
mod error;
mod point;
mod registry;

pub use controls::{Controls, ControlsStatus};
pub use duration::printable_duration;
pub use error::{ReportError, ReportResult};
pub use point::ControlPoint;
pub use registry::ControlRegistry;
