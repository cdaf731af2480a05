//! Core types for mech
//!
//! This crate provides the fundamental types shared by every mech crate:
//! the control status codes, the history stream kinds, the audit event
//! record, the clock abstraction and the bounded status renderer.

mod clock;
mod event;
mod render;
mod status;
mod stream;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use event::AuditEvent;
pub use render::{render_bounded, RenderError};
pub use status::ControlStatus;
pub use stream::StreamKind;

/// Default maximum size of a rendered status document
pub const DEFAULT_STATUS_LIMIT: usize = 65536;

/// Service categories as known to the provider directory
pub mod categories {
    /// Providers that own control points
    pub const CONTROL: &str = "control";

    /// Providers that keep the event and sensor history
    pub const HISTORY: &str = "history";
}
