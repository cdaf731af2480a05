//! Provider directory for mech
//!
//! The directory answers two questions about a service category: which
//! providers currently offer it, and whether that membership changed since
//! a given time. The real discovery protocol is an external collaborator
//! reached through the [`Directory`] trait; [`StaticDirectory`] is the
//! configuration-backed implementation.
//!
//! [`ProviderCache`] is the snapshot of one category that the control
//! discovery walks. It is rebuilt from scratch on every refresh.

mod cache;
mod directory;

pub use cache::ProviderCache;
pub use directory::{Directory, SharedDirectory, StaticDirectory};
