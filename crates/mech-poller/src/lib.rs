//! Incremental ingestion of the history streams
//!
//! Each [`StreamKind`](mech_core::StreamKind) gets its own
//! [`LockedSourcePoller`]. A poller commits to one history provider at a
//! time, asks it for its latest record id every cycle, fetches what is new
//! since its time watermark, and hands back only the records it has not
//! accepted before. When the provider stops answering properly the lock is
//! dropped and the next provider to answer a probe takes over.

mod error;
mod payload;
mod poller;

pub use error::{PollError, PollResult};
pub use payload::Record;
pub use poller::{LockedSourcePoller, PollState, PollerStatus};

/// Seconds between two probe cycles
pub const DEFAULT_CYCLE: i64 = 2;

/// Distance kept between the watermark and the newest accepted timestamp
pub const DEFAULT_TOLERANCE: i64 = 5;
