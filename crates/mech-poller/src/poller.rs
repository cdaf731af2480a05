//! The locked-source polling protocol

use crate::error::PollError;
use crate::payload::{Record, Snapshot};
use crate::{DEFAULT_CYCLE, DEFAULT_TOLERANCE};
use mech_core::{categories, StreamKind};
use mech_directory::Directory;
use mech_transport::{Completion, Outbox, Request, RequestContext, Response, TransportResult};
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn};

/// Where a stream stands with respect to its sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    /// No source, no probe outstanding
    Unlocked,
    /// No source yet, probes sent to every history provider
    Probing,
    /// Committed to one provider
    Locked,
}

/// Poll state, as published in the status document
#[derive(Debug, Serialize)]
pub struct PollerStatus<'a> {
    pub state: PollState,
    pub provider: Option<&'a str>,
    pub latest: i64,
    pub since: i64,
    pub accepted: u64,
}

/// Incremental, deduplicating reader of one history stream
///
/// The cursor is made of the locked provider, the last accepted record id
/// and the time watermark sent as `since`. Record ids only grow while the
/// lock is held; the watermark only moves forward. Losing the lock keeps
/// both numbers, so a provider that is locked again resumes where the
/// stream left off.
pub struct LockedSourcePoller {
    kind: StreamKind,
    locked: Option<String>,
    probing: bool,
    /// Probes of the current cycle still unanswered
    probes_out: usize,
    last_id: i64,
    watermark: i64,
    tolerance: i64,
    cycle: i64,
    next_cycle: i64,
    accepted: u64,
    outbox: Outbox,
}

impl LockedSourcePoller {
    /// Create an unlocked poller that ignores records older than `watermark`
    pub fn new(kind: StreamKind, watermark: i64) -> Self {
        Self {
            kind,
            locked: None,
            probing: false,
            probes_out: 0,
            last_id: 0,
            watermark,
            tolerance: DEFAULT_TOLERANCE,
            cycle: DEFAULT_CYCLE,
            next_cycle: 0,
            accepted: 0,
            outbox: Outbox::new(),
        }
    }

    /// Seconds between two probe cycles
    pub fn with_cycle(mut self, cycle: i64) -> Self {
        self.cycle = cycle;
        self
    }

    /// Distance kept between the watermark and the newest accepted record
    pub fn with_tolerance(mut self, tolerance: i64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn state(&self) -> PollState {
        if self.locked.is_some() {
            PollState::Locked
        } else if self.probing {
            PollState::Probing
        } else {
            PollState::Unlocked
        }
    }

    pub fn locked_provider(&self) -> Option<&str> {
        self.locked.as_deref()
    }

    /// Id of the last accepted record (0 right after locking)
    pub fn last_id(&self) -> i64 {
        self.last_id
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Take the requests issued since the last call
    pub fn drain_requests(&mut self) -> Vec<Request> {
        self.outbox.drain()
    }

    /// Start a probe cycle if one is due
    ///
    /// While locked only the locked provider is probed, even if others are
    /// listed. A cycle that cannot reach any provider drops the lock.
    pub fn background(&mut self, now: i64, directory: &dyn Directory) {
        if now < self.next_cycle {
            return;
        }
        self.next_cycle = now + self.cycle;

        let mut issued = 0;
        for provider in directory.list_providers(categories::HISTORY) {
            if matches!(&self.locked, Some(locked) if *locked != provider) {
                continue;
            }

            let url = format!("{}{}", provider, self.kind.latest_path());
            let context = RequestContext::Probe {
                stream: self.kind,
                provider,
            };
            match self.outbox.submit(&url, context) {
                Ok(()) => issued += 1,
                Err(_) => self.unlock("cannot create request"),
            }
        }

        self.probes_out = issued;
        if issued == 0 {
            self.probing = false;
            self.unlock("no history provider reachable");
        } else if self.locked.is_none() {
            self.probing = true;
        }
    }

    /// Process the completion of a probe or fetch of this stream
    ///
    /// `ready` tells whether the records can be acted upon; a locked stream
    /// that is not ready waits instead of fetching. Returns the records in
    /// the order they were accepted, newest first.
    pub fn handle_completion(&mut self, completion: Completion, ready: bool) -> Vec<Record> {
        match completion.context {
            RequestContext::Probe { stream, provider } if stream == self.kind => {
                self.probes_out = self.probes_out.saturating_sub(1);
                self.handle_probe(&provider, completion.outcome, ready);
                Vec::new()
            }
            RequestContext::Fetch { stream, provider } if stream == self.kind => {
                self.handle_fetch(&provider, completion.outcome)
            }
            other => {
                debug!(stream = %self.kind, context = %other, "Ignoring foreign completion");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self, outcome), fields(stream = %self.kind))]
    fn handle_probe(&mut self, provider: &str, outcome: TransportResult<Response>, ready: bool) {
        if self.is_stale(provider) {
            trace!("Discarding probe from a provider not locked on");
            return;
        }

        let snapshot = match self.decode(outcome) {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fail(provider, e),
        };

        if self.locked.is_none() {
            self.lock(provider, &snapshot.host);
        } else if snapshot.latest == self.last_id {
            trace!(latest = snapshot.latest, "No new record");
            return;
        } else if snapshot.latest < self.last_id {
            info!(
                latest = snapshot.latest,
                last_id = self.last_id,
                "Source restarted, resetting record id"
            );
            self.last_id = 0;
        }

        if !ready {
            debug!("Not ready for processing new records yet");
            return;
        }
        self.fetch(provider);
    }

    #[instrument(skip(self, outcome), fields(stream = %self.kind))]
    fn handle_fetch(&mut self, provider: &str, outcome: TransportResult<Response>) -> Vec<Record> {
        if self.is_stale(provider) {
            trace!("Discarding records from a provider not locked on");
            return Vec::new();
        }

        let snapshot = match self.decode(outcome) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.fail(provider, e);
                return Vec::new();
            }
        };

        if self.locked.is_none() {
            self.lock(provider, &snapshot.host);
        }

        // Newest last on the wire: walk backward so the id test only lets
        // through a strictly increasing sequence.
        let mut accepted = Vec::new();
        let mut newest = None;
        for raw in snapshot.records.iter().rev() {
            let Some(record) = Record::parse(self.kind, raw) else {
                debug!(record = %raw, "Skipping malformed record");
                continue;
            };
            if record.id <= self.last_id {
                continue;
            }
            self.last_id = record.id;
            newest = newest.max(Some(record.timestamp));
            accepted.push(record);
        }

        if let Some(newest) = newest {
            if newest - self.tolerance > self.watermark {
                self.watermark = newest - self.tolerance;
            }
        }

        self.accepted += accepted.len() as u64;
        debug!(
            count = accepted.len(),
            last_id = self.last_id,
            since = self.watermark,
            "Fetched records"
        );
        accepted
    }

    fn decode(&self, outcome: TransportResult<Response>) -> Result<Snapshot, PollError> {
        let response = outcome?;
        Snapshot::decode(self.kind, &response)
    }

    /// A response from another provider than the one locked on
    fn is_stale(&self, provider: &str) -> bool {
        matches!(&self.locked, Some(locked) if locked != provider)
    }

    fn lock(&mut self, provider: &str, host: &str) {
        info!(stream = %self.kind, provider, host, "Locked on new source");
        self.locked = Some(provider.to_string());
        self.probing = false;
        self.last_id = 0;
    }

    fn unlock(&mut self, reason: &str) {
        if let Some(provider) = self.locked.take() {
            warn!(stream = %self.kind, provider = %provider, reason, "Dropped source");
        }
    }

    fn fail(&mut self, provider: &str, error: PollError) {
        if self.locked.as_deref() == Some(provider) {
            self.unlock(&error.to_string());
        } else {
            debug!(stream = %self.kind, provider, error = %error, "Source failed");
            if self.locked.is_none() && self.probes_out == 0 {
                self.probing = false;
            }
        }
    }

    fn fetch(&mut self, provider: &str) {
        let url = format!(
            "{}{}?since={}",
            provider,
            self.kind.fetch_path(),
            self.watermark
        );
        let context = RequestContext::Fetch {
            stream: self.kind,
            provider: provider.to_string(),
        };
        if self.outbox.submit(&url, context).is_err() {
            self.unlock("cannot create request");
        }
    }

    pub fn status(&self) -> PollerStatus<'_> {
        PollerStatus {
            state: self.state(),
            provider: self.locked.as_deref(),
            latest: self.last_id,
            since: self.watermark,
            accepted: self.accepted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_poller_is_unlocked() {
        let poller = LockedSourcePoller::new(StreamKind::Events, 1_000);
        assert_eq!(poller.state(), PollState::Unlocked);
        assert_eq!(poller.watermark(), 1_000);
        assert_eq!(poller.last_id(), 0);
    }

    #[test]
    fn test_status_serializes() {
        let poller = LockedSourcePoller::new(StreamKind::Sensors, 1_000);
        let json = serde_json::to_value(poller.status()).unwrap();
        assert_eq!(json["state"], "unlocked");
        assert_eq!(json["provider"], serde_json::Value::Null);
        assert_eq!(json["since"], 1_000);
    }
}
