//! Discovery, actuation and pulse expiry

use crate::duration::printable_duration;
use crate::error::{ReportError, ReportResult};
use crate::registry::ControlRegistry;
use mech_core::{categories, AuditEvent, ControlStatus, SharedClock};
use mech_directory::{ProviderCache, SharedDirectory};
use mech_event_bus::SharedEventBus;
use mech_rules::{Dispatcher, RuleHost};
use mech_transport::{
    Completion, Outbox, Request, RequestContext, Response, TransportError, TransportResult, Url,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, instrument, trace, warn};

/// Category of the audit events emitted for control points
const AUDIT_CATEGORY: &str = "CONTROL";

/// Owner of the control point registry and of the control provider list
pub struct Controls {
    registry: ControlRegistry,
    providers: ProviderCache,
    directory: SharedDirectory,
    outbox: Outbox,
    bus: SharedEventBus,
    clock: SharedClock,
    /// Set when some point may still have a pending pulse deadline
    pulses_pending: bool,
    /// Providers whose last discovery failed
    failing: HashSet<String>,
}

/// Control section of the status document
#[derive(Debug, Serialize)]
pub struct ControlsStatus<'a> {
    pub servers: &'a [String],
    /// `[name, status code, provider, seconds remaining]`
    pub controls: Vec<(&'a str, ControlStatus, &'a str, i64)>,
}

impl Controls {
    pub fn new(
        directory: SharedDirectory,
        bus: SharedEventBus,
        clock: SharedClock,
        discovery_interval: i64,
    ) -> Self {
        Self {
            registry: ControlRegistry::new(),
            providers: ProviderCache::new(categories::CONTROL, discovery_interval),
            directory,
            outbox: Outbox::new(),
            bus,
            clock,
            pulses_pending: false,
            failing: HashSet::new(),
        }
    }

    /// True once at least one control point is known
    pub fn ready(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    /// Control providers found by the last discovery
    pub fn providers(&self) -> &[String] {
        self.providers.providers()
    }

    /// Take the requests issued since the last call
    pub fn drain_requests(&mut self) -> Vec<Request> {
        self.outbox.drain()
    }

    /// Make the next background pass rescan the providers
    pub fn force_discovery(&mut self) {
        debug!("Forcing control discovery");
        self.providers.invalidate();
    }

    /// Expire pulses, then run discovery if due
    pub fn background(&mut self) {
        let now = self.clock.now_secs();
        self.expire_pulses(now);
        self.discover(now);
    }

    /// Mark pulsed points inactive once their deadline has passed
    ///
    /// No request is sent: the provider ends the pulse on its own.
    fn expire_pulses(&mut self, now: i64) {
        if !self.pulses_pending {
            return;
        }
        self.pulses_pending = false;

        for point in self.registry.iter_mut() {
            let Some(deadline) = point.deadline else {
                continue;
            };
            if deadline <= now {
                debug!(point = %point.name, "Pulse ended");
                point.deadline = None;
                point.status = ControlStatus::Inactive;
            } else {
                self.pulses_pending = true;
            }
        }
    }

    fn discover(&mut self, now: i64) {
        if !self.providers.refresh(self.directory.as_ref(), now) {
            return;
        }

        trace!(count = self.providers.providers().len(), "Proceeding with discovery");
        for provider in self.providers.providers() {
            let url = format!("{}/status", provider);
            let context = RequestContext::Discovery {
                provider: provider.clone(),
            };
            // A URL that cannot be built is logged by the outbox and retried next scan
            let _ = self.outbox.submit(&url, context);
        }
    }

    /// Fold a provider's status report into the registry
    ///
    /// Every point listed is routed to `provider`. A state that differs from
    /// the one last seen runs the point's rule before being stored; a first
    /// observation is stored silently. Returns the number of points listed.
    #[instrument(skip(self, body, dispatcher))]
    pub fn apply_provider_report(
        &mut self,
        provider: &str,
        body: &str,
        dispatcher: &mut Dispatcher,
    ) -> ReportResult<usize> {
        let report: Value = serde_json::from_str(body)?;
        let points = report
            .pointer("/control/status")
            .and_then(Value::as_object)
            .ok_or(ReportError::MissingField("control status"))?;

        for (name, entry) in points {
            let reported = entry.get("state").map(json_text);

            let point = self.registry.find_or_create(name);
            let rerouted = point.provider != provider;
            if rerouted {
                point.provider = provider.to_string();
                point.status = ControlStatus::Inactive;
            }

            let changed = match reported {
                Some(state) if point.state.is_none() => {
                    point.state = Some(state);
                    None
                }
                Some(state) if point.state.as_deref() != Some(state.as_str()) => Some(state),
                _ => None,
            };

            if rerouted {
                self.audit(AUDIT_CATEGORY, name, "ROUTE", &format!("TO {}", provider));
            }

            if let Some(state) = changed {
                debug!(point = %name, state = %state, "Control state changed");
                dispatcher.trigger_control(self, name, &state);
                if let Some(point) = self.registry.get_mut(name) {
                    point.state = Some(state);
                }
            }
        }

        Ok(points.len())
    }

    /// Handle the completion of a discovery or actuation request
    pub fn handle_completion(&mut self, completion: Completion, dispatcher: &mut Dispatcher) {
        match completion.context {
            RequestContext::Discovery { provider } => {
                self.handle_discovery(&provider, completion.outcome, dispatcher)
            }
            RequestContext::Actuation { point, provider } => {
                self.handle_actuation(&point, &provider, completion.outcome, dispatcher)
            }
            other => debug!(context = %other, "Ignoring non-control completion"),
        }
    }

    fn handle_discovery(
        &mut self,
        provider: &str,
        outcome: TransportResult<Response>,
        dispatcher: &mut Dispatcher,
    ) {
        let result = match outcome {
            Ok(response) if response.is_success() => self
                .apply_provider_report(provider, &response.body, dispatcher)
                .map_err(|e| e.to_string()),
            Ok(response) => Err(format!("HTTP code {}", response.status)),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(count) => {
                trace!(provider, count, "Discovery report applied");
                if self.failing.remove(provider) {
                    info!(provider, "Control provider recovered");
                }
            }
            Err(reason) => {
                if self.failing.insert(provider.to_string()) {
                    warn!(provider, %reason, "Control discovery failed");
                } else {
                    debug!(provider, %reason, "Control discovery still failing");
                }
            }
        }
    }

    fn handle_actuation(
        &mut self,
        name: &str,
        provider: &str,
        outcome: TransportResult<Response>,
        dispatcher: &mut Dispatcher,
    ) {
        let failure = match outcome {
            Ok(response) if response.is_success() => self
                .apply_provider_report(provider, &response.body, dispatcher)
                .err()
                .map(|e| e.to_string()),
            Ok(response) => Some(format!("HTTP code {}", response.status)),
            Err(e) => Some(e.to_string()),
        };

        let Some(reason) = failure else {
            return;
        };
        let Some(point) = self.registry.get_mut(name) else {
            return;
        };
        if point.status != ControlStatus::Error {
            warn!(point = %name, provider, %reason, "Control request failed");
        }
        point.status = ControlStatus::Error;
        point.deadline = None;
    }

    /// Queue an off command; returns false if no request could be built
    fn stop(&mut self, name: &str, provider: &str, reason: &str) -> bool {
        if provider.is_empty() {
            return false;
        }
        let url = match set_url(provider, name, "off", None, reason) {
            Ok(url) => url,
            Err(e) => {
                warn!(point = %name, error = %e, "Cannot create request");
                return false;
            }
        };
        self.outbox.submit_url(
            url,
            RequestContext::Actuation {
                point: name.to_string(),
                provider: provider.to_string(),
            },
        );
        if let Some(point) = self.registry.get_mut(name) {
            point.status = ControlStatus::Inactive;
        }
        true
    }

    fn audit(&self, category: &str, name: &str, action: &str, description: &str) {
        self.bus
            .fire(AuditEvent::new(category, name, action, description).at(self.clock.now()));
    }

    pub fn status(&self) -> ControlsStatus<'_> {
        let now = self.clock.now_secs();
        ControlsStatus {
            servers: self.providers.providers(),
            controls: self
                .registry
                .iter()
                .map(|p| (p.name.as_str(), p.status, p.provider.as_str(), p.remaining(now)))
                .collect(),
        }
    }
}

impl RuleHost for Controls {
    fn start(&mut self, name: &str, pulse: i64, reason: &str) -> bool {
        let now = self.clock.now_secs();
        debug!(point = %name, pulse, "Start");

        let provider = self.registry.find_or_create(name).provider.clone();
        if provider.is_empty() {
            self.audit(AUDIT_CATEGORY, name, "UNKNOWN", "");
            return false;
        }

        let description = if pulse > 0 {
            format!(
                "FOR {} USING {} ({})",
                printable_duration(pulse),
                provider,
                reason
            )
        } else {
            format!("USING {} ({})", provider, reason)
        };
        self.audit(AUDIT_CATEGORY, name, "ACTIVATED", &description);

        let url = match set_url(&provider, name, "on", Some(pulse), reason) {
            Ok(url) => url,
            Err(e) => {
                warn!(point = %name, error = %e, "Cannot create request");
                return false;
            }
        };
        self.outbox.submit_url(
            url,
            RequestContext::Actuation {
                point: name.to_string(),
                provider,
            },
        );

        let point = self.registry.find_or_create(name);
        if pulse > 0 {
            point.deadline = Some(now + pulse);
        }
        point.status = ControlStatus::Active;
        self.pulses_pending = true;
        true
    }

    fn cancel(&mut self, name: Option<&str>, reason: &str) {
        let Some(name) = name else {
            debug!("Cancel all pulsed controls");
            let pulsed: Vec<(String, String)> = self
                .registry
                .iter()
                .filter(|p| p.deadline.is_some())
                .map(|p| (p.name.clone(), p.provider.clone()))
                .collect();

            for (name, provider) in pulsed {
                self.stop(&name, &provider, reason);
                if let Some(point) = self.registry.get_mut(&name) {
                    point.deadline = None;
                }
            }
            self.pulses_pending = false;
            return;
        };

        let provider = self.registry.find_or_create(name).provider.clone();
        if provider.is_empty() {
            debug!(point = %name, "Cannot cancel, no provider");
            return;
        }

        self.audit(
            AUDIT_CATEGORY,
            name,
            "CANCEL",
            &format!("USING {} ({})", provider, reason),
        );
        self.stop(name, &provider, reason);
        if let Some(point) = self.registry.get_mut(name) {
            point.deadline = None;
        }
    }

    fn state(&mut self, name: &str) -> String {
        self.registry
            .find_or_create(name)
            .state
            .clone()
            .unwrap_or_default()
    }

    fn event(&mut self, category: &str, name: &str, action: &str, text: &str) {
        self.audit(category, name, action, text);
    }
}

/// `{provider}/set?point=..&state=..[&pulse=..][&cause=..]`
fn set_url(
    provider: &str,
    name: &str,
    state: &str,
    pulse: Option<i64>,
    reason: &str,
) -> TransportResult<Url> {
    let base = format!("{}/set", provider);
    let mut url = Url::parse(&base).map_err(|e| TransportError::InvalidUrl {
        url: base.clone(),
        reason: e.to_string(),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("point", name);
        query.append_pair("state", state);
        if let Some(pulse) = pulse {
            query.append_pair("pulse", &pulse.to_string());
        }
        if !reason.is_empty() {
            query.append_pair("cause", reason);
        }
    }
    Ok(url)
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_url() {
        let url = set_url("http://relay1:8080/relay", "pump", "on", Some(30), "rain delay").unwrap();
        assert_eq!(
            url.as_str(),
            "http://relay1:8080/relay/set?point=pump&state=on&pulse=30&cause=rain+delay"
        );

        let url = set_url("http://relay1", "pump", "off", None, "").unwrap();
        assert_eq!(url.as_str(), "http://relay1/set?point=pump&state=off");
    }

    #[test]
    fn test_set_url_rejects_bad_provider() {
        assert!(set_url("relay1", "pump", "on", Some(0), "x").is_err());
    }

    #[test]
    fn test_json_text() {
        assert_eq!(json_text(&Value::String("on".to_string())), "on");
        assert_eq!(json_text(&serde_json::json!(1)), "1");
        assert_eq!(json_text(&serde_json::json!(true)), "true");
    }
}
