//! Specificity-ordered rule dispatch

use crate::engine::{RuleEngine, RuleHost};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

/// Picks and runs the single most specific rule for each trigger
pub struct Dispatcher {
    engine: Box<dyn RuleEngine>,
    /// Last action seen per `category.name`
    last_actions: IndexMap<String, String>,
    fired: u64,
    failed: u64,
    unmatched: u64,
}

/// Dispatcher bookkeeping, as published in the status document
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatus<'a> {
    pub ready: bool,
    pub rules: usize,
    pub fired: u64,
    pub failed: u64,
    pub unmatched: u64,
    pub last: &'a IndexMap<String, String>,
}

impl Dispatcher {
    pub fn new(engine: Box<dyn RuleEngine>) -> Self {
        Self {
            engine,
            last_actions: IndexMap::new(),
            fired: 0,
            failed: 0,
            unmatched: 0,
        }
    }

    /// Whether the rule engine can be evaluated
    pub fn ready(&self) -> bool {
        self.engine.ready()
    }

    /// Let the engine do its periodic housekeeping
    pub fn background(&mut self, now: i64) {
        self.engine.background(now);
    }

    /// The last action recorded for `(category, name)`
    pub fn last_action(&self, category: &str, name: &str) -> Option<&str> {
        self.last_actions
            .get(&format!("{}.{}", category, name))
            .map(String::as_str)
    }

    /// Dispatch an event
    #[instrument(skip(self, host))]
    pub fn trigger_event(
        &mut self,
        host: &mut dyn RuleHost,
        category: &str,
        name: &str,
        action: &str,
    ) -> bool {
        self.last_actions
            .insert(format!("{}.{}", category, name), action.to_string());

        let candidates: [(String, &[&str]); 3] = [
            (format!("EVENT.{}.{}.{}", category, name, action), &[]),
            (format!("EVENT.{}.{}", category, name), &[action]),
            (format!("EVENT.{}", category), &[name, action]),
        ];
        self.dispatch(host, &candidates)
    }

    /// Dispatch a sensor reading
    #[instrument(skip(self, host))]
    pub fn trigger_sensor(
        &mut self,
        host: &mut dyn RuleHost,
        location: &str,
        name: &str,
        value: &str,
    ) -> bool {
        let candidates: [(String, &[&str]); 2] = [
            (format!("SENSOR.{}.{}", location, name), &[value]),
            (format!("SENSOR.{}", location), &[name, value]),
        ];
        self.dispatch(host, &candidates)
    }

    /// Dispatch a control point state change
    #[instrument(skip(self, host))]
    pub fn trigger_control(&mut self, host: &mut dyn RuleHost, point: &str, state: &str) -> bool {
        let candidates: [(String, &[&str]); 1] = [(format!("POINT.{}", point), &[state])];
        self.dispatch(host, &candidates)
    }

    /// Run the first defined rule among `candidates`
    ///
    /// A rule that fails still consumes the trigger: coarser keys are not
    /// tried after it.
    fn dispatch(&mut self, host: &mut dyn RuleHost, candidates: &[(String, &[&str])]) -> bool {
        for (key, args) in candidates {
            let Some(rule) = self.engine.lookup(key) else {
                trace!(key = %key, "No rule");
                continue;
            };

            debug!(key = %key, ?args, "Invoking rule");
            return match self.engine.invoke(rule, args, host) {
                Ok(()) => {
                    self.fired += 1;
                    true
                }
                Err(e) => {
                    self.failed += 1;
                    warn!(key = %key, error = %e, "Rule failed");
                    false
                }
            };
        }

        self.unmatched += 1;
        false
    }

    pub fn status(&self) -> DispatcherStatus<'_> {
        DispatcherStatus {
            ready: self.engine.ready(),
            rules: self.engine.len(),
            fired: self.fired,
            failed: self.failed,
            unmatched: self.unmatched,
            last: &self.last_actions,
        }
    }
}
