//! The mech orchestrator
//!
//! [`Mech`] owns every piece of state: the control registry, the rule
//! dispatcher and the two history pollers. It never performs I/O itself.
//! The runtime calls [`Mech::tick`] periodically, feeds request completions
//! to [`Mech::complete`] and executes whatever [`Mech::drain_requests`]
//! returns.

use mech_config::{MechConfig, TimingConfig};
use mech_control::{Controls, ControlsStatus};
use mech_core::{render_bounded, SharedClock, StreamKind};
use mech_directory::{SharedDirectory, StaticDirectory};
use mech_event_bus::SharedEventBus;
use mech_poller::{LockedSourcePoller, PollerStatus, Record};
use mech_rules::{Dispatcher, DispatcherStatus, RuleBook, RuleEngine};
use mech_transport::{Completion, Request};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Mech {
    host: String,
    clock: SharedClock,
    directory: SharedDirectory,
    controls: Controls,
    dispatcher: Dispatcher,
    events: LockedSourcePoller,
    sensors: LockedSourcePoller,
    status_limit: usize,
}

#[derive(Serialize)]
struct StatusDocument<'a> {
    host: &'a str,
    timestamp: i64,
    #[serde(flatten)]
    controls: ControlsStatus<'a>,
    rules: DispatcherStatus<'a>,
    events: PollerStatus<'a>,
    sensors: PollerStatus<'a>,
}

impl Mech {
    pub fn new(
        host: impl Into<String>,
        clock: SharedClock,
        directory: SharedDirectory,
        engine: Box<dyn RuleEngine>,
        bus: SharedEventBus,
        timing: &TimingConfig,
        status_limit: usize,
    ) -> Self {
        // History older than the start of this process is not replayed
        let watermark = clock.now_millis();
        let poller = |kind| {
            LockedSourcePoller::new(kind, watermark)
                .with_cycle(timing.poll_interval_secs)
                .with_tolerance(timing.watermark_tolerance)
        };

        Self {
            host: host.into(),
            controls: Controls::new(
                directory.clone(),
                bus,
                clock.clone(),
                timing.discovery_interval_secs,
            ),
            dispatcher: Dispatcher::new(engine),
            events: poller(StreamKind::Events),
            sensors: poller(StreamKind::Sensors),
            clock,
            directory,
            status_limit,
        }
    }

    /// Build the orchestrator described by a loaded configuration
    pub fn from_config(
        config: &MechConfig,
        config_dir: &Path,
        clock: SharedClock,
        bus: SharedEventBus,
    ) -> Self {
        let directory = Arc::new(StaticDirectory::from_config(
            &config.directory,
            clock.now_secs(),
        ));
        // The rule book resolves `config.rules` against `config_dir` itself
        let rules = RuleBook::from_file(
            config_dir,
            config.rules.clone(),
            config.timing.rules_reload_secs,
        );
        let host = config.name.clone().unwrap_or_else(system_host_name);
        info!(host = %host, "Rule book is {:?}", config.rules_path(config_dir));

        Self::new(
            host,
            clock,
            directory,
            Box::new(rules),
            bus,
            &config.timing,
            config.status_limit,
        )
    }

    /// Run one background pass
    pub fn tick(&mut self) {
        let now = self.clock.now_secs();
        self.events.background(now, self.directory.as_ref());
        self.sensors.background(now, self.directory.as_ref());
        self.controls.background();
        self.dispatcher.background(now);
    }

    /// Route a completed request to the component that issued it
    pub fn complete(&mut self, completion: Completion) {
        let Some(stream) = completion.context.stream() else {
            self.controls
                .handle_completion(completion, &mut self.dispatcher);
            return;
        };

        let ready = self.dispatcher.ready() && self.controls.ready();
        let records = match stream {
            StreamKind::Events => self.events.handle_completion(completion, ready),
            StreamKind::Sensors => self.sensors.handle_completion(completion, ready),
        };
        for record in records {
            self.dispatch(&record);
        }
    }

    fn dispatch(&mut self, record: &Record) {
        debug!(stream = %record.stream, id = record.id, "Dispatching record");
        match record.stream {
            StreamKind::Events => self.dispatcher.trigger_event(
                &mut self.controls,
                &record.group,
                &record.name,
                &record.value,
            ),
            StreamKind::Sensors => self.dispatcher.trigger_sensor(
                &mut self.controls,
                &record.group,
                &record.name,
                &record.value,
            ),
        };
    }

    /// Take every request issued since the last call
    pub fn drain_requests(&mut self) -> Vec<Request> {
        let mut requests = self.controls.drain_requests();
        requests.extend(self.events.drain_requests());
        requests.extend(self.sensors.drain_requests());
        requests
    }

    /// Render the status document, empty if it does not fit
    pub fn status(&self) -> String {
        let document = StatusDocument {
            host: &self.host,
            timestamp: self.clock.now_secs(),
            controls: self.controls.status(),
            rules: self.dispatcher.status(),
            events: self.events.status(),
            sensors: self.sensors.status(),
        };
        render_bounded(&document, self.status_limit).unwrap_or_default()
    }
}

fn system_host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
