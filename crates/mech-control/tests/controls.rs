//! Control registry, discovery and actuation driven without a network

use mech_control::Controls;
use mech_core::{AuditEvent, ControlStatus, MockClock};
use mech_directory::StaticDirectory;
use mech_event_bus::EventBus;
use mech_rules::{Dispatcher, RuleBook, RuleHost};
use mech_transport::{Completion, RequestContext, Response, TransportError};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;

const RELAY1: &str = "http://relay1";
const RELAY2: &str = "http://relay2";

struct Fixture {
    controls: Controls,
    dispatcher: Dispatcher,
    clock: MockClock,
    directory: Arc<StaticDirectory>,
    events: broadcast::Receiver<AuditEvent>,
}

impl Fixture {
    fn new(rules: &str, providers: &[&str]) -> Self {
        let clock = MockClock::at_secs(100);
        let directory = Arc::new(StaticDirectory::new());
        directory.update(
            "control",
            providers.iter().map(|p| p.to_string()).collect(),
            1,
        );
        let bus = Arc::new(EventBus::new());
        let events = bus.subscribe_all();
        let controls = Controls::new(directory.clone(), bus, Arc::new(clock.clone()), 2);
        let dispatcher = Dispatcher::new(Box::new(RuleBook::from_yaml_str(rules).unwrap()));

        Self {
            controls,
            dispatcher,
            clock,
            directory,
            events,
        }
    }

    fn report(&mut self, provider: &str, points: &[(&str, &str)]) {
        self.controls
            .apply_provider_report(provider, &report(points), &mut self.dispatcher)
            .unwrap();
    }

    fn complete(&mut self, context: RequestContext, response: Response) {
        self.controls
            .handle_completion(Completion::response(context, response), &mut self.dispatcher);
    }

    fn requests(&mut self) -> Vec<String> {
        self.controls
            .drain_requests()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    fn events(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event.to_string());
        }
        events
    }

    fn status_of(&self, name: &str) -> ControlStatus {
        self.controls.registry().get(name).unwrap().status
    }

    fn deadline_of(&self, name: &str) -> Option<i64> {
        self.controls.registry().get(name).unwrap().deadline
    }
}

fn report(points: &[(&str, &str)]) -> String {
    let status: serde_json::Map<String, serde_json::Value> = points
        .iter()
        .map(|(name, state)| (name.to_string(), json!({ "state": state })))
        .collect();
    json!({ "control": { "status": status } }).to_string()
}

fn actuation(point: &str, provider: &str) -> RequestContext {
    RequestContext::Actuation {
        point: point.to_string(),
        provider: provider.to_string(),
    }
}

#[test]
fn test_state_of_new_point_is_empty() {
    let mut f = Fixture::new("", &[]);

    assert!(!f.controls.ready());
    assert_eq!(f.controls.state("pump"), "");

    let point = f.controls.registry().get("pump").unwrap();
    assert!(point.provider.is_empty());
    assert_eq!(point.status, ControlStatus::Unknown);
}

#[test]
fn test_discovery_scans_every_provider() {
    let mut f = Fixture::new("", &[RELAY1, RELAY2]);

    f.controls.background();
    assert_eq!(
        f.requests(),
        vec!["http://relay1/status", "http://relay2/status"]
    );

    // Not due again until the interval has passed
    f.clock.advance_seconds(2);
    f.controls.background();
    assert!(f.requests().is_empty());

    f.clock.advance_seconds(1);
    f.controls.background();
    assert_eq!(f.requests().len(), 2);
}

#[test]
fn test_force_discovery() {
    let mut f = Fixture::new("", &[RELAY1]);
    f.controls.background();
    f.requests();

    f.controls.force_discovery();
    f.controls.background();
    assert_eq!(f.requests(), vec!["http://relay1/status"]);
}

#[test]
fn test_discovery_response_populates_registry() {
    let mut f = Fixture::new("", &[RELAY1]);
    f.controls.background();
    f.requests();

    f.complete(
        RequestContext::Discovery {
            provider: RELAY1.to_string(),
        },
        Response::ok(report(&[("pump", "off"), ("valve", "on")])),
    );

    assert!(f.controls.ready());
    assert_eq!(f.controls.state("valve"), "on");
    assert_eq!(f.status_of("pump"), ControlStatus::Inactive);
    assert_eq!(f.controls.registry().get("pump").unwrap().provider, RELAY1);
}

#[test]
fn test_failed_discovery_changes_nothing() {
    let mut f = Fixture::new("", &[RELAY1]);
    let context = RequestContext::Discovery {
        provider: RELAY1.to_string(),
    };

    f.complete(context.clone(), Response::status(500));
    f.complete(context.clone(), Response::ok("{not json"));
    f.complete(context.clone(), Response::ok(r#"{"control":{}}"#));
    f.controls.handle_completion(
        Completion::failed(
            context,
            TransportError::Request {
                url: "http://relay1/status".to_string(),
                reason: "connection refused".to_string(),
            },
        ),
        &mut f.dispatcher,
    );

    assert!(!f.controls.ready());
}

#[test]
fn test_last_report_wins_routing() {
    let mut f = Fixture::new("", &[]);

    f.report(RELAY1, &[("pump", "off")]);
    f.report(RELAY2, &[("pump", "off")]);

    let point = f.controls.registry().get("pump").unwrap();
    assert_eq!(point.provider, RELAY2);
    assert_eq!(point.status, ControlStatus::Inactive);
    assert_eq!(
        f.events(),
        vec![
            "CONTROL pump ROUTE TO http://relay1",
            "CONTROL pump ROUTE TO http://relay2",
        ]
    );

    // Same provider again: no new route
    f.report(RELAY2, &[("pump", "off")]);
    assert!(f.events().is_empty());
}

#[test]
fn test_state_change_triggers_control_rule() {
    let rules = r#"
POINT.pump:
  - do: event
    category: TEST
    name: pump
    action: "{{ args[0] }}"
"#;
    let mut f = Fixture::new(rules, &[]);

    f.report(RELAY1, &[("pump", "off")]);
    f.report(RELAY1, &[("pump", "off")]);
    assert_eq!(f.dispatcher.status().fired, 0);

    f.report(RELAY1, &[("pump", "on")]);
    assert_eq!(f.dispatcher.status().fired, 1);
    assert_eq!(f.controls.state("pump"), "on");
    assert!(f.events().contains(&"TEST pump on".to_string()));
}

#[test]
fn test_rule_can_start_another_point() {
    let rules = r#"
POINT.pump:
  - do: start
    point: valve
    pulse: 30
    when: "args[0] == 'on'"
"#;
    let mut f = Fixture::new(rules, &[]);
    f.report(RELAY1, &[("pump", "off"), ("valve", "off")]);

    f.report(RELAY1, &[("pump", "on"), ("valve", "off")]);

    assert_eq!(
        f.requests(),
        vec!["http://relay1/set?point=valve&state=on&pulse=30&cause=MECH+TRIGGER"]
    );
    assert_eq!(f.status_of("valve"), ControlStatus::Active);
    assert_eq!(f.deadline_of("valve"), Some(130));
}

#[test]
fn test_start_unknown_point_fails() {
    let mut f = Fixture::new("", &[]);

    assert!(!f.controls.start("pump", 10, "test"));
    assert!(f.requests().is_empty());
    assert_eq!(f.events(), vec!["CONTROL pump UNKNOWN"]);
}

#[test]
fn test_start_with_pulse() {
    let mut f = Fixture::new("", &[]);
    f.report(RELAY1, &[("pump", "off")]);
    f.events();

    assert!(f.controls.start("pump", 90, "test"));

    assert_eq!(
        f.requests(),
        vec!["http://relay1/set?point=pump&state=on&pulse=90&cause=test"]
    );
    assert_eq!(f.status_of("pump"), ControlStatus::Active);
    assert_eq!(f.deadline_of("pump"), Some(190));
    assert_eq!(
        f.events(),
        vec!["CONTROL pump ACTIVATED FOR 1 MINUTE, 30 SECONDS USING http://relay1 (test)"]
    );
}

#[test]
fn test_start_without_pulse_has_no_deadline() {
    let mut f = Fixture::new("", &[]);
    f.report(RELAY1, &[("light", "off")]);
    f.events();

    assert!(f.controls.start("light", 0, "dusk"));
    assert_eq!(f.deadline_of("light"), None);
    assert_eq!(
        f.events(),
        vec!["CONTROL light ACTIVATED USING http://relay1 (dusk)"]
    );
}

#[test]
fn test_pulse_expires_without_request() {
    let mut f = Fixture::new("", &[]);
    f.report(RELAY1, &[("p1", "off")]);

    assert!(f.controls.start("p1", 10, "test"));
    assert_eq!(f.deadline_of("p1"), Some(110));
    f.requests();

    f.clock.advance_seconds(9);
    f.controls.background();
    assert_eq!(f.status_of("p1"), ControlStatus::Active);

    f.clock.advance_seconds(1);
    f.controls.background();
    assert_eq!(f.status_of("p1"), ControlStatus::Inactive);
    assert_eq!(f.deadline_of("p1"), None);
    assert!(f.requests().is_empty());
}

#[test]
fn test_cancel_all_only_stops_pulsed_points() {
    let mut f = Fixture::new("", &[]);
    f.report(RELAY1, &[("p1", "off"), ("p2", "off"), ("p3", "off")]);

    f.controls.start("p1", 10, "test");
    f.controls.start("p2", 0, "test");
    f.requests();

    f.controls.cancel(None, "stop");

    assert_eq!(
        f.requests(),
        vec!["http://relay1/set?point=p1&state=off&cause=stop"]
    );
    assert_eq!(f.status_of("p1"), ControlStatus::Inactive);
    assert_eq!(f.deadline_of("p1"), None);
    assert_eq!(f.status_of("p2"), ControlStatus::Active);
    assert_eq!(f.status_of("p3"), ControlStatus::Inactive);
}

#[test]
fn test_cancel_one_point() {
    let mut f = Fixture::new("", &[]);
    f.report(RELAY1, &[("light", "on")]);
    f.controls.start("light", 0, "dusk");
    f.requests();
    f.events();

    f.controls.cancel(Some("light"), "dawn");

    assert_eq!(
        f.requests(),
        vec!["http://relay1/set?point=light&state=off&cause=dawn"]
    );
    assert_eq!(f.status_of("light"), ControlStatus::Inactive);
    assert_eq!(
        f.events(),
        vec!["CONTROL light CANCEL USING http://relay1 (dawn)"]
    );
}

#[test]
fn test_cancel_unknown_point_sends_nothing() {
    let mut f = Fixture::new("", &[]);

    f.controls.cancel(Some("ghost"), "test");

    assert!(f.requests().is_empty());
    assert!(f.events().is_empty());
}

#[test]
fn test_failed_actuation_marks_error() {
    let mut f = Fixture::new("", &[]);
    f.report(RELAY1, &[("pump", "off")]);
    f.controls.start("pump", 60, "test");

    f.complete(actuation("pump", RELAY1), Response::status(500));
    assert_eq!(f.status_of("pump"), ControlStatus::Error);
    assert_eq!(f.deadline_of("pump"), None);

    f.complete(actuation("pump", RELAY1), Response::status(503));
    assert_eq!(f.status_of("pump"), ControlStatus::Error);
}

#[test]
fn test_actuation_response_is_a_report() {
    let rules = "POINT.pump:\n  - do: event\n    category: SEEN\n    name: pump\n    action: \"{{ args[0] }}\"\n";
    let mut f = Fixture::new(rules, &[]);
    f.report(RELAY1, &[("pump", "off")]);
    f.controls.start("pump", 60, "test");

    f.complete(
        actuation("pump", RELAY1),
        Response::ok(report(&[("pump", "on")])),
    );

    assert_eq!(f.controls.state("pump"), "on");
    assert_eq!(f.status_of("pump"), ControlStatus::Active);
    assert_eq!(f.dispatcher.status().fired, 1);
}

#[test]
fn test_removed_provider_gets_no_traffic_and_keeps_routing() {
    let mut f = Fixture::new("", &[RELAY1, RELAY2]);
    f.controls.background();
    f.requests();
    f.report(RELAY1, &[("pump", "off")]);
    f.report(RELAY2, &[("valve", "off")]);

    f.directory.update("control", vec![RELAY2.to_string()], 101);
    f.clock.advance_seconds(1);
    f.controls.background();

    assert_eq!(f.requests(), vec!["http://relay2/status"]);
    assert_eq!(f.controls.providers(), [RELAY2.to_string()]);
    assert_eq!(f.controls.registry().get("pump").unwrap().provider, RELAY1);
}

#[test]
fn test_status_document() {
    let mut f = Fixture::new("", &[RELAY1]);
    f.controls.background();
    f.report(RELAY1, &[("pump", "off"), ("valve", "off")]);
    f.controls.start("pump", 10, "test");
    f.clock.advance_seconds(3);

    let status = serde_json::to_value(f.controls.status()).unwrap();
    assert_eq!(
        status,
        json!({
            "servers": ["http://relay1"],
            "controls": [
                ["pump", "a", "http://relay1", 7],
                ["valve", "i", "http://relay1", 0],
            ],
        })
    );
}
