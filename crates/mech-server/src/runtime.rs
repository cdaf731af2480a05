//! Event loop
//!
//! One task owns the [`Mech`]: it alternates between background ticks and
//! request completions, so no state is ever shared. Requests run on their
//! own tasks and report back through a channel.

use crate::mech::Mech;
use mech_transport::{execute, Completion, SharedTransport};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace};

/// Drive `mech` until `shutdown` resolves
///
/// The status document is republished on `status` after every step.
pub async fn run(
    mut mech: Mech,
    transport: SharedTransport,
    tick: Duration,
    status: watch::Sender<String>,
    shutdown: impl Future<Output = ()>,
) {
    let (completions_tx, mut completions) = mpsc::unbounded_channel::<Completion>();
    let mut ticker = time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => mech.tick(),
            Some(completion) = completions.recv() => {
                trace!(context = %completion.context, "Completion");
                mech.complete(completion);
            }
        }

        for request in mech.drain_requests() {
            let transport = transport.clone();
            let completions_tx = completions_tx.clone();
            tokio::spawn(async move {
                let completion = execute(transport.as_ref(), request).await;
                // The loop is gone once shutdown has been requested
                let _ = completions_tx.send(completion);
            });
        }

        status.send_replace(mech.status());
    }

    debug!("Event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mech_config::TimingConfig;
    use mech_core::MockClock;
    use mech_directory::StaticDirectory;
    use mech_event_bus::EventBus;
    use mech_rules::RuleBook;
    use mech_transport::{Response, Transport, TransportResult, Url};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    /// Answers control discovery with a single point, everything else with 404
    struct ScriptedTransport;

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &Url) -> TransportResult<Response> {
            match url.path() {
                "/status" => Ok(Response::ok(
                    json!({ "control": { "status": { "pump": { "state": "off" } } } })
                        .to_string(),
                )),
                _ => Ok(Response::status(404)),
            }
        }
    }

    fn mech() -> Mech {
        let directory = Arc::new(StaticDirectory::new());
        directory.update("control", vec!["http://relay1".to_string()], 1);
        directory.update("history", vec!["http://saga1".to_string()], 1);

        Mech::new(
            "testhost",
            Arc::new(MockClock::at_secs(100)),
            directory,
            Box::new(RuleBook::from_yaml_str("").unwrap()),
            Arc::new(EventBus::new()),
            &TimingConfig::default(),
            65536,
        )
    }

    #[tokio::test]
    async fn test_discovery_round_trip_reaches_status() {
        let mech = mech();
        let (status_tx, mut status_rx) = watch::channel(mech.status());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(run(
            mech,
            Arc::new(ScriptedTransport),
            Duration::from_millis(10),
            status_tx,
            async move {
                let _ = stop_rx.await;
            },
        ));

        let status = time::timeout(Duration::from_secs(5), async {
            loop {
                status_rx.changed().await.unwrap();
                let status: Value = serde_json::from_str(&status_rx.borrow_and_update()).unwrap();
                if status["controls"].as_array().is_some_and(|c| !c.is_empty()) {
                    return status;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(status["controls"], json!([["pump", "i", "http://relay1", 0]]));
        assert_eq!(status["servers"], json!(["http://relay1"]));

        stop_tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
