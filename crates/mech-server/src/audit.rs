//! Audit log
//!
//! Writes every audit event fired on the bus to the log, under the
//! `mech::audit` target.

use mech_event_bus::EventBus;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub fn spawn_audit_log(bus: &EventBus) -> JoinHandle<()> {
    let mut events = bus.subscribe_all();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    target: "mech::audit",
                    category = %event.category,
                    name = %event.name,
                    action = %event.action,
                    "{}",
                    event.description
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "mech::audit", skipped, "Audit log fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mech_core::AuditEvent;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_audit_log_ends_with_bus() {
        let bus = Arc::new(EventBus::new());
        let handle = spawn_audit_log(&bus);

        bus.fire(AuditEvent::new("CONTROL", "pump", "ACTIVATED", "USING http://relay1 (test)"));
        drop(bus);

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
