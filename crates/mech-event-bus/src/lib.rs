//! Event bus for mech audit events
//!
//! Control routing, activations, cancellations and rule-emitted events are
//! published here. The audit log is one subscriber; tests are another.

use dashmap::DashMap;
use mech_core::AuditEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to audit events
///
/// Subscribers either follow one category (e.g. "CONTROL") or all events.
/// Firing never blocks: a subscriber that falls behind loses the oldest
/// events, and events fired with no subscriber are dropped.
pub struct EventBus {
    /// Senders keyed by event category
    listeners: DashMap<String, broadcast::Sender<AuditEvent>>,
    /// Sender for subscribers to every category
    match_all_sender: broadcast::Sender<AuditEvent>,
    /// Number of events fired since creation
    fired: AtomicU64,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            fired: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to the events of one category
    pub fn subscribe(&self, category: impl Into<String>) -> broadcast::Receiver<AuditEvent> {
        let category = category.into();
        trace!(category = %category, "Subscribing to event category");

        self.listeners
            .entry(category)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to all events
    pub fn subscribe_all(&self) -> broadcast::Receiver<AuditEvent> {
        self.match_all_sender.subscribe()
    }

    /// Fire an event to its category subscribers and to all-event subscribers
    pub fn fire(&self, event: AuditEvent) {
        debug!(
            category = %event.category,
            name = %event.name,
            action = %event.action,
            "Firing event"
        );
        self.fired.fetch_add(1, Ordering::Relaxed);

        if let Some(sender) = self.listeners.get(&event.category) {
            // No active receiver is not an error
            let _ = sender.send(event.clone());
        }

        let _ = self.match_all_sender.send(event);
    }

    /// Number of events fired since creation
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Get the number of categories with subscribers
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
