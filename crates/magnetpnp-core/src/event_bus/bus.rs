//! Notification bus
//!
//! Fans UI notifications out to synchronous subscribers, in the order they
//! subscribed.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::events::{EventCategory, PnpEvent};

/// Anything that can deliver a notification to the UI
///
/// The placement core only talks to this trait; it never knows whether
/// notifications end up in a websocket, a log or a test recorder.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification
    fn notify(&self, event: PnpEvent);
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Which notifications a subscriber wants
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    #[default]
    All,
    /// Only notifications in one of these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &PnpEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

type EventHandler = Box<dyn Fn(&PnpEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler,
}

/// Notification bus
///
/// Handlers run on the publishing thread, which is the command stream's
/// thread, so they must return quickly.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for notifications matching `filter`
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&PnpEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler: Box::new(handler),
        });
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver `event` to every matching handler
    ///
    /// Returns how many handlers saw it.
    pub fn publish(&self, event: &PnpEvent) -> usize {
        let subscriptions = self.subscriptions.read();
        let mut delivered = 0;
        for subscription in subscriptions.iter().filter(|s| s.filter.matches(event)) {
            (subscription.handler)(event);
            delivered += 1;
        }
        delivered
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<SubscriptionId> = self.subscriptions.read().iter().map(|s| s.id).collect();
        f.debug_struct("EventBus")
            .field("subscriptions", &ids)
            .finish()
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, event: PnpEvent) {
        if self.publish(&event) == 0 {
            tracing::debug!("Nobody listened to '{}'", event.description());
        }
    }
}
