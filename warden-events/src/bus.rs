//! Event bus implementation
//!
//! Synchronous in-process publish/subscribe. Closures registered with
//! [`EventBus::on`] and [`EventBus::once`] run inside [`EventBus::emit`], in
//! registration order. Async [`EventHandler`]s are spawned onto the tokio
//! runtime and never report back to the emitter.

use crate::types::{Event, EventKind, RbacEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use thiserror::Error;
use uuid::Uuid;

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// An async handler failed
    #[error("Handler failed: {0}")]
    HandlerFailed(String),
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Synchronous handler closure.
pub type HandlerFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Event handler trait for async event processing.
///
/// Handlers run detached from the emitter; errors are logged.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: Event) -> EventBusResult<()>;

    /// Get the kinds this handler is interested in.
    fn kinds(&self) -> Vec<EventKind>;
}

/// Event bus statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Total synchronous handler invocations
    pub events_delivered: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
    /// Registered async handlers
    pub registered_handlers: usize,
}

#[derive(Clone)]
struct Subscriber {
    id: Uuid,
    once: bool,
    active: Arc<AtomicBool>,
    handler: HandlerFn,
}

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    events_published: AtomicU64,
    events_delivered: AtomicU64,
    active_subscriptions: AtomicUsize,
}

impl BusInner {
    fn subscribers(&self) -> RwLockReadGuard<'_, HashMap<EventKind, Vec<Subscriber>>> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribers_mut(&self) -> RwLockWriteGuard<'_, HashMap<EventKind, Vec<Subscriber>>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop a subscriber whose `active` flag the caller just cleared.
    fn retire(&self, kind: EventKind, id: Uuid) {
        let mut subscribers = self.subscribers_mut();
        if let Some(list) = subscribers.get_mut(&kind) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(&kind);
            }
        }
        self.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle returned by [`EventBus::on`] and [`EventBus::once`].
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: Uuid,
    kind: EventKind,
    active: Arc<AtomicBool>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Subscription ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The kind subscribed to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Whether this subscription was made on `bus` or one of its clones.
    pub fn belongs_to(&self, bus: &EventBus) -> bool {
        std::ptr::eq(self.bus.as_ptr(), Arc::as_ptr(&bus.inner))
    }

    /// Whether the handler can still fire.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Remove the handler.
    ///
    /// Idempotent: returns `false` when the subscription was already removed,
    /// or a `once` handler already fired.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.retire(self.kind, self.id);
        }
        true
    }
}

impl std::fmt::Debug for BusInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusInner")
            .field("active_subscriptions", &self.active_subscriptions)
            .finish()
    }
}

/// In-memory event bus.
///
/// Cheap to clone; clones share subscribers.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use warden_events::{EventBus, EventKind, RbacEvent};
///
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let counter = seen.clone();
/// let sub = bus.on(EventKind::RolesDeleted, move |_event| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.emit(RbacEvent::RolesDeleted { role_ids: vec![1] });
/// sub.unsubscribe();
/// bus.emit(RbacEvent::RolesDeleted { role_ids: vec![2] });
///
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("active_subscriptions", &self.inner.active_subscriptions.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `handler` on every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(kind, false, Arc::new(handler))
    }

    /// Run `handler` on the next event of `kind` only.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(kind, true, Arc::new(handler))
    }

    fn subscribe(&self, kind: EventKind, once: bool, handler: HandlerFn) -> Subscription {
        let id = Uuid::now_v7();
        let active = Arc::new(AtomicBool::new(true));

        self.inner.subscribers_mut().entry(kind).or_default().push(Subscriber {
            id,
            once,
            active: active.clone(),
            handler,
        });
        self.inner.active_subscriptions.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(kind = %kind, subscription_id = %id, once, "Subscribed");

        Subscription {
            id,
            kind,
            active,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Register an async handler.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(handler);
    }

    /// Publish `payload` to every subscriber of its kind.
    ///
    /// Handlers may subscribe or unsubscribe from inside a callback; such
    /// changes take effect from the next emit, except that an unsubscribed
    /// handler later in the current list is skipped.
    ///
    /// Returns the number of synchronous handlers invoked.
    pub fn emit(&self, payload: RbacEvent) -> usize {
        let event = payload.to_event();
        let kind = event.kind();
        self.inner.events_published.fetch_add(1, Ordering::SeqCst);

        let snapshot: Vec<Subscriber> = self.inner.subscribers().get(&kind).cloned().unwrap_or_default();

        let mut delivered = 0;
        for subscriber in snapshot {
            if subscriber.once {
                if !subscriber.active.swap(false, Ordering::SeqCst) {
                    continue;
                }
                self.inner.retire(kind, subscriber.id);
            } else if !subscriber.active.load(Ordering::SeqCst) {
                continue;
            }
            (subscriber.handler)(&event);
            delivered += 1;
        }
        self.inner.events_delivered.fetch_add(delivered as u64, Ordering::SeqCst);

        self.spawn_handlers(&event);

        tracing::debug!(kind = %kind, event_id = %event.id, delivered, "Event emitted");
        delivered
    }

    fn spawn_handlers(&self, event: &Event) {
        let kind = event.kind();
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|h| h.kinds().contains(&kind))
            .cloned()
            .collect();
        if handlers.is_empty() {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(kind = %kind, "No tokio runtime, async handlers skipped");
                return;
            }
        };

        for handler in handlers {
            let event = event.clone();
            runtime.spawn(async move {
                let event_id = event.id;
                if let Err(e) = handler.handle(event).await {
                    tracing::error!(kind = %kind, event_id = %event_id, error = %e, "Handler error");
                }
            });
        }
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.subscribers().get(&kind).map_or(0, Vec::len)
    }

    /// Get event bus stats.
    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            events_published: self.inner.events_published.load(Ordering::SeqCst),
            events_delivered: self.inner.events_delivered.load(Ordering::SeqCst),
            active_subscriptions: self.inner.active_subscriptions.load(Ordering::SeqCst),
            registered_handlers: self
                .inner
                .handlers
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn deleted(id: i64) -> RbacEvent {
        RbacEvent::RolesDeleted { role_ids: vec![id] }
    }

    fn recorder(bus: &EventBus, kind: EventKind, tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Subscription {
        let log = log.clone();
        bus.on(kind, move |_| log.lock().unwrap().push(tag.to_string()))
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, EventKind::RolesDeleted, "first", &log);
        recorder(&bus, EventKind::RolesDeleted, "second", &log);
        recorder(&bus, EventKind::RolesCreated, "other", &log);

        assert_eq!(bus.emit(deleted(1)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_subscription_belongs_to_its_bus() {
        let bus = EventBus::new();
        let other = EventBus::new();
        let sub = bus.on(EventKind::RolesDeleted, |_| {});

        assert!(sub.belongs_to(&bus));
        assert!(sub.belongs_to(&bus.clone()));
        assert!(!sub.belongs_to(&other));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sub = recorder(&bus, EventKind::RolesDeleted, "a", &log);
        assert_eq!(bus.stats().active_subscriptions, 1);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert_eq!(bus.stats().active_subscriptions, 0);
        assert_eq!(bus.subscriber_count(EventKind::RolesDeleted), 0);

        bus.emit(deleted(1));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_once_fires_once() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = bus.once(EventKind::RolesDeleted, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(deleted(1));
        bus.emit(deleted(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());

        // Unsubscribing after it fired changes nothing
        assert!(!sub.unsubscribe());
        assert_eq!(bus.stats().active_subscriptions, 0);
    }

    #[test]
    fn test_once_reentrant_emit() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let inner_bus = bus.clone();
        bus.once(EventKind::RolesDeleted, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            inner_bus.emit(deleted(99));
        });

        bus.emit(deleted(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_from_inside_handler() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let later = Arc::new(Mutex::new(None::<Subscription>));

        let l = later.clone();
        bus.on(EventKind::RolesDeleted, move |_| {
            if let Some(sub) = l.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        let second = recorder(&bus, EventKind::RolesDeleted, "second", &log);
        *later.lock().unwrap() = Some(second);

        bus.emit(deleted(1));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bus.subscriber_count(EventKind::RolesDeleted), 1);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus = EventBus::new();
        let sub = bus.on(EventKind::RolesCreated, |_| {});
        drop(bus);
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_stats() {
        let bus = EventBus::new();
        assert_eq!(bus.stats(), EventBusStats::default());

        bus.on(EventKind::RolesDeleted, |_| {});
        bus.emit(deleted(1));
        bus.emit(RbacEvent::PermissionsCreated { permissions: vec![] });

        let stats = bus.stats();
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.events_delivered, 1);
        assert_eq!(stats.active_subscriptions, 1);
    }

    struct FailingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _event: Event) -> EventBusResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EventBusError::HandlerFailed("boom".to_string()))
        }

        fn kinds(&self) -> Vec<EventKind> {
            vec![EventKind::RolesDeleted]
        }
    }

    #[tokio::test]
    async fn test_async_handler_errors_not_surfaced() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.register_handler(Arc::new(FailingHandler { calls: calls.clone() }));
        assert_eq!(bus.stats().registered_handlers, 1);

        assert_eq!(bus.emit(deleted(1)), 0);
        bus.emit(RbacEvent::RolesCreated { roles: vec![] });

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_async_handler_without_runtime_skipped() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.register_handler(Arc::new(FailingHandler { calls: calls.clone() }));
        bus.emit(deleted(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
