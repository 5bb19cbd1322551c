use super::types::{OverflowPolicy, RegistryEvent, RegistryEventKind};
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
pub type SubscriptionId = Uuid;

/// Asynchronous subscriber callback.
///
/// Invoked by the dispatcher for every matching event. Must tolerate
/// at-least-once delivery and must not assume ordering across different
/// agents' event streams.
#[async_trait::async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Handle one registry event.
    async fn on_event(&self, event: RegistryEvent);
}

struct Subscription {
    filter: Option<RegistryEventKind>,
    subscriber: Arc<dyn EventSubscriber>,
}

/// Bounded-queue event bus with a single dispatcher task.
///
/// `publish` is synchronous and never blocks: when the queue is full the
/// configured [`OverflowPolicy`] is applied and the dropped-event counter
/// is incremented, so lossy periods are observable.
pub struct EventBus {
    queue: Mutex<VecDeque<RegistryEvent>>,
    capacity: usize,
    policy: OverflowPolicy,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
    subscribers: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl EventBus {
    /// Create a new bus with the given queue capacity and overflow policy.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber for future events.
    ///
    /// `filter = Some(kind)` restricts delivery to one event kind;
    /// `None` is a wildcard subscription receiving every event.
    pub async fn subscribe(
        &self,
        filter: Option<RegistryEventKind>,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.subscribers
            .write()
            .await
            .insert(id, Subscription { filter, subscriber });
        id
    }

    /// Remove a subscription. Returns `false` if the id was unknown.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.write().await.remove(&id).is_some()
    }

    /// Enqueue an event for dispatch. Never blocks.
    ///
    /// Returns `true` when the event was queued. After [`close`](Self::close)
    /// publishing is a counted no-op; on overflow the policy decides whether
    /// the incoming or the oldest queued event is dropped, and either way
    /// the dropped counter is incremented.
    pub fn publish(&self, event: RegistryEvent) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        let mut queue = match self.queue.lock() {
            Ok(queue) => queue,
            Err(_) => {
                warn!("event queue lock poisoned, dropping event");
                self.dropped.fetch_add(1, Ordering::SeqCst);
                return false;
            }
        };
        if queue.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::DropOldest => {
                    queue.pop_front();
                    self.dropped.fetch_add(1, Ordering::SeqCst);
                    debug!(kind = ?event.kind, "event queue full, evicted oldest event");
                }
                OverflowPolicy::DropNewest => {
                    self.dropped.fetch_add(1, Ordering::SeqCst);
                    debug!(kind = ?event.kind, "event queue full, dropped incoming event");
                    return false;
                }
            }
        }
        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
        true
    }

    /// Number of events dropped so far (overflow or post-close publishes).
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Number of events currently queued.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Current number of subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Stop accepting new publishes. Queued events remain for the
    /// dispatcher to flush.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Whether the bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Dispatcher loop: drain the queue and fan out to matching
    /// subscribers, sequentially per event.
    ///
    /// On cancellation the remaining queue is flushed before returning, so
    /// events published before `close()` are not lost. A panicking
    /// subscriber is caught and logged; it never stops the dispatcher or
    /// affects other subscribers.
    pub async fn run(&self, shutdown: CancellationToken) {
        debug!("event dispatcher started");
        loop {
            while let Some(event) = self.pop() {
                self.dispatch(event).await;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = shutdown.cancelled() => {
                    while let Some(event) = self.pop() {
                        self.dispatch(event).await;
                    }
                    break;
                }
            }
        }
        debug!("event dispatcher stopped");
    }

    fn pop(&self) -> Option<RegistryEvent> {
        self.queue.lock().ok().and_then(|mut queue| queue.pop_front())
    }

    async fn dispatch(&self, event: RegistryEvent) {
        let matching: Vec<Arc<dyn EventSubscriber>> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .values()
                .filter(|s| s.filter.is_none_or(|kind| kind == event.kind))
                .map(|s| Arc::clone(&s.subscriber))
                .collect()
        };
        for subscriber in matching {
            let call = AssertUnwindSafe(subscriber.on_event(event.clone()));
            if call.catch_unwind().await.is_err() {
                warn!(kind = ?event.kind, "subscriber panicked while handling event");
            }
        }
    }
}
