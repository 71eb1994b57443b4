// src/events/bus.rs

//! Ordered, per-kind publish/subscribe.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, trace};

use super::{EventKind, TaskEvent};

/// Subscriber callback. Returning an error (or panicking) is logged by the
/// bus and does not stop delivery to the remaining subscribers.
pub type Handler = Arc<dyn Fn(&TaskEvent) -> anyhow::Result<()> + Send + Sync>;

/// Token returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
}

/// Shared event bus. Cloning yields another handle to the same subscribers.
///
/// Handlers for one kind run synchronously, in subscription order, on the
/// publisher's task. They are invoked outside the internal lock, so a handler
/// may itself subscribe or unsubscribe.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Subscribers>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subs = self.lock();
        let counts: HashMap<EventKind, usize> = subs
            .by_kind
            .iter()
            .map(|(kind, handlers)| (*kind, handlers.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &counts)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&TaskEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut subs = self.lock();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Register one handler for every event kind under a single id.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&TaskEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let mut subs = self.lock();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        for kind in EventKind::ALL {
            subs.by_kind
                .entry(kind)
                .or_default()
                .push((id, Arc::clone(&handler)));
        }
        id
    }

    /// Remove a subscription for one kind. Returns whether it existed.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut subs = self.lock();
        let Some(handlers) = subs.by_kind.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sub_id, _)| *sub_id != id);
        handlers.len() != before
    }

    /// Remove a subscription from every kind. Returns whether any existed.
    pub fn unsubscribe_all(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for kind in EventKind::ALL {
            removed |= self.unsubscribe(kind, id);
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock().by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver `event` to every subscriber of its kind.
    ///
    /// Returns the number of handlers that ran to completion without error.
    pub fn publish(&self, event: &TaskEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .lock()
            .by_kind
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        trace!(event = %kind, task_id = event.task_id(), handlers = handlers.len(), "publishing");

        let mut delivered = 0;
        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    error!(event = %kind, task_id = event.task_id(), error = %err, "error in event listener");
                }
                Err(_) => {
                    error!(event = %kind, task_id = event.task_id(), "event listener panicked");
                }
            }
        }
        delivered
    }
}
