use std::sync::{Arc, Mutex};

use taskgate::events::{EventBus, EventKind, SubscriptionId, TaskEvent};
use taskgate::types::TaskId;

/// Subscribes to every event kind and keeps what it sees, in order.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<TaskEvent>>>,
    subscription: SubscriptionId,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = bus.subscribe_all(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        Self {
            events,
            subscription,
        }
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(TaskEvent::kind).collect()
    }

    /// Kinds seen for one task, in order.
    pub fn kinds_for(&self, id: TaskId) -> Vec<EventKind> {
        self.events()
            .iter()
            .filter(|e| e.task_id() == id)
            .map(TaskEvent::kind)
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }

    /// Ids in the order their events of `kind` were published.
    pub fn ids_of(&self, kind: EventKind) -> Vec<TaskId> {
        self.events()
            .iter()
            .filter(|e| e.kind() == kind)
            .map(TaskEvent::task_id)
            .collect()
    }
}
