use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::core::{EntityKey, Result};
use crate::transaction::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    PreSoftDelete,
    PostSoftDelete,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreSoftDelete => write!(f, "preSoftDelete"),
            Self::PostSoftDelete => write!(f, "postSoftDelete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub entity: EntityKey,
}

/// Hooks invoked by a session around the soft delete of a root entity.
pub trait LifecycleListener {
    fn pre_soft_delete(&self, session: &mut Session, entity: &EntityKey) -> Result<()>;

    fn post_soft_delete(&self, _session: &mut Session, _entity: &EntityKey) -> Result<()> {
        Ok(())
    }
}

/// Receives soft-delete notifications for every row, root and cascaded.
pub trait SoftDeleteObserver {
    fn on_event(&self, event: &LifecycleEvent);
}

#[derive(Default)]
pub struct EventManager {
    observers: Vec<Arc<dyn SoftDeleteObserver>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn SoftDeleteObserver>) {
        self.observers.push(observer);
    }

    pub fn dispatch(&self, kind: EventKind, entity: &EntityKey) {
        let event = LifecycleEvent {
            kind,
            entity: entity.clone(),
        };
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

/// Observer that keeps every event it sees.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind, entity: &EntityKey) -> usize {
        self.events()
            .iter()
            .filter(|event| event.kind == kind && &event.entity == entity)
            .count()
    }
}

impl SoftDeleteObserver for EventLog {
    fn on_event(&self, event: &LifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
