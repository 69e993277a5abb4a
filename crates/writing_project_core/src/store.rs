//! crates/writing_project_core/src/store.rs
//!
//! In-memory holder of the current `ProjectDocument` with typed
//! publish/subscribe notification.
//!
//! Two mutation operations make intent visible at each call site:
//! `apply` replaces the document without notifying (bulk/derived updates
//! that must not re-trigger listeners), `commit` replaces and notifies.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::ProjectDocument;

/// Events published by the store and the manager that owns it.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The current document was replaced via `commit`.
    StateChanged(ProjectDocument),
    /// Initial load finished; surfaces may restore their local UI.
    Ready(ProjectDocument),
    /// A save completed successfully at the given instant.
    Saved(DateTime<Utc>),
    /// A save or merge failed. Carries a user-presentable description.
    Error(String),
}

/// Discriminant used when subscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StateChanged,
    Ready,
    Saved,
    Error,
}

impl StoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StoreEvent::StateChanged(_) => EventKind::StateChanged,
            StoreEvent::Ready(_) => EventKind::Ready,
            StoreEvent::Saved(_) => EventKind::Saved,
            StoreEvent::Error(_) => EventKind::Error,
        }
    }
}

type EventHandler = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Returned from `subscribe`; pass to `unsubscribe` to drop the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

struct Subscriber {
    id: u64,
    kind: EventKind,
    handler: EventHandler,
}

struct Inner {
    document: ProjectDocument,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

/// Holds exactly one current `ProjectDocument`.
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl StateStore {
    pub fn new(document: ProjectDocument) -> Self {
        Self {
            inner: Mutex::new(Inner {
                document,
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a defensive copy of the current document. Callers cannot
    /// mutate the store through it.
    pub fn get(&self) -> ProjectDocument {
        self.lock().document.clone()
    }

    /// Replaces the current document without notifying subscribers.
    pub fn apply(&self, document: ProjectDocument) {
        self.lock().document = document;
    }

    /// Replaces the current document and synchronously notifies
    /// `StateChanged` subscribers with a copy.
    pub fn commit(&self, document: ProjectDocument) {
        {
            let mut inner = self.lock();
            inner.document = document.clone();
        }
        self.emit(StoreEvent::StateChanged(document));
    }

    /// Registers a handler for one event kind. Handlers are invoked in
    /// registration order.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            kind,
            handler: Arc::new(handler),
        });
        SubscriptionHandle(id)
    }

    /// Removes a previously registered handler. Returns false when the
    /// handle was already gone.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != handle.0);
        inner.subscribers.len() != before
    }

    /// Synchronously notifies all subscribers registered for the event's
    /// kind. A panicking handler is caught and logged; it never breaks
    /// notification of subsequent handlers.
    pub fn emit(&self, event: StoreEvent) {
        // Snapshot the matching handlers so none run under the lock.
        let handlers: Vec<EventHandler> = {
            let inner = self.lock();
            inner
                .subscribers
                .iter()
                .filter(|s| s.kind == event.kind())
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };
        for handler in handlers {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(&event)
            }));
            if result.is_err() {
                warn!(kind = ?event.kind(), "store event handler panicked; continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_returns_a_defensive_copy() {
        let store = StateStore::new(ProjectDocument::new(None));
        let mut copy = store.get();
        copy.metadata.title = "mutated".to_string();
        assert_eq!(store.get().metadata.title, "");
    }

    #[test]
    fn commit_notifies_and_apply_does_not() {
        let store = StateStore::new(ProjectDocument::new(None));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_handler = Arc::clone(&hits);
        store.subscribe(EventKind::StateChanged, move |_| {
            hits_in_handler.fetch_add(1, Ordering::SeqCst);
        });

        store.apply(ProjectDocument::new(None));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        store.commit(ProjectDocument::new(None));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let store = StateStore::new(ProjectDocument::new(None));
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            store.subscribe(EventKind::StateChanged, move |_| {
                order.lock().unwrap().push(tag);
            });
        }
        store.commit(ProjectDocument::new(None));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_handler_does_not_break_later_handlers() {
        let store = StateStore::new(ProjectDocument::new(None));
        store.subscribe(EventKind::StateChanged, |_| panic!("boom"));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_handler = Arc::clone(&hits);
        store.subscribe(EventKind::StateChanged, move |_| {
            hits_in_handler.fetch_add(1, Ordering::SeqCst);
        });

        store.commit(ProjectDocument::new(None));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_drops_the_handler() {
        let store = StateStore::new(ProjectDocument::new(None));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_handler = Arc::clone(&hits);
        let handle = store.subscribe(EventKind::StateChanged, move |_| {
            hits_in_handler.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.unsubscribe(handle));
        assert!(!store.unsubscribe(handle));
        store.commit(ProjectDocument::new(None));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscribers_only_see_their_kind() {
        let store = StateStore::new(ProjectDocument::new(None));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_handler = Arc::clone(&hits);
        store.subscribe(EventKind::Saved, move |_| {
            hits_in_handler.fetch_add(1, Ordering::SeqCst);
        });

        store.commit(ProjectDocument::new(None));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        store.emit(StoreEvent::Saved(Utc::now()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
