use crate::error::InternalError;
use parking_lot::RwLock;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

///
/// EntityHooks
///
/// User callbacks around mutations. Every method defaults to a no-op that
/// allows the operation. A `can_*` returning false skips that item and
/// records an error; a panicking hook is caught and recorded the same way.
///

pub trait EntityHooks<E>: Send + Sync {
    fn can_create(&self, _item: &E) -> bool {
        true
    }

    fn before_create(&self, _item: &mut E) {}

    /// Runs after the insert; the item carries its generated key.
    fn after_create(&self, _item: &E) {}

    fn can_update(&self, _item: &E) -> bool {
        true
    }

    fn before_update(&self, _item: &mut E) {}

    fn after_update(&self, _item: &E) {}

    fn can_delete(&self, _item: &E) -> bool {
        true
    }

    fn before_delete(&self, _item: &E) {}

    fn after_delete(&self, _item: &E) {}
}

///
/// NoHooks
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl<E> EntityHooks<E> for NoHooks {}

type Observer<E> = Box<dyn Fn(&E) + Send + Sync>;

///
/// Observers
///
/// Listener lists notified synchronously after a mutation succeeds.
///

pub(crate) struct Observers<E> {
    created: RwLock<Vec<Observer<E>>>,
    updated: RwLock<Vec<Observer<E>>>,
    deleted: RwLock<Vec<Observer<E>>>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            created: RwLock::new(Vec::new()),
            updated: RwLock::new(Vec::new()),
            deleted: RwLock::new(Vec::new()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Event {
    Created,
    Updated,
    Deleted,
}

impl Event {
    const fn label(self) -> &'static str {
        match self {
            Self::Created => "on_created",
            Self::Updated => "on_updated",
            Self::Deleted => "on_deleted",
        }
    }
}

impl<E> Observers<E> {
    const fn list(&self, event: Event) -> &RwLock<Vec<Observer<E>>> {
        match event {
            Event::Created => &self.created,
            Event::Updated => &self.updated,
            Event::Deleted => &self.deleted,
        }
    }

    pub(crate) fn push(&self, event: Event, observer: Observer<E>) {
        self.list(event).write().push(observer);
    }

    /// Notify every observer of `event`; panics become errors.
    pub(crate) fn notify(&self, event: Event, item: &E) -> Vec<InternalError> {
        self.list(event)
            .read()
            .iter()
            .filter_map(|observer| guarded(event.label(), || observer(item)).err())
            .collect()
    }
}

/// Run a user callback, converting a panic into a hook error.
pub(crate) fn guarded<T>(label: &str, f: impl FnOnce() -> T) -> Result<T, InternalError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        InternalError::hook(format!(
            "{label} panicked: {}",
            panic_message(payload.as_ref())
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
