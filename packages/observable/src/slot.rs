use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::{broadcast, watch};
use tracing::error;

use crate::reader::Reader;

/// Buffered per-update notifications kept for slow `updates()` receivers.
pub const DEFAULT_UPDATE_CAPACITY: usize = 64;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observers<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

struct Inner<T> {
    value: watch::Sender<T>,
    updates: broadcast::Sender<T>,
    observers: Mutex<Observers<T>>,
}

impl<T> Inner<T> {
    fn observers(&self) -> MutexGuard<'_, Observers<T>> {
        // A panicking callback never runs under this lock, so a poisoned
        // guard still holds a consistent list.
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A shared, observable value.
///
/// Cloning a `Slot` yields another handle to the same value.
pub struct Slot<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default + Clone + Send + Sync + 'static> Default for Slot<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + 'static> Slot<T> {
    /// Create a slot holding `initial`
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_UPDATE_CAPACITY)
    }

    /// Create a slot whose `updates()` channel buffers `capacity` items
    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        let (value, _) = watch::channel(initial);
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                value,
                updates,
                observers: Mutex::new(Observers {
                    next_id: 1,
                    callbacks: Vec::new(),
                }),
            }),
        }
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value and notify every observer once
    pub fn set(&self, value: T) {
        self.inner.value.send_replace(value.clone());
        self.publish(value);
    }

    /// Mutate the value in place and notify every observer once
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.inner.value.send_modify(f);
        self.publish(self.get());
    }

    /// Latest-value receiver. Marks the current value as seen.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.inner.value.subscribe()
    }

    /// Receiver yielding one item per `set`/`update` made after this call
    pub fn updates(&self) -> broadcast::Receiver<T> {
        self.inner.updates.subscribe()
    }

    /// Register a callback. It runs immediately with the current value and
    /// again after every change, until the returned handle is dropped.
    /// A callback that panics during a `set` is logged and skipped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let id = {
            let mut observers = self.inner.observers();
            let id = observers.next_id;
            observers.next_id += 1;
            observers.callbacks.push((id, callback.clone()));
            id
        };

        callback(&self.get());

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.observers().callbacks.retain(|(cid, _)| *cid != id);
                }
            })),
        }
    }

    /// Number of live observers across all three styles
    pub fn observer_count(&self) -> usize {
        self.inner.value.receiver_count()
            + self.inner.updates.receiver_count()
            + self.inner.observers().callbacks.len()
    }

    /// Read-only view of this slot
    pub fn reader(&self) -> Reader<T> {
        Reader::new(self.clone())
    }

    /// True if both handles refer to the same slot
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn publish(&self, value: T) {
        // Snapshot so callbacks may re-enter the slot.
        let callbacks: Vec<Callback<T>> = self
            .inner
            .observers()
            .callbacks
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();

        // Observer panics are logged and skipped; the writer carries on.
        for callback in &callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&value))).is_err() {
                error!("slot observer panicked");
            }
        }

        let _ = self.inner.updates.send(value);
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Handle returned by [`Slot::subscribe`]. Dropping it removes the callback.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the callback now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
