use std::fmt;

use tokio::sync::{broadcast, watch};

use crate::slot::{Slot, Subscription};

/// Read-only view of a [`Slot`].
///
/// Owners hand these out so observers can watch a value without being able
/// to write it.
pub struct Reader<T> {
    slot: Slot<T>,
}

impl<T> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Reader<T> {
    pub(crate) fn new(slot: Slot<T>) -> Self {
        Self { slot }
    }

    /// Clone of the current value
    pub fn get(&self) -> T {
        self.slot.get()
    }

    /// Latest-value receiver; see [`Slot::watch`]
    pub fn watch(&self) -> watch::Receiver<T> {
        self.slot.watch()
    }

    /// One item per write made after this call
    pub fn updates(&self) -> broadcast::Receiver<T> {
        self.slot.updates()
    }

    /// Callback run now and after every write; see [`Slot::subscribe`]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.slot.subscribe(callback)
    }

    /// Live observers of the underlying slot, from any handle
    pub fn observer_count(&self) -> usize {
        self.slot.observer_count()
    }

    /// True if both readers view the same slot
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.slot.ptr_eq(&other.slot)
    }

    /// True if this reader views `slot`
    pub fn views(&self, slot: &Slot<T>) -> bool {
        self.slot.ptr_eq(slot)
    }
}

impl<T: fmt::Debug> fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reader").field(&self.slot).finish()
    }
}
