//! Observable - single-value slots with change notification
//!
//! A [`Slot`] holds one current value. Every [`Slot::set`] replaces the value
//! and notifies observers. Three observer styles are supported:
//!
//! - [`Slot::watch`]: a `watch::Receiver` that always sees the latest value
//!   (intermediate values may be coalesced). Good for rendering.
//! - [`Slot::updates`]: a `broadcast::Receiver` that yields one item per `set`.
//! - [`Slot::subscribe`]: a callback invoked immediately with the current value
//!   and then synchronously on every `set`, until the returned
//!   [`Subscription`] is dropped.
//!
//! [`Slot::reader`] hands out a [`Reader`], a read-only view for observers
//! that must not write the value.
//!
//! # Example
//!
//! ```
//! use observable::Slot;
//!
//! let connected = Slot::new(false);
//! let mut rx = connected.watch();
//!
//! connected.set(true);
//! assert!(*rx.borrow_and_update());
//! ```

mod reader;
mod slot;

pub use reader::Reader;
pub use slot::{DEFAULT_UPDATE_CAPACITY, Slot, Subscription};
