#![forbid(unsafe_code)]

//! Version-tracked state container with change notification.
//!
//! [`Observable<T>`] is the state holder a renderer watches: the engine
//! writes each published snapshot into it, and subscribers are told when
//! the value actually changed (by `PartialEq`).
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 on each value-changing write.
//! 2. Writing an equal value is a no-op.
//! 3. Subscribers run in registration order, after the borrow is released,
//!    so they may read or write the observable.
//!
//! # Failure Modes
//!
//! - Subscriptions whose guard has been dropped stay in the list until the
//!   next notification prunes them.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, trace_span};
use web_time::Instant;

type Callback<T> = Rc<dyn Fn(&T)>;

struct Slot<T> {
    value: T,
    version: u64,
    subscribers: Vec<Weak<dyn Fn(&T)>>,
}

/// Shared, version-tracked value. Clones share the same slot.
pub struct Observable<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Observable")
            .field("value", &slot.value)
            .field("version", &slot.version)
            .field("subscribers", &slot.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Wrap `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.slot.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.slot.borrow().value)
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        {
            let mut slot = self.slot.borrow_mut();
            if slot.value == value {
                return;
            }
            slot.value = value;
            slot.version += 1;
        }
        self.notify();
    }

    /// Edit the value in place, notifying subscribers if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut slot = self.slot.borrow_mut();
            let before = slot.value.clone();
            f(&mut slot.value);
            let changed = slot.value != before;
            if changed {
                slot.version += 1;
            }
            changed
        };
        if changed {
            self.notify();
        }
    }

    /// Register `callback` for future changes. Dropping the returned guard
    /// unsubscribes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: Callback<T> = Rc::new(callback);
        self.slot.borrow_mut().subscribers.push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Number of value-changing writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.slot.borrow().version
    }

    /// Registered subscribers, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.slot.borrow().subscribers.len()
    }

    fn notify(&self) {
        let (callbacks, value, version) = {
            let mut slot = self.slot.borrow_mut();
            slot.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<Callback<T>> =
                slot.subscribers.iter().filter_map(Weak::upgrade).collect();
            (callbacks, slot.value.clone(), slot.version)
        };
        if callbacks.is_empty() {
            return;
        }

        let started = Instant::now();
        let _span = trace_span!("springtide.notify", version, subscribers = callbacks.len()).entered();
        for callback in &callbacks {
            callback(&value);
        }
        trace!(duration_us = started.elapsed().as_micros() as u64, "observers notified");
    }
}

/// Guard keeping a subscription alive.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn set_bumps_version_only_on_change() {
        let obs = Observable::new(1);
        obs.set(1);
        assert_eq!(obs.version(), 0);
        obs.set(2);
        assert_eq!(obs.version(), 1);
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn subscribers_see_new_value() {
        let obs = Observable::new(Vec::<u32>::new());
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v: &Vec<u32>| s.set(v.len()));
        obs.update(|v| v.push(7));
        assert_eq!(seen.get(), 1);
        obs.update(|_| {});
        assert_eq!(obs.version(), 1);
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let obs = Observable::new(0);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = obs.subscribe(move |_| h.set(h.get() + 1));
        obs.set(1);
        drop(sub);
        obs.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_may_write_back() {
        let obs = Observable::new(0);
        let inner = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v < 3 {
                inner.set(v + 1);
            }
        });
        obs.set(1);
        assert_eq!(obs.get(), 3);
        assert_eq!(obs.with(|v| *v * 2), 6);
    }
}
