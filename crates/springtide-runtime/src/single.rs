#![forbid(unsafe_code)]

//! Single-item conveniences over [`TransitionSet`].
//!
//! - [`ToggleTransition`]: one item driven by an `opened` flag. The item
//!   never disappears; closing settles it at `closed`.
//! - [`ValueTransition`]: a cross-fade between successive values. Each
//!   value is its own key, so replacing the value closes the old one and
//!   opens the new one in the same generation.

use std::cell::Cell;
use std::hash::Hash;
use std::rc::Rc;

use springtide_core::{InitialMount, Stage, TransitionConfig, TransitionRecord};

use crate::engine::{EngineStats, TransitionSet};
use crate::host::Host;

/// Stage and progress of a [`ToggleTransition`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToggleState {
    /// Current stage.
    pub stage: Stage,
    /// Current progress.
    pub progress: f64,
}

fn toggle_state(records: &[TransitionRecord<(), ()>], absent: ToggleState) -> ToggleState {
    records.first().map_or(absent, |r| ToggleState {
        stage: r.stage(),
        progress: r.progress(),
    })
}

fn toggle_live(opened: bool) -> &'static [()] {
    if opened { &[()] } else { &[] }
}

/// One item animated by a boolean.
///
/// Starts at rest in `opened` or `closed` without animating. Flipping the
/// flag mid-flight reverses from the current progress.
#[derive(Debug)]
pub struct ToggleTransition {
    set: TransitionSet<(), ()>,
    opened: Cell<bool>,
    absent: ToggleState,
}

impl ToggleTransition {
    /// Start at rest in the state `opened` names.
    ///
    /// The policy is forced to keep closed records and mount at rest.
    pub fn start(
        host: Rc<dyn Host>,
        opened: bool,
        config: TransitionConfig,
        publish: impl Fn(ToggleState) + 'static,
    ) -> Self {
        let config = config.keep_closed(true).initial(InitialMount::Opened);
        let absent = ToggleState {
            stage: Stage::Closed,
            progress: config.range.from,
        };
        let set = TransitionSet::start(host, toggle_live(opened), |_: &()| (), config, move |records| {
            publish(toggle_state(records, absent));
        });
        Self {
            set,
            opened: Cell::new(opened),
            absent,
        }
    }

    /// Drive toward `opened`.
    pub fn set(&self, opened: bool) {
        self.opened.set(opened);
        self.set.update(toggle_live(opened));
    }

    /// Flip the flag.
    pub fn toggle(&self) {
        self.set(!self.opened.get());
    }

    /// Last requested flag.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.opened.get()
    }

    /// Current stage and progress.
    #[must_use]
    pub fn state(&self) -> ToggleState {
        toggle_state(&self.set.snapshot(), self.absent)
    }

    /// Engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.set.stats()
    }

    /// Tear down.
    pub fn unsubscribe(&self) {
        self.set.unsubscribe();
    }
}

/// Cross-fade between successive values.
#[derive(Debug)]
pub struct ValueTransition<T> {
    set: TransitionSet<T, T>,
}

impl<T> ValueTransition<T>
where
    T: Eq + Hash + Clone + 'static,
{
    /// Start with `value` mounted per the config's initial policy.
    pub fn start(
        host: Rc<dyn Host>,
        value: Option<T>,
        config: TransitionConfig,
        publish: impl Fn(&[TransitionRecord<T, T>]) + 'static,
    ) -> Self {
        let set = TransitionSet::start(host, value.as_slice(), T::clone, config, publish);
        Self { set }
    }

    /// Transition to `value`.
    pub fn set(&self, value: T) {
        self.set.update(std::slice::from_ref(&value));
    }

    /// Transition out the current value.
    pub fn clear(&self) {
        self.set.update(&[]);
    }

    /// Transition to `value`, or out when `None`.
    pub fn replace(&self, value: Option<T>) {
        self.set.update(value.as_slice());
    }

    /// Every managed record, including values still closing.
    #[must_use]
    pub fn records(&self) -> Vec<TransitionRecord<T, T>> {
        self.set.snapshot()
    }

    /// The value currently opening or opened.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.set
            .snapshot()
            .into_iter()
            .find(|r| r.stage().is_open_family())
            .map(TransitionRecord::into_value)
    }

    /// Engine counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.set.stats()
    }

    /// Tear down.
    pub fn unsubscribe(&self) {
        self.set.unsubscribe();
    }
}
