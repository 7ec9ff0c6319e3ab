#![forbid(unsafe_code)]

//! The keyed transition engine.
//!
//! A [`TransitionSet`] owns the record set of one subscription. Each
//! [`update`](TransitionSet::update) reconciles the live list, cancels
//! drivers bound to superseded generations, and defers the new generation by
//! one host tick (the `open`/`close` staging stages). When the staging tick
//! fires, the generation's records begin moving and the multiplexer decides
//! which drivers to launch. Every observable change is published as a full
//! snapshot.
//!
//! # Design
//!
//! Engine state lives behind `Rc<RefCell<..>>`. Host tasks and driver
//! callbacks hold only a `Weak` reference and re-check that the set is still
//! active, so teardown is a flag flip plus synchronous cancellation.
//! `publish` always runs after the state borrow is released, so a publish
//! callback may call back into the set.
//!
//! # Invariants
//!
//! 1. At most one live driver per [`DriverKey`].
//! 2. Every `opening`/`closing` record has a live driver for its generation
//!    and direction; no driver outlives the last animating record of its
//!    generation. With split motions both directional drivers run even when
//!    one direction has no records.
//! 3. All stage changes of one update are applied before any driver is
//!    scheduled.
//! 4. After [`unsubscribe`](TransitionSet::unsubscribe), `publish` is never
//!    called again.
//!
//! # Failure Modes
//!
//! - Launching a driver whose key is still live is a logic error: the
//!   predecessor is cancelled, the event is logged at `error` level, and
//!   [`EngineStats::violations`] is incremented. Generation ids are never
//!   reused and each generation begins once, so this only fires if that
//!   invariant breaks.
//! - Calling `update` from inside a driver callback is fine; calling it
//!   while holding a borrow of a snapshot is too, since snapshots are owned.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};
use std::time::Duration;

use springtide_core::{
    DriverKey, DriverPlan, GenerationCounter, GenerationId, InitialMount, RecordSet,
    TransitionConfig, TransitionRecord, plan_drivers,
};
use tracing::{debug, debug_span, error, trace};

use crate::driver::{self, DriverHandle};
use crate::host::{Host, TaskId};
use crate::observable::Observable;

/// Lifetime counters for one transition set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Generations started by reconciliation.
    pub generations: u64,
    /// Drivers launched.
    pub drivers_launched: u64,
    /// Drivers cancelled before completing.
    pub drivers_cancelled: u64,
    /// Driver completions applied.
    pub settles: u64,
    /// Snapshots published.
    pub publishes: u64,
    /// Launches that found a same-key driver still live.
    pub violations: u64,
}

type Publish<K, T> = Box<dyn Fn(&[TransitionRecord<K, T>])>;

struct EngineState<K, T> {
    records: RecordSet<K, T>,
    counter: GenerationCounter,
    config: TransitionConfig,
    drivers: HashMap<DriverKey, DriverHandle>,
    staging: HashMap<GenerationId, TaskId>,
    stats: EngineStats,
}

impl<K, T> EngineState<K, T>
where
    K: Clone,
    T: Clone,
{
    fn snapshot(&mut self) -> Vec<TransitionRecord<K, T>> {
        self.stats.publishes += 1;
        self.records.records().to_vec()
    }

    /// Cancel drivers and staging ticks whose generation no longer has
    /// records to drive.
    fn prune(&mut self, host: &dyn Host) {
        let records = &self.records;
        let stats = &mut self.stats;
        self.drivers.retain(|key, handle| {
            let live = records.is_moving(key.generation);
            if !live {
                handle.cancel();
                stats.drivers_cancelled += 1;
                debug!(driver = %key, "cancelled superseded driver");
            }
            live
        });
        self.staging.retain(|generation, task| {
            let live = records.is_staged(*generation);
            if !live {
                host.cancel(*task);
                debug!(generation = generation.get(), "cancelled superseded staging tick");
            }
            live
        });
    }
}

struct Inner<K, T> {
    host: Rc<dyn Host>,
    key_of: Box<dyn Fn(&T) -> K>,
    publish: Publish<K, T>,
    active: Cell<bool>,
    state: RefCell<EngineState<K, T>>,
}

/// A running keyed transition subscription.
///
/// Dropping the set tears it down.
pub struct TransitionSet<K, T> {
    inner: Rc<Inner<K, T>>,
}

impl<K, T> fmt::Debug for TransitionSet<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("TransitionSet")
            .field("active", &self.inner.active.get())
            .field("records", &state.records.len())
            .field("drivers", &state.drivers.len())
            .field("stats", &state.stats)
            .finish()
    }
}

impl<K, T> TransitionSet<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    /// Start managing `live`.
    ///
    /// With [`InitialMount::Opened`] the initial items are mounted at rest;
    /// with [`InitialMount::Animate`] they enter through `open` like any
    /// later item. The initial snapshot is published before returning.
    ///
    /// # Panics
    ///
    /// Panics if two live items share a key or the configuration carries
    /// invalid spring parameters.
    pub fn start(
        host: Rc<dyn Host>,
        live: &[T],
        key_of: impl Fn(&T) -> K + 'static,
        config: TransitionConfig,
        publish: impl Fn(&[TransitionRecord<K, T>]) + 'static,
    ) -> Self {
        let errors = config.validate();
        assert!(errors.is_empty(), "invalid transition config: {}", errors.join("; "));

        let records = match config.policy.initial {
            InitialMount::Opened => RecordSet::mount(live, &key_of, &config.range),
            InitialMount::Animate => RecordSet::new(),
        };
        let set = Self {
            inner: Rc::new(Inner {
                host,
                key_of: Box::new(key_of),
                publish: Box::new(publish),
                active: Cell::new(true),
                state: RefCell::new(EngineState {
                    records,
                    counter: GenerationCounter::new(),
                    config,
                    drivers: HashMap::new(),
                    staging: HashMap::new(),
                    stats: EngineStats::default(),
                }),
            }),
        };
        debug!(items = live.len(), initial = ?config.policy.initial, "transition set started");

        if config.policy.initial == InitialMount::Animate && !live.is_empty() {
            set.update(live);
        } else {
            let snapshot = set.inner.state.borrow_mut().snapshot();
            (set.inner.publish)(&snapshot);
        }
        set
    }

    /// Reconcile against a new live list.
    ///
    /// An unchanged list publishes nothing and schedules nothing.
    ///
    /// # Panics
    ///
    /// Panics if two live items share a key.
    pub fn update(&self, live: &[T]) {
        Inner::update(&self.inner, live);
    }

    /// Tear down: cancel every driver and pending staging tick. Idempotent.
    pub fn unsubscribe(&self) {
        self.inner.teardown();
    }

    /// Whether the set has not been torn down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Current records.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TransitionRecord<K, T>> {
        self.inner.state.borrow().records.records().to_vec()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.inner.state.borrow().stats
    }

    /// Keys of the drivers currently running, in generation order.
    #[must_use]
    pub fn live_drivers(&self) -> Vec<DriverKey> {
        let mut keys: Vec<DriverKey> = self.inner.state.borrow().drivers.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Configuration the set runs with.
    #[must_use]
    pub fn config(&self) -> TransitionConfig {
        self.inner.state.borrow().config
    }

    /// Start a set that publishes into an [`Observable`].
    pub fn observe(
        host: Rc<dyn Host>,
        live: &[T],
        key_of: impl Fn(&T) -> K + 'static,
        config: TransitionConfig,
    ) -> (Self, Observable<Vec<TransitionRecord<K, T>>>) {
        let observable = Observable::new(Vec::new());
        let sink = observable.clone();
        let set = Self::start(host, live, key_of, config, move |records| {
            sink.set(records.to_vec());
        });
        (set, observable)
    }
}

impl<K, T> Drop for TransitionSet<K, T> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<K, T> Inner<K, T> {
    fn teardown(&self) {
        if !self.active.replace(false) {
            return;
        }
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        for (key, handle) in state.drivers.drain() {
            if handle.is_running() {
                handle.cancel();
                state.stats.drivers_cancelled += 1;
            }
            trace!(driver = %key, "teardown cancelled driver");
        }
        for (_, task) in state.staging.drain() {
            self.host.cancel(task);
        }
        debug!(stats = ?state.stats, "transition set torn down");
    }
}

impl<K, T> Inner<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + PartialEq + 'static,
{
    fn update(this: &Rc<Self>, live: &[T]) {
        if !this.active.get() {
            return;
        }
        let snapshot = {
            let mut state = this.state.borrow_mut();
            let state = &mut *state;
            let next = state.counter.peek();
            let result = state
                .records
                .reconcile(live, &*this.key_of, next, &state.config.range);
            if result.is_noop() {
                return;
            }
            let (entered, reopened, closed, refreshed) =
                (result.entered, result.reopened, result.closed, result.refreshed);
            let started = state.records.apply(result);

            state.prune(&*this.host);
            if let Some(generation) = started {
                state.counter.advance();
                state.stats.generations += 1;
                debug!(
                    generation = generation.get(),
                    entered, reopened, closed, refreshed, "generation staged"
                );
                Self::schedule_staging(this, state, generation);
            }
            state.snapshot()
        };
        (this.publish)(&snapshot);
    }

    fn schedule_staging(this: &Rc<Self>, state: &mut EngineState<K, T>, generation: GenerationId) {
        let weak = Rc::downgrade(this);
        let task = this.host.schedule_after(
            Duration::ZERO,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Self::begin(&inner, generation);
                }
            }),
        );
        state.staging.insert(generation, task);
    }

    /// Staging tick: start moving `generation` and launch its drivers.
    fn begin(this: &Rc<Self>, generation: GenerationId) {
        if !this.active.get() {
            return;
        }
        let _span = debug_span!("springtide.generation", generation = generation.get()).entered();
        let snapshot = {
            let mut state = this.state.borrow_mut();
            let state = &mut *state;
            state.staging.remove(&generation);
            let start = state.records.begin_generation(generation);
            if start.is_empty() {
                return;
            }
            let plans = plan_drivers(
                generation,
                &state.config.motion,
                start.opening > 0,
                start.closing > 0,
            );
            debug!(opening = start.opening, closing = start.closing, drivers = plans.len(), "generation begins");
            for plan in plans {
                Self::launch(this, state, plan);
            }
            state.snapshot()
        };
        (this.publish)(&snapshot);
    }

    fn launch(this: &Rc<Self>, state: &mut EngineState<K, T>, plan: DriverPlan) {
        let key = plan.key;
        if let Some(previous) = state.drivers.remove(&key) {
            if previous.is_running() {
                previous.cancel();
                state.stats.drivers_cancelled += 1;
            }
            state.stats.violations += 1;
            error!(driver = %key, "driver launched while a same-key predecessor was live");
        }

        let frame_ref = Rc::downgrade(this);
        let end_ref = Rc::downgrade(this);
        let handle = driver::drive(
            &this.host,
            &plan.motion,
            move |progress| Self::frame(&frame_ref, key, progress),
            move || Self::finish(&end_ref, key),
        );
        state.drivers.insert(key, handle);
        state.stats.drivers_launched += 1;
        debug!(driver = %key, motion = ?plan.motion, "driver launched");
    }

    fn frame(this: &Weak<Self>, key: DriverKey, progress: f64) {
        let Some(inner) = this.upgrade() else { return };
        if !inner.active.get() {
            return;
        }
        let snapshot = {
            let mut state = inner.state.borrow_mut();
            let state = &mut *state;
            let written =
                state
                    .records
                    .apply_frame(key.generation, key.lane, progress, &state.config.range);
            if written == 0 {
                return;
            }
            state.snapshot()
        };
        (inner.publish)(&snapshot);
    }

    fn finish(this: &Weak<Self>, key: DriverKey) {
        let Some(inner) = this.upgrade() else { return };
        if !inner.active.get() {
            return;
        }
        let snapshot = {
            let mut state = inner.state.borrow_mut();
            let state = &mut *state;
            state.drivers.remove(&key);
            let outcome = state.records.settle(
                key.generation,
                key.lane,
                &state.config.range,
                &state.config.policy,
            );
            state.stats.settles += 1;
            debug!(
                driver = %key,
                opened = outcome.opened,
                closed = outcome.closed,
                dropped = outcome.dropped,
                "driver settled"
            );
            if !state.records.is_moving(key.generation) {
                Self::retire_generation(state, key.generation);
            }
            if outcome.is_empty() {
                return;
            }
            state.snapshot()
        };
        (inner.publish)(&snapshot);
    }

    /// Cancel the drivers `generation` still runs once none of its records
    /// move.
    fn retire_generation(state: &mut EngineState<K, T>, generation: GenerationId) {
        let stats = &mut state.stats;
        state.drivers.retain(|key, handle| {
            if key.generation != generation {
                return true;
            }
            if handle.is_running() {
                handle.cancel();
                stats.drivers_cancelled += 1;
            }
            debug!(driver = %key, "cancelled idle sibling driver");
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Task, TaskQueue};
    use springtide_core::DriverLane;
    use springtide_harness::capture_events;
    use tracing::Level;

    #[derive(Default)]
    struct StepHost {
        now: Cell<Duration>,
        queue: TaskQueue,
    }

    impl Host for StepHost {
        fn now(&self) -> Duration {
            self.now.get()
        }
        fn schedule_frame(&self, task: Task) -> TaskId {
            self.queue.push_frame(task)
        }
        fn schedule_after(&self, delay: Duration, task: Task) -> TaskId {
            self.queue.push_timer(self.now.get() + delay, task)
        }
        fn cancel(&self, id: TaskId) {
            self.queue.cancel(id);
        }
    }

    impl StepHost {
        fn frame(&self) {
            self.now.set(self.now.get() + Duration::from_millis(16));
            while let Some(task) = self.queue.pop_due(self.now.get()) {
                task();
            }
            for task in self.queue.take_frames() {
                task();
            }
        }
    }

    #[test]
    fn relaunching_a_live_key_replaces_it_and_counts_violation() {
        let host = Rc::new(StepHost::default());
        let set = TransitionSet::start(
            host.clone(),
            &["a"],
            |s: &&str| *s,
            TransitionConfig::default(),
            |_| {},
        );
        set.update(&[]);
        host.frame();
        let key = DriverKey::new(GenerationId::new(1), DriverLane::Shared);
        assert_eq!(set.live_drivers(), vec![key]);

        let plan = DriverPlan {
            key,
            motion: *set.config().motion.open(),
        };
        let ((), events) = capture_events(|| {
            let mut state = set.inner.state.borrow_mut();
            Inner::launch(&set.inner, &mut state, plan);
        });

        let stats = set.stats();
        assert_eq!(stats.violations, 1);
        assert_eq!(stats.drivers_launched, 2);
        assert_eq!(stats.drivers_cancelled, 1);
        assert_eq!(set.live_drivers(), vec![key]);
        assert!(
            events
                .iter()
                .any(|e| e.level == Level::ERROR && e.field("driver") == Some("gen#1/shared"))
        );

        // The replacement still completes the generation.
        for _ in 0..600 {
            host.frame();
        }
        assert!(set.snapshot().is_empty());
        assert!(host.queue.is_idle());
    }

    #[test]
    fn unchanged_list_during_staging_keeps_single_tick() {
        let host = Rc::new(StepHost::default());
        let set = TransitionSet::start(
            host.clone(),
            &[],
            |s: &&str| *s,
            TransitionConfig::default(),
            |_| {},
        );
        set.update(&["a"]);
        set.update(&["a"]);
        assert_eq!(host.queue.pending_timers(), 1);
        assert_eq!(set.stats().generations, 1);
        assert_eq!(set.stats().publishes, 2);
    }
}
