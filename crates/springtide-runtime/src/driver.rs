#![forbid(unsafe_code)]

//! Frame drivers: the processes that turn a motion into a progress stream.
//!
//! A spring driver samples the solver once per host frame, feeding each
//! sample through a [`SettleDetector`]; a fixed driver reports `1.0` on the
//! first frame and completes after its duration. Both end in exactly one of
//! two ways: `on_end` fires once, or the handle is cancelled and nothing
//! fires again.
//!
//! ```text
//!   Running ──settle/timeout──▶ Settled
//!      │
//!      └────── cancel() ──────▶ Cancelled
//! ```
//!
//! # Invariants
//!
//! 1. At most one host task is pending per driver.
//! 2. After `cancel()` returns, neither callback is invoked again, even if
//!    the host runs a stale task.
//! 3. The frame that completes the settle quorum reports nothing through
//!    `on_frame`; completion snaps to the target instead.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use springtide_core::{Motion, SettleDetector, SettleVerdict, SpringParams, SpringSolver};
use tracing::trace;

use crate::host::{Host, TaskId};

/// Lifecycle of one driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Sampling frames or waiting for its timer.
    Running,
    /// Completed; `on_end` has fired.
    Settled,
    /// Cancelled before completion.
    Cancelled,
}

struct DriverShared {
    host: Rc<dyn Host>,
    pending: Cell<Option<TaskId>>,
    status: Cell<DriverStatus>,
}

impl DriverShared {
    fn new(host: &Rc<dyn Host>) -> Rc<Self> {
        Rc::new(Self {
            host: Rc::clone(host),
            pending: Cell::new(None),
            status: Cell::new(DriverStatus::Running),
        })
    }

    #[inline]
    fn is_running(&self) -> bool {
        self.status.get() == DriverStatus::Running
    }
}

/// Cancellation handle for a running driver.
///
/// Clones refer to the same driver.
#[derive(Clone)]
pub struct DriverHandle {
    shared: Rc<DriverShared>,
}

impl fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverHandle")
            .field("status", &self.shared.status.get())
            .field("pending", &self.shared.pending.get())
            .finish()
    }
}

impl DriverHandle {
    /// Stop the driver. Idempotent; a no-op once settled.
    pub fn cancel(&self) {
        if !self.shared.is_running() {
            return;
        }
        self.shared.status.set(DriverStatus::Cancelled);
        if let Some(id) = self.shared.pending.take() {
            self.shared.host.cancel(id);
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> DriverStatus {
        self.shared.status.get()
    }

    /// Whether the driver is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

// ---------------------------------------------------------------------------
// Spring driver
// ---------------------------------------------------------------------------

struct SpringRun<F, E> {
    shared: Rc<DriverShared>,
    solver: SpringSolver,
    detector: SettleDetector,
    started: Duration,
    on_frame: F,
    on_end: E,
}

impl<F, E> SpringRun<F, E>
where
    F: FnMut(f64) + 'static,
    E: FnOnce() + 'static,
{
    fn schedule(self) {
        let shared = Rc::clone(&self.shared);
        let id = shared.host.schedule_frame(Box::new(move || self.step()));
        shared.pending.set(Some(id));
    }

    fn step(mut self) {
        self.shared.pending.set(None);
        if !self.shared.is_running() {
            return;
        }

        let elapsed = self.shared.host.now().saturating_sub(self.started);
        let progress = self.solver.at(elapsed);
        match self.detector.observe(progress) {
            SettleVerdict::Settled => {
                trace!(elapsed_ms = elapsed.as_millis() as u64, "spring settled");
                self.shared.status.set(DriverStatus::Settled);
                (self.on_end)();
            }
            SettleVerdict::Running => {
                trace!(progress, consecutive = self.detector.consecutive(), "spring frame");
                (self.on_frame)(progress);
                // on_frame may have cancelled us
                if self.shared.is_running() {
                    self.schedule();
                }
            }
        }
    }
}

/// Start a spring driver. The first sample is taken on the next host frame;
/// elapsed time is measured from this call.
///
/// # Panics
///
/// Panics if `params` violate the spring contract.
pub fn spring(
    host: &Rc<dyn Host>,
    params: &SpringParams,
    on_frame: impl FnMut(f64) + 'static,
    on_end: impl FnOnce() + 'static,
) -> DriverHandle {
    let shared = DriverShared::new(host);
    SpringRun {
        shared: Rc::clone(&shared),
        solver: params.solver(),
        detector: SettleDetector::new(params.threshold),
        started: host.now(),
        on_frame,
        on_end,
    }
    .schedule();
    DriverHandle { shared }
}

// ---------------------------------------------------------------------------
// Fixed-duration driver
// ---------------------------------------------------------------------------

/// Start a fixed-duration driver: `on_frame(1.0)` on the next frame, then
/// `on_end` once `duration` has passed since that frame.
pub fn fixed(
    host: &Rc<dyn Host>,
    duration: Duration,
    mut on_frame: impl FnMut(f64) + 'static,
    on_end: impl FnOnce() + 'static,
) -> DriverHandle {
    let shared = DriverShared::new(host);
    let frame_shared = Rc::clone(&shared);
    let id = host.schedule_frame(Box::new(move || {
        let shared = frame_shared;
        shared.pending.set(None);
        if !shared.is_running() {
            return;
        }
        on_frame(1.0);
        if !shared.is_running() {
            return;
        }

        let end_shared = Rc::clone(&shared);
        let id = shared.host.schedule_after(
            duration,
            Box::new(move || {
                end_shared.pending.set(None);
                if !end_shared.is_running() {
                    return;
                }
                end_shared.status.set(DriverStatus::Settled);
                on_end();
            }),
        );
        shared.pending.set(Some(id));
    }));
    shared.pending.set(Some(id));
    DriverHandle { shared }
}

/// Start the driver `motion` calls for.
pub fn drive(
    host: &Rc<dyn Host>,
    motion: &Motion,
    on_frame: impl FnMut(f64) + 'static,
    on_end: impl FnOnce() + 'static,
) -> DriverHandle {
    match motion {
        Motion::Spring(params) => spring(host, params, on_frame, on_end),
        Motion::Fixed(duration) => fixed(host, *duration, on_frame, on_end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Task, TaskQueue};
    use std::cell::RefCell;

    /// Minimal virtual-clock host for driver unit tests.
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

    fn setup() -> (Rc<StepHost>, Rc<dyn Host>) {
        let host = Rc::new(StepHost::default());
        let dyn_host: Rc<dyn Host> = host.clone();
        (host, dyn_host)
    }

    #[test]
    fn spring_reports_frames_then_settles() {
        let (host, dyn_host) = setup();
        let frames = Rc::new(RefCell::new(Vec::new()));
        let ended = Rc::new(Cell::new(false));
        let (f, e) = (Rc::clone(&frames), Rc::clone(&ended));
        let handle = spring(
            &dyn_host,
            &SpringParams::default(),
            move |p| f.borrow_mut().push(p),
            move || e.set(true),
        );

        for _ in 0..200 {
            host.frame();
        }
        assert!(ended.get());
        assert_eq!(handle.status(), DriverStatus::Settled);
        let frames = frames.borrow();
        assert!(frames.iter().any(|p| *p > 1.0), "default spring overshoots");
        assert!(host.queue.is_idle());
    }

    #[test]
    fn cancel_stops_callbacks() {
        let (host, dyn_host) = setup();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let handle = spring(&dyn_host, &SpringParams::default(), move |_| c.set(c.get() + 1), || {
            panic!("cancelled driver must not end")
        });
        host.frame();
        assert_eq!(count.get(), 1);
        handle.cancel();
        handle.cancel();
        assert_eq!(handle.status(), DriverStatus::Cancelled);
        assert!(host.queue.is_idle());
        for _ in 0..200 {
            host.frame();
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn stale_task_after_cancel_is_inert() {
        let (host, dyn_host) = setup();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let handle = spring(&dyn_host, &SpringParams::default(), move |_| c.set(c.get() + 1), || {});
        let stale = host.queue.drain();
        handle.cancel();
        for task in stale {
            task();
        }
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn fixed_jumps_then_waits() {
        let (host, dyn_host) = setup();
        let frames = Rc::new(RefCell::new(Vec::new()));
        let ended_at = Rc::new(Cell::new(None));
        let (f, e, h) = (Rc::clone(&frames), Rc::clone(&ended_at), Rc::clone(&host));
        fixed(
            &dyn_host,
            Duration::from_millis(100),
            move |p| f.borrow_mut().push((h.now(), p)),
            move || e.set(Some(())),
        );
        host.frame();
        assert_eq!(frames.borrow().len(), 1);
        assert_eq!(frames.borrow()[0].1, 1.0);
        let first = frames.borrow()[0].0;

        while ended_at.get().is_none() {
            host.frame();
        }
        assert!(host.now() - first >= Duration::from_millis(100));
        assert_eq!(frames.borrow().len(), 1);
    }

    #[test]
    fn cancel_from_inside_on_frame() {
        let (host, dyn_host) = setup();
        let slot: Rc<RefCell<Option<DriverHandle>>> = Rc::new(RefCell::new(None));
        let s = Rc::clone(&slot);
        let handle = drive(
            &dyn_host,
            &Motion::Spring(SpringParams::default()),
            move |_| {
                if let Some(h) = s.borrow().as_ref() {
                    h.cancel();
                }
            },
            || {},
        );
        *slot.borrow_mut() = Some(handle.clone());
        host.frame();
        assert_eq!(handle.status(), DriverStatus::Cancelled);
        assert!(host.queue.is_idle());
    }
}
