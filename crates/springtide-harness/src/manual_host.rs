#![forbid(unsafe_code)]

//! Virtual-clock host for deterministic tests.
//!
//! Time only moves when the test says so. Each [`ManualHost::advance_frame`]
//! moves the clock by one frame interval, runs every timer that became due,
//! then runs the frame tasks queued so far. Cancelled tasks are kept aside
//! so tests can force-fire them and prove the callers guard against stale
//! callbacks.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use springtide_runtime::{DEFAULT_FRAME_INTERVAL, Host, Task, TaskId, TaskQueue};

/// Deterministic [`Host`] driven by the test.
pub struct ManualHost {
    now: Cell<Duration>,
    frame_interval: Duration,
    queue: TaskQueue,
    cancelled: RefCell<Vec<Task>>,
    frames_run: Cell<u64>,
}

impl fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualHost")
            .field("now", &self.now.get())
            .field("queue", &self.queue)
            .field("cancelled", &self.cancelled.borrow().len())
            .field("frames_run", &self.frames_run.get())
            .finish()
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }
}

impl ManualHost {
    /// Host at 60 Hz, wrapped for sharing.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Host with a custom frame interval.
    #[must_use]
    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            frame_interval,
            queue: TaskQueue::new(),
            cancelled: RefCell::new(Vec::new()),
            frames_run: Cell::new(0),
        }
    }

    /// This host as a trait object.
    #[must_use]
    pub fn handle(self: &Rc<Self>) -> Rc<dyn Host> {
        Rc::clone(self) as Rc<dyn Host>
    }

    /// Frame interval.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Run timers due at the current time without advancing.
    pub fn flush_timers(&self) {
        while let Some(task) = self.queue.pop_due(self.now.get()) {
            task();
        }
    }

    /// Move the clock by `by`, running timers as they become due.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        while let Some(deadline) = self.queue.next_deadline().filter(|d| *d <= target) {
            self.now.set(self.now.get().max(deadline));
            self.flush_timers();
        }
        self.now.set(target);
    }

    /// Advance one frame interval, then run the pending frame tasks.
    ///
    /// Returns the number of frame tasks run.
    pub fn advance_frame(&self) -> usize {
        self.advance(self.frame_interval);
        let frames = self.queue.take_frames();
        let count = frames.len();
        for task in frames {
            task();
        }
        self.frames_run.set(self.frames_run.get() + 1);
        count
    }

    /// Advance `n` frames.
    pub fn run_frames(&self, n: usize) {
        for _ in 0..n {
            self.advance_frame();
        }
    }

    /// Advance frames until nothing is pending. Returns frames advanced.
    ///
    /// # Panics
    ///
    /// Panics if work is still pending after `max_frames`.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while !self.queue.is_idle() {
            assert!(
                frames < max_frames,
                "host still busy after {max_frames} frames: {:?}",
                self
            );
            self.advance_frame();
            frames += 1;
        }
        frames
    }

    /// Run every pending and every cancelled task immediately, regardless of
    /// deadlines. Returns the number of tasks run.
    pub fn force_fire_all(&self) -> usize {
        let mut tasks = self.queue.drain();
        tasks.append(&mut self.cancelled.borrow_mut());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Frame tasks waiting.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.queue.pending_frames()
    }

    /// Timers waiting.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.queue.pending_timers()
    }

    /// Whether no task is pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Tasks cancelled so far and not yet force-fired.
    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.borrow().len()
    }

    /// Frames advanced so far.
    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.frames_run.get()
    }
}

impl Host for ManualHost {
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
        if let Some(task) = self.queue.cancel(id) {
            self.cancelled.borrow_mut().push(task);
        }
    }
}
