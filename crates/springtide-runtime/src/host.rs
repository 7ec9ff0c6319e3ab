#![forbid(unsafe_code)]

//! Host scheduling capabilities.
//!
//! The engine never owns a clock or an event loop. Everything it needs from
//! its environment goes through [`Host`]: a monotonic clock, a next-frame
//! callback, a delayed callback, and cancellation of either.
//!
//! # Design
//!
//! Hosts are single-threaded and shared as `Rc<dyn Host>`, so every method
//! takes `&self` and implementations keep their queues behind `RefCell`.
//! [`TaskQueue`] holds that bookkeeping for hosts that run their own loop,
//! such as [`FrameLoop`] here or a virtual-clock test host.
//!
//! # Invariants
//!
//! 1. Scheduling never runs the task synchronously.
//! 2. A cancelled task never runs.
//! 3. Queue borrows are released before any task runs, so tasks may
//!    schedule or cancel freely.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::time::Duration;

use web_time::Instant;

/// A scheduled callback.
pub type Task = Box<dyn FnOnce()>;

/// Handle for cancelling a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Scheduling capabilities the engine requires.
pub trait Host {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    /// Run `task` once, before the next repaint.
    fn schedule_frame(&self, task: Task) -> TaskId;

    /// Run `task` once, after `delay`.
    fn schedule_after(&self, delay: Duration, task: Task) -> TaskId;

    /// Unschedule a task. Unknown or already-run ids are ignored.
    fn cancel(&self, id: TaskId);
}

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

struct Timer {
    deadline: Duration,
    id: TaskId,
    task: Task,
}

#[derive(Default)]
struct QueueInner {
    next_id: u64,
    frames: Vec<(TaskId, Task)>,
    timers: Vec<Timer>,
}

impl QueueInner {
    fn allocate(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }
}

/// Pending frame and timer tasks for a host that runs its own loop.
#[derive(Default)]
pub struct TaskQueue {
    inner: RefCell<QueueInner>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TaskQueue")
            .field("frames", &inner.frames.len())
            .field("timers", &inner.timers.len())
            .finish()
    }
}

impl TaskQueue {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task for the next frame.
    pub fn push_frame(&self, task: Task) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.allocate();
        inner.frames.push((id, task));
        id
    }

    /// Queue a task for `deadline`.
    pub fn push_timer(&self, deadline: Duration, task: Task) -> TaskId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.allocate();
        inner.timers.push(Timer { deadline, id, task });
        id
    }

    /// Remove a pending task and hand it back.
    pub fn cancel(&self, id: TaskId) -> Option<Task> {
        let mut inner = self.inner.borrow_mut();
        if let Some(pos) = inner.frames.iter().position(|(fid, _)| *fid == id) {
            return Some(inner.frames.remove(pos).1);
        }
        let pos = inner.timers.iter().position(|t| t.id == id)?;
        Some(inner.timers.remove(pos).task)
    }

    /// Take every task queued for the current frame. Tasks queued while
    /// these run land in the next frame.
    pub fn take_frames(&self) -> Vec<Task> {
        let frames = std::mem::take(&mut self.inner.borrow_mut().frames);
        frames.into_iter().map(|(_, task)| task).collect()
    }

    /// Pop the earliest timer due at `now` (ties broken by scheduling order).
    pub fn pop_due(&self, now: Duration) -> Option<Task> {
        let mut inner = self.inner.borrow_mut();
        let pos = inner
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.id))
            .map(|(pos, _)| pos)?;
        Some(inner.timers.remove(pos).task)
    }

    /// Earliest pending timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner.borrow().timers.iter().map(|t| t.deadline).min()
    }

    /// Take everything still pending: frames first, then timers by deadline.
    pub fn drain(&self) -> Vec<Task> {
        let (frames, mut timers) = {
            let mut inner = self.inner.borrow_mut();
            (
                std::mem::take(&mut inner.frames),
                std::mem::take(&mut inner.timers),
            )
        };
        timers.sort_by_key(|t| (t.deadline, t.id));
        frames
            .into_iter()
            .map(|(_, task)| task)
            .chain(timers.into_iter().map(|t| t.task))
            .collect()
    }

    /// Number of tasks waiting for the next frame.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.frames.is_empty() && inner.timers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// Frame interval at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// Wall-clock host that paces frames at a fixed interval on the calling
/// thread.
///
/// ```rust,ignore
/// let host = Rc::new(FrameLoop::new());
/// let set = TransitionSet::start(host.clone(), &items, key_of, config, publish);
/// host.run_until_idle();
/// ```
#[derive(Debug)]
pub struct FrameLoop {
    origin: Instant,
    frame_interval: Duration,
    next_frame: Cell<Duration>,
    queue: TaskQueue,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    /// Loop at [`DEFAULT_FRAME_INTERVAL`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame_interval(DEFAULT_FRAME_INTERVAL)
    }

    /// Loop at a custom frame interval.
    #[must_use]
    pub fn with_frame_interval(frame_interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            frame_interval,
            next_frame: Cell::new(Duration::ZERO),
            queue: TaskQueue::new(),
        }
    }

    /// Frame interval this loop paces at.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Pending task bookkeeping.
    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Run whatever is due now without sleeping.
    ///
    /// Returns `true` while tasks remain pending.
    pub fn turn(&self) -> bool {
        while let Some(task) = self.queue.pop_due(self.now()) {
            task();
        }

        let now = self.now();
        if self.queue.pending_frames() > 0 && now >= self.next_frame.get() {
            self.next_frame.set(now + self.frame_interval);
            for task in self.queue.take_frames() {
                task();
            }
        }

        !self.queue.is_idle()
    }

    /// Sleep-and-turn until no task is pending.
    pub fn run_until_idle(&self) {
        while self.turn() {
            let wake = self.next_wake();
            let now = self.now();
            if wake > now {
                std::thread::sleep(wake - now);
            }
        }
    }

    fn next_wake(&self) -> Duration {
        let frame = (self.queue.pending_frames() > 0).then(|| self.next_frame.get());
        match (frame, self.queue.next_deadline()) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => self.now(),
        }
    }
}

impl Host for FrameLoop {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn schedule_frame(&self, task: Task) -> TaskId {
        self.queue.push_frame(task)
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> TaskId {
        self.queue.push_timer(self.now() + delay, task)
    }

    fn cancel(&self, id: TaskId) {
        self.queue.cancel(id);
    }
}
