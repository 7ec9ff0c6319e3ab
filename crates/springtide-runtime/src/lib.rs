#![forbid(unsafe_code)]

//! Runtime: host scheduling, frame drivers, and the transition engine.
//!
//! # Role in Springtide
//! `springtide-runtime` connects the pure reconciliation logic in
//! `springtide-core` to a host's frame and timer callbacks. It owns the
//! per-subscription engine state, launches and cancels drivers, and
//! publishes record snapshots to whoever renders them.
//!
//! # Primary responsibilities
//! - **Host**: the scheduling capability trait plus a wall-clock [`FrameLoop`].
//! - **Drivers**: spring and fixed-duration progress streams with
//!   idempotent cancellation.
//! - **TransitionSet**: keyed list transitions with shared or per-direction
//!   drivers and full teardown.
//! - **Single-item wrappers**: [`ToggleTransition`] and [`ValueTransition`].
//! - **Observable**: a version-tracked state container for published output.

pub mod driver;
pub mod engine;
pub mod host;
pub mod observable;
pub mod single;

pub use driver::{DriverHandle, DriverStatus};
pub use engine::{EngineStats, TransitionSet};
pub use host::{DEFAULT_FRAME_INTERVAL, FrameLoop, Host, Task, TaskId, TaskQueue};
pub use observable::{Observable, Subscription};
pub use single::{ToggleState, ToggleTransition, ValueTransition};
