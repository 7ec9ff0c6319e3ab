#![forbid(unsafe_code)]

//! Springtide public facade crate.
//!
//! Re-exports the stable surface of `springtide-core` and
//! `springtide-runtime`, plus a prelude for day-to-day use.
//!
//! ```rust,ignore
//! use springtide::prelude::*;
//!
//! let host = Rc::new(FrameLoop::new());
//! let set = TransitionSet::start(
//!     host.clone(),
//!     &["a", "b"],
//!     |item: &&str| *item,
//!     TransitionConfig::new().with_spring(presets::wobbly()),
//!     |records| {
//!         for record in records {
//!             println!("{} {} {:.3}", record.key(), record.stage(), record.progress());
//!         }
//!     },
//! );
//! set.update(&["b", "c"]);
//! host.run_until_idle();
//! ```

// --- Core re-exports -------------------------------------------------------

pub use springtide_core::{
    ConfigError, Direction, Directional, DriverKey, DriverLane, GenerationId, InitialMount,
    Motion, RangeTarget, Reconciliation, RecordSet, SettleDetector, SettleVerdict, SpringParams,
    SpringSolver, Stage, TransitionConfig, TransitionPolicy, TransitionRecord, ValueRange, lerp,
    presets, reconcile,
};

// --- Runtime re-exports ----------------------------------------------------

pub use springtide_runtime::{
    DriverHandle, DriverStatus, EngineStats, FrameLoop, Host, Observable, Subscription, TaskId,
    ToggleState, ToggleTransition, TransitionSet, ValueTransition,
};

/// Drivers usable without a transition set.
pub use springtide_runtime::driver;

// --- Errors ---------------------------------------------------------------

/// Top-level error type.
pub type Error = ConfigError;

/// Standard result type for Springtide operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common imports.
pub mod prelude {
    pub use crate::{
        Directional, Host, InitialMount, Motion, Observable, SpringParams, Stage,
        ToggleTransition, TransitionConfig, TransitionRecord, TransitionSet, ValueRange,
        ValueTransition, presets,
    };
    pub use crate::{FrameLoop, Result};
    pub use std::rc::Rc;
    pub use std::time::Duration;
}

pub use springtide_core as core;
pub use springtide_runtime as runtime;
