#![forbid(unsafe_code)]

//! Core: spring physics, lifecycle stages, and list reconciliation.
//!
//! # Role in Springtide
//! `springtide-core` is the host-free half of the library. Everything here is
//! a pure function or a plain data structure: no clocks, no scheduling, no
//! callbacks. The runtime (`springtide-runtime`) layers drivers and host
//! scheduling on top.
//!
//! # Primary responsibilities
//! - **Solver**: closed-form damped oscillator curve (`solver`).
//! - **Settle detection**: debounced convergence rule (`settle`).
//! - **Configuration**: motions, value ranges, lifecycle policy (`config`).
//! - **Stages**: the six-stage open/close lifecycle (`stage`).
//! - **Reconciliation**: pure reducer from live list to records (`reconcile`).
//! - **Multiplexing**: shared vs. per-direction driver planning (`multiplex`).
//!
//! # Feature flags
//! - `tracing`: emit `trace!` events from reconciliation.
//! - `config`: serde derives plus TOML/JSON loading for [`TransitionConfig`].

pub mod config;
pub mod multiplex;
pub mod reconcile;
pub mod record;
pub mod settle;
pub mod solver;
pub mod stage;

pub use config::{
    ConfigError, Directional, InitialMount, Motion, RangeTarget, TransitionConfig,
    TransitionPolicy, ValueRange,
};
pub use multiplex::{DriverKey, DriverLane, DriverPlan, plan_drivers};
pub use reconcile::{GenerationStart, Reconciliation, RecordSet, SettleOutcome, reconcile};
pub use record::{GenerationCounter, GenerationId, TransitionRecord};
pub use settle::{SETTLE_QUORUM, SettleDetector, SettleVerdict};
pub use solver::{DEFAULT_SETTLE_THRESHOLD, SpringParams, SpringSolver, lerp, presets};
pub use stage::{Direction, Stage};
