#![forbid(unsafe_code)]

//! Test harness for Springtide.
//!
//! - [`ManualHost`]: virtual-clock host; frames and timers only run when the
//!   test advances time.
//! - [`PublishRecorder`]: captures every published snapshot and answers
//!   per-key stage/progress history queries.
//! - [`init_test_tracing`] / [`capture_events`]: log output and assertions
//!   on emitted events.

pub mod manual_host;
pub mod recorder;
pub mod trace_capture;

pub use manual_host::ManualHost;
pub use recorder::PublishRecorder;
pub use trace_capture::{CapturedEvent, capture_events, init_test_tracing};
