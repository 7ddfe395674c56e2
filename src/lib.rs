//! pipwatch: a shared stopwatch service.
//!
//! One engine tracks elapsed running time and publishes it to any number of
//! observers. It is driven by an injected time source and tick scheduler so
//! it can run against the real clock or be stepped by hand in tests.
//!
//! # Architecture
//!
//! * `core`: configuration, canonical errors and logging setup
//! * `timer`: the engine, its time abstractions, the `MM:SS:HH` formatter,
//!   overlay control dispatch and the application context with its screens

pub use pipwatch_core as core;
pub use pipwatch_timer as timer;

pub use pipwatch_core::{PipwatchError, TimerConfig};
pub use pipwatch_timer::{
    format_elapsed, AppContext, ControlAction, RunState, TimerEngine, TimerError, TimerSnapshot,
};
