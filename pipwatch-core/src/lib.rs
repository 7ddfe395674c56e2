//! Core shared library for the pipwatch workspace.
//!
//! This crate exposes the ambient pieces every other crate leans on:
//! configuration loading, the canonical error types and logging setup.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{Environment, TimerConfig};
pub use errors::{ConfigError, PipwatchError, Result as CoreResult};
