//! pipwatch timer - the shared stopwatch engine and the seams around it.

pub mod app;
pub mod control;
pub mod display;
pub mod engine;
pub mod error;
pub mod tick;
pub mod time_source;

pub use app::{AppContext, MovieScreen, ScreenFrame, StopwatchScreen};
pub use control::{ControlAction, ControlDispatcher, ControlSender, DispatchStats};
pub use display::{format_elapsed, ZERO_DISPLAY};
pub use engine::{RunState, TimerEngine, TimerEngineBuilder, TimerSnapshot};
pub use error::TimerError;
pub use tick::{IntervalTicks, ManualTicks, TickScheduler};
pub use time_source::{ManualTimeSource, MonotonicTimeSource, TimeSource};
