//! Application context and the screens that share its stopwatch.
//!
//! The context owns the single engine for its whole lifetime and passes it to
//! each screen by constructor.

use pipwatch_core::TimerConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::control::{ControlDispatcher, ControlSender};
use crate::engine::{RunState, TimerEngine};
use crate::error::TimerError;
use crate::tick::IntervalTicks;
use crate::time_source::MonotonicTimeSource;

pub struct AppContext {
    config: TimerConfig,
    engine: TimerEngine,
}

impl AppContext {
    /// Builds the production engine from `config` on the current runtime.
    pub fn new(config: TimerConfig) -> Result<Self, TimerError> {
        let engine = TimerEngine::builder()
            .time_source(MonotonicTimeSource::new())
            .tick_scheduler(IntervalTicks::new(config.tick_interval))
            .build()?;
        debug!(tick_interval = ?config.tick_interval, "application context ready");
        Ok(Self { config, engine })
    }

    /// Uses an already wired engine, e.g. one driven by manual time.
    pub fn with_engine(config: TimerConfig, engine: TimerEngine) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn stopwatch_screen(&self) -> StopwatchScreen {
        StopwatchScreen::new(self.engine.clone())
    }

    pub fn movie_screen(&self) -> MovieScreen {
        MovieScreen::new(&self.engine)
    }

    pub fn control_channel(&self) -> (ControlSender, ControlDispatcher) {
        ControlDispatcher::channel(self.engine.clone())
    }
}

/// What a screen draws for the stopwatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenFrame {
    pub display: String,
    pub started: bool,
}

struct TimerObserver {
    display: watch::Receiver<String>,
    run_state: watch::Receiver<RunState>,
}

impl TimerObserver {
    fn new(engine: &TimerEngine) -> Self {
        Self {
            display: engine.observe_elapsed_display(),
            run_state: engine.observe_run_state(),
        }
    }

    fn frame(&mut self) -> ScreenFrame {
        ScreenFrame {
            display: self.display.borrow_and_update().clone(),
            started: self.run_state.borrow_and_update().is_running(),
        }
    }

    /// `None` once the engine is gone.
    async fn next_frame(&mut self) -> Option<ScreenFrame> {
        let changed = tokio::select! {
            changed = self.display.changed() => changed,
            changed = self.run_state.changed() => changed,
        };
        changed.ok()?;
        Some(self.frame())
    }
}

/// Main screen: shows the stopwatch and owns its two buttons.
pub struct StopwatchScreen {
    engine: TimerEngine,
    observer: TimerObserver,
}

impl StopwatchScreen {
    pub fn new(engine: TimerEngine) -> Self {
        let observer = TimerObserver::new(&engine);
        Self { engine, observer }
    }

    pub fn on_start_or_pause(&self) -> RunState {
        self.engine.start_or_pause()
    }

    pub fn on_clear(&self) {
        self.engine.clear();
    }

    /// Label of the start/pause button for the current state.
    pub fn start_or_pause_label(&self) -> &'static str {
        if self.engine.run_state().is_running() {
            "Pause"
        } else {
            "Start"
        }
    }

    pub fn render(&mut self) -> ScreenFrame {
        self.observer.frame()
    }

    pub async fn next_frame(&mut self) -> Option<ScreenFrame> {
        self.observer.next_frame().await
    }
}

/// Second screen: follows the same stopwatch without driving it.
pub struct MovieScreen {
    observer: TimerObserver,
}

impl MovieScreen {
    pub fn new(engine: &TimerEngine) -> Self {
        Self {
            observer: TimerObserver::new(engine),
        }
    }

    pub fn render(&mut self) -> ScreenFrame {
        self.observer.frame()
    }

    pub async fn next_frame(&mut self) -> Option<ScreenFrame> {
        self.observer.next_frame().await
    }
}
