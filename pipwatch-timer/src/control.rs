//! Remote control of the stopwatch from the floating overlay.
//!
//! The overlay's action buttons deliver a bare integer control code through
//! a host-owned channel. The dispatcher decodes each code and forwards it to
//! the engine as a direct call.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::TimerEngine;
use crate::error::TimerError;

pub const CONTROL_TYPE_CLEAR: i32 = 1;
pub const CONTROL_TYPE_START_OR_PAUSE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Clear,
    StartOrPause,
}

impl ControlAction {
    pub fn from_code(code: i32) -> Result<Self, TimerError> {
        match code {
            CONTROL_TYPE_CLEAR => Ok(ControlAction::Clear),
            CONTROL_TYPE_START_OR_PAUSE => Ok(ControlAction::StartOrPause),
            other => Err(TimerError::UnknownControlCode(other)),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ControlAction::Clear => CONTROL_TYPE_CLEAR,
            ControlAction::StartOrPause => CONTROL_TYPE_START_OR_PAUSE,
        }
    }

    pub fn apply(self, engine: &TimerEngine) {
        match self {
            ControlAction::Clear => engine.clear(),
            ControlAction::StartOrPause => {
                engine.start_or_pause();
            }
        }
    }
}

impl TryFrom<i32> for ControlAction {
    type Error = TimerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        ControlAction::from_code(code)
    }
}

/// Producer side of the control channel, handed to whatever delivers
/// overlay actions.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<i32>,
}

impl ControlSender {
    /// Sends a raw control code. Unknown codes are passed through and
    /// skipped by the dispatcher.
    pub fn send_code(&self, code: i32) -> Result<(), TimerError> {
        self.tx
            .send(code)
            .map_err(|_| TimerError::ControlChannelClosed)
    }

    pub fn send(&self, action: ControlAction) -> Result<(), TimerError> {
        self.send_code(action.code())
    }
}

/// Counters reported when a dispatcher finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub applied: u64,
    pub ignored: u64,
}

/// Consumer side of the control channel.
///
/// Runs until every [`ControlSender`] has been dropped.
pub struct ControlDispatcher {
    engine: TimerEngine,
    rx: mpsc::UnboundedReceiver<i32>,
}

impl ControlDispatcher {
    pub fn channel(engine: TimerEngine) -> (ControlSender, ControlDispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ControlSender { tx }, ControlDispatcher { engine, rx })
    }

    pub async fn run(mut self) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(code) = self.rx.recv().await {
            match ControlAction::from_code(code) {
                Ok(action) => {
                    debug!(?action, code, "applying overlay control");
                    action.apply(&self.engine);
                    stats.applied += 1;
                }
                Err(err) => {
                    warn!(%err, "ignoring overlay control");
                    stats.ignored += 1;
                }
            }
        }
        debug!(applied = stats.applied, ignored = stats.ignored, "control channel closed");
        stats
    }

    pub fn spawn(self) -> JoinHandle<DispatchStats> {
        tokio::spawn(self.run())
    }
}
