use thiserror::Error;

/// Errors raised at the edges of the timer service.
///
/// The engine's own operations are total; these only come from construction
/// and from decoding externally supplied control codes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("no tokio runtime available to drive the update loop")]
    NoRuntime,
    #[error("unknown control code: {0}")]
    UnknownControlCode(i32),
    #[error("control channel closed")]
    ControlChannelClosed,
}

impl From<TimerError> for pipwatch_core::PipwatchError {
    fn from(err: TimerError) -> Self {
        pipwatch_core::PipwatchError::GeneralError(err.to_string())
    }
}
