//! Error type for configuration and engine control.

use thiserror::Error;

use crate::state::EngineState;

/// Result alias for orchestration calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or controlling an engine.
///
/// Lifecycle requests never fail; only configuration loading, command
/// submission and joining return these.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading a configuration file failed.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid JSON for the expected schema.
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The model rejected its parameters.
    #[error(transparent)]
    Model(#[from] kernel::Error),

    /// The command queue is at capacity; the command was not queued.
    #[error("command queue is full")]
    CommandQueueFull,

    /// The engine is stopped or failed and no longer accepts commands.
    #[error("command queue is closed")]
    CommandQueueClosed,

    /// `join` was called on an engine that is still live.
    #[error("engine has not terminated (state: {0})")]
    NotTerminated(EngineState),

    /// The model was already taken by an earlier `join`, or was lost when
    /// the worker thread could not be spawned.
    #[error("engine model is no longer available")]
    AlreadyJoined,

    /// The worker thread panicked outside the guarded model calls.
    #[error("engine worker thread panicked")]
    WorkerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_pass_through() {
        let e: Error = kernel::Error::InvalidParam("time_step must be > 0".into()).into();
        assert_eq!(e.to_string(), "invalid parameter: time_step must be > 0");
    }

    #[test]
    fn not_terminated_names_state() {
        let msg = Error::NotTerminated(EngineState::Paused).to_string();
        assert!(msg.contains("paused"));
    }
}
