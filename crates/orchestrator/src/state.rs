//! Engine lifecycle state and its lock-free cell.
//!
//! ```text
//! IDLE -> RUNNING <-> PAUSED
//!   \        |          |
//!    +-> STOPPED <------+        (terminal)
//!            RUNNING/PAUSED -> FAILED (terminal)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a `SimulationEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EngineState {
    /// Created, worker not started
    Idle = 0,
    /// Worker advancing the model
    Running = 1,
    /// Worker alive, clock held
    Paused = 2,
    /// Stopped on request (terminal)
    Stopped = 3,
    /// Stopped by a model fault (terminal)
    Failed = 4,
}

impl EngineState {
    /// `true` for `Stopped` and `Failed`; no transition leaves these.
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Stopped | EngineState::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => EngineState::Idle,
            1 => EngineState::Running,
            2 => EngineState::Paused,
            3 => EngineState::Stopped,
            _ => EngineState::Failed,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Stopped => "stopped",
            EngineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Atomic holder of the single authoritative `EngineState`.
///
/// Every change goes through a compare-and-swap so concurrent requests can
/// never resurrect a terminal state.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: EngineState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from -> to`; returns `false` if the current state is not `from`
    /// or `from` is terminal.
    pub(crate) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        if from.is_terminal() {
            return false;
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move any non-terminal state to `to`. Returns the previous state on
    /// success, or the terminal state that blocked the change.
    pub(crate) fn terminate(&self, to: EngineState) -> Result<EngineState, EngineState> {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                if EngineState::from_u8(raw).is_terminal() {
                    None
                } else {
                    Some(to as u8)
                }
            })
            .map(EngineState::from_u8)
            .map_err(EngineState::from_u8)
    }
}
