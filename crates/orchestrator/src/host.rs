//! Uniform control contract for whatever owns an engine (a UI panel, a CLI,
//! a test harness).

use std::sync::Arc;

use kernel::{SimulationModel, Snapshot};

use crate::engine::SimulationEngine;
use crate::state::EngineState;

/// Something that owns a `SimulationEngine` and exposes its lifecycle.
///
/// Implementors only provide [`engine`](SimulationHost::engine); every
/// control defaults to the matching engine request.
pub trait SimulationHost {
    /// The model type driven by the hosted engine.
    type Model: SimulationModel;

    /// The hosted engine.
    fn engine(&self) -> &SimulationEngine<Self::Model>;

    /// Start the engine (IDLE -> RUNNING).
    fn start_simulation(&self) {
        self.engine().start();
    }

    /// Run: start if never started, otherwise resume.
    fn run_simulation(&self) {
        self.engine().request_run();
    }

    /// Pause a running engine.
    fn pause_simulation(&self) {
        self.engine().request_pause();
    }

    /// Resume a paused engine.
    fn resume_simulation(&self) {
        self.engine().request_resume();
    }

    /// Stop the engine for good.
    fn stop_simulation(&self) {
        self.engine().request_stop();
    }

    /// Stop and drop any queued model commands.
    fn cancel_simulation(&self) {
        self.engine().request_cancel();
    }

    /// Current lifecycle state.
    fn simulation_state(&self) -> EngineState {
        self.engine().state()
    }

    /// Latest published frame.
    fn latest_snapshot(
        &self,
    ) -> Option<Arc<Snapshot<<Self::Model as SimulationModel>::Entity>>> {
        self.engine().latest_snapshot()
    }

    /// Which controls a bound panel should enable right now.
    fn controls(&self) -> ControlSet {
        ControlSet::for_state(self.simulation_state())
    }
}

/// Enabled/disabled flags for a standard control panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSet {
    /// Start button
    pub start: bool,
    /// Run button (start or resume)
    pub run: bool,
    /// Pause button
    pub pause: bool,
    /// Resume button
    pub resume: bool,
    /// Stop button
    pub stop: bool,
    /// Cancel button
    pub cancel: bool,
    /// Reset button (reinitialize the model, rebuilding the engine if terminal)
    pub reset: bool,
}

impl ControlSet {
    /// Controls that make sense in `state`.
    ///
    /// Resume-style controls are never offered once the engine is STOPPED or
    /// FAILED; reset stays available so the host can rebuild.
    pub fn for_state(state: EngineState) -> Self {
        match state {
            EngineState::Idle => ControlSet {
                start: true,
                run: true,
                stop: true,
                cancel: true,
                reset: true,
                ..ControlSet::default()
            },
            EngineState::Running => ControlSet {
                pause: true,
                stop: true,
                cancel: true,
                ..ControlSet::default()
            },
            EngineState::Paused => ControlSet {
                run: true,
                resume: true,
                stop: true,
                cancel: true,
                reset: true,
                ..ControlSet::default()
            },
            EngineState::Stopped | EngineState::Failed => ControlSet {
                reset: true,
                ..ControlSet::default()
            },
        }
    }
}
