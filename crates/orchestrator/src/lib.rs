//! Orchestration Layer
//!
//! This crate runs simulation models in the background, including:
//! - Configuration loading and validation
//! - Lifecycle state management (idle, running, paused, stopped, failed)
//! - Fixed-timestep scheduling with a bounded catch-up policy
//! - Lock-free snapshot publication to any number of readers
//! - A host control contract and poll-and-compare consumer helpers

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod follow;
pub mod host;
pub mod state;

pub use clock::{OverloadPolicy, TickClock, TickPlan};
pub use config::{EngineConfig, SimulationConfig};
pub use engine::{Command, EngineStats, SimulationEngine};
pub use error::{Error, Result};
pub use follow::{MetricHistory, SnapshotCursor};
pub use host::{ControlSet, SimulationHost};
pub use state::EngineState;

use std::path::Path;

use kernel::ParticleKinetics;

/// Engine driving the particle kinetics model.
pub type KineticsEngine = SimulationEngine<ParticleKinetics>;

/// Create a simulation from a configuration file
///
/// Loads and validates the configuration, builds the model and wraps it in
/// an IDLE engine. Nothing runs until the engine is started.
///
/// # Example
/// ```no_run
/// use orchestrator::create_simulation;
///
/// let engine = create_simulation("configs/gas-expansion.json")?;
/// engine.request_run();
/// if let Some(snap) = engine.latest_snapshot() {
///     println!("t = {:.3}, entropy = {:.3}", snap.time(), snap.metric());
/// }
/// engine.request_stop();
/// # Ok::<(), orchestrator::Error>(())
/// ```
pub fn create_simulation(config_path: impl AsRef<Path>) -> Result<KineticsEngine> {
    let config_path = config_path.as_ref();
    tracing::info!(path = %config_path.display(), "creating simulation from config");

    let config = SimulationConfig::load(config_path)?;
    let model = ParticleKinetics::new(&config.model)?;
    tracing::info!(
        name = %config.name,
        particles = config.model.particle_count,
        tick_rate_hz = config.engine.tick_rate_hz,
        "simulation ready"
    );

    SimulationEngine::new(model, config.engine)
}
