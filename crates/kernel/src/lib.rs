//! Particle Kinetics Kernel
//!
//! This crate provides the model side of the background simulation core: the
//! capability a model must offer to be driven by an engine, the immutable
//! snapshot values it publishes, and one concrete model (an ideal gas of
//! independent point particles in a cube).
//!
//! # Modules
//! - [`particle`] -- Struct-of-arrays particle storage and `ParticleState`.
//! - [`buffers`] -- Front/back buffer pool for allocation-free publication.
//! - [`snapshot`] -- Immutable published frames (`Snapshot`, `Entities`).
//! - [`entropy`] -- 10x10x10 occupancy-grid Shannon entropy.
//! - [`kinetics`] -- The `ParticleKinetics` model and its parameters.
//! - [`error`] -- Kernel error type.

#![warn(missing_docs)]

pub mod buffers;
pub mod entropy;
pub mod error;
pub mod kinetics;
pub mod particle;
pub mod snapshot;

pub use buffers::{SharedBuffer, SwapBuffers};
pub use entropy::{max_entropy, OccupancyGrid};
pub use error::{Error, Result};
pub use kinetics::{KineticsParams, ParticleKinetics};
pub use particle::{ParticleArrays, ParticleState};
pub use snapshot::{Entities, Snapshot};

// ---------------------------------------------------------------------------
// SimulationModel trait
// ---------------------------------------------------------------------------

/// Trait that every model driven by the engine must implement.
///
/// A model owns its state exclusively and is only ever touched from one
/// thread at a time. Each `update()` advances exactly one fixed step; the
/// engine calls it back-to-back when catching up.
pub trait SimulationModel: Send + 'static {
    /// Per-entity value optionally attached to snapshots.
    type Entity: Send + Sync + 'static;

    /// Advance internal state by one discrete step.
    ///
    /// An error means the model can no longer make progress; the previously
    /// published snapshot stays valid.
    fn update(&mut self) -> Result<()>;

    /// State as of the most recently completed `update()`.
    ///
    /// Must not allocate in proportion to the population and must never
    /// expose a partially written buffer.
    fn snapshot(&self) -> Snapshot<Self::Entity>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "model"
    }
}
