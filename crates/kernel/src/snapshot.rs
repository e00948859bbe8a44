//! Immutable published simulation state.

use std::sync::Arc;

use crate::buffers::SharedBuffer;

/// Optional per-entity payload of a snapshot.
///
/// Large populations usually publish only the packed coordinate buffer
/// (`Omitted`); models that can afford it attach a shared entity list.
#[derive(Debug)]
pub enum Entities<E> {
    /// Only the coordinate buffer is published.
    Omitted,
    /// A shared list of per-entity values, index-aligned with the coordinates.
    Listed(SharedBuffer<E>),
}

impl<E> Clone for Entities<E> {
    fn clone(&self) -> Self {
        match self {
            Entities::Omitted => Entities::Omitted,
            Entities::Listed(list) => Entities::Listed(Arc::clone(list)),
        }
    }
}

/// One fully completed simulation frame.
///
/// Created once per completed update cycle and shared read-only across
/// threads. Cloning is cheap: buffers are reference counted, never copied.
#[derive(Debug)]
pub struct Snapshot<E> {
    coords: SharedBuffer<f32>,
    entities: Entities<E>,
    time: f64,
    metric: f64,
    epoch: u32,
    step: u64,
}

impl<E> Clone for Snapshot<E> {
    fn clone(&self) -> Self {
        Self {
            coords: Arc::clone(&self.coords),
            entities: self.entities.clone(),
            time: self.time,
            metric: self.metric,
            epoch: self.epoch,
            step: self.step,
        }
    }
}

impl<E> Snapshot<E> {
    /// Bundle a completed frame.
    pub fn new(
        coords: SharedBuffer<f32>,
        entities: Entities<E>,
        time: f64,
        metric: f64,
        epoch: u32,
        step: u64,
    ) -> Self {
        Self {
            coords,
            entities,
            time,
            metric,
            epoch,
            step,
        }
    }

    /// Packed (x, y, z) coordinates.
    pub fn coords(&self) -> &[f32] {
        &self.coords
    }

    /// The shared coordinate buffer itself, for zero-copy hand-off to a renderer.
    pub fn coord_buffer(&self) -> &SharedBuffer<f32> {
        &self.coords
    }

    /// Iterate positions as `[x, y, z]`.
    pub fn positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.coords.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    /// Number of entities described by the coordinate buffer.
    pub fn len(&self) -> usize {
        self.coords.len() / 3
    }

    /// Returns `true` if the snapshot holds no entities.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Per-entity list, if the model published one.
    pub fn entities(&self) -> Option<&[E]> {
        match &self.entities {
            Entities::Omitted => None,
            Entities::Listed(list) => Some(list.as_slice()),
        }
    }

    /// Simulation clock at the end of the frame.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Scalar diagnostic (entropy for the kinetics model).
    pub fn metric(&self) -> f64 {
        self.metric
    }

    /// Reset generation; time is non-decreasing within one epoch.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Number of completed updates in this epoch.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Strictly newer than `other`: later epoch, or same epoch and later time.
    pub fn is_newer_than(&self, other: &Snapshot<E>) -> bool {
        (self.epoch, self.time) > (other.epoch, other.time)
    }
}
