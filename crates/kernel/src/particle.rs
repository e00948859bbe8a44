//! Particle data structures using struct-of-arrays layout.

use serde::{Deserialize, Serialize};

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel: index `i` across every array refers to the same particle.
/// Separate x/y/z arrays (rather than Vec3) keep the integration loop
/// branch-light and let each axis be reflected independently.
#[derive(Debug, Clone, Default)]
pub struct ParticleArrays {
    // ---- Positions ----
    /// X positions
    pub x: Vec<f32>,
    /// Y positions
    pub y: Vec<f32>,
    /// Z positions
    pub z: Vec<f32>,

    // ---- Velocities ----
    /// X velocities
    pub vx: Vec<f32>,
    /// Y velocities
    pub vy: Vec<f32>,
    /// Z velocities
    pub vz: Vec<f32>,
}

impl ParticleArrays {
    /// Create an empty particle collection with room for `capacity` particles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            vx: Vec::with_capacity(capacity),
            vy: Vec::with_capacity(capacity),
            vz: Vec::with_capacity(capacity),
        }
    }

    /// Return the number of particles currently stored.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Return `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Append a single particle.
    pub fn push_particle(&mut self, position: [f32; 3], velocity: [f32; 3]) {
        self.x.push(position[0]);
        self.y.push(position[1]);
        self.z.push(position[2]);
        self.vx.push(velocity[0]);
        self.vy.push(velocity[1]);
        self.vz.push(velocity[2]);
    }

    /// Overwrite particle `i` in place.
    pub fn set_particle(&mut self, i: usize, position: [f32; 3], velocity: [f32; 3]) {
        self.x[i] = position[0];
        self.y[i] = position[1];
        self.z[i] = position[2];
        self.vx[i] = velocity[0];
        self.vy[i] = velocity[1];
        self.vz[i] = velocity[2];
    }

    /// Copy of particle `i` as a value.
    pub fn state(&self, i: usize) -> ParticleState {
        ParticleState {
            position: [self.x[i], self.y[i], self.z[i]],
            velocity: [self.vx[i], self.vy[i], self.vz[i]],
        }
    }

    /// Sum of 1/2 |v|^2 over all particles (unit mass), accumulated in f64.
    pub fn kinetic_energy(&self) -> f64 {
        let mut energy = 0.0_f64;
        for i in 0..self.len() {
            let vx = self.vx[i] as f64;
            let vy = self.vy[i] as f64;
            let vz = self.vz[i] as f64;
            energy += 0.5 * (vx * vx + vy * vy + vz * vz);
        }
        energy
    }

    /// Multiply every velocity component by `factor`.
    pub fn scale_velocities(&mut self, factor: f32) {
        for v in self
            .vx
            .iter_mut()
            .chain(self.vy.iter_mut())
            .chain(self.vz.iter_mut())
        {
            *v *= factor;
        }
    }

    /// Write packed (x, y, z) triples into `out`, which must hold `3 * len()` values.
    pub fn pack_positions(&self, out: &mut [f32]) {
        for (i, xyz) in out.chunks_exact_mut(3).enumerate() {
            xyz[0] = self.x[i];
            xyz[1] = self.y[i];
            xyz[2] = self.z[i];
        }
    }
}

/// Value copy of one particle, used for the optional per-entity snapshot list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    /// Position (x, y, z).
    pub position: [f32; 3],
    /// Velocity (vx, vy, vz).
    pub velocity: [f32; 3],
}
