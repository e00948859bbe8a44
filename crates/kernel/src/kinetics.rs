//! Ideal-gas kinetics in a cubic box.
//!
//! `N` independent point particles move ballistically inside `[0, L]^3` and
//! reflect elastically off the walls. Particles start in the sub-cube
//! `[0, f*L]^3` with Gaussian velocities (sigma = sqrt(T) per component), so
//! the gas expands and the occupancy entropy rises toward `ln(1000)`.

use rand::rngs::StdRng;
use rand::{rng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::buffers::SwapBuffers;
use crate::entropy::OccupancyGrid;
use crate::error::{Error, Result};
use crate::particle::{ParticleArrays, ParticleState};
use crate::snapshot::{Entities, Snapshot};
use crate::SimulationModel;

/// Construction parameters of a [`ParticleKinetics`] model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KineticsParams {
    /// Number of particles (> 0)
    pub particle_count: usize,
    /// Side length of the bounding cube (> 0)
    #[serde(default = "default_box_length")]
    pub box_length: f32,
    /// Fraction of the side length initially occupied, in (0, 1]
    #[serde(default = "default_occupied_fraction")]
    pub occupied_fraction: f32,
    /// Initial temperature (> 0); velocity sigma is sqrt(T)
    #[serde(default = "default_temperature")]
    pub initial_temperature: f32,
    /// Integration step used by `update()` (> 0)
    #[serde(default = "default_time_step")]
    pub time_step: f32,
    /// Recompute entropy every k-th update (>= 1)
    #[serde(default = "default_entropy_every")]
    pub entropy_every: u32,
    /// RNG seed for reproducible runs; `None` seeds from the OS
    #[serde(default)]
    pub seed: Option<u64>,
    /// Attach a per-particle list to each snapshot
    #[serde(default)]
    pub publish_entities: bool,
}

fn default_box_length() -> f32 {
    1.0
}

fn default_occupied_fraction() -> f32 {
    0.25
}

fn default_temperature() -> f32 {
    0.01
}

fn default_time_step() -> f32 {
    0.0083
}

fn default_entropy_every() -> u32 {
    1
}

impl KineticsParams {
    /// Parameters with the given population and defaults for everything else.
    pub fn new(particle_count: usize) -> Self {
        Self {
            particle_count,
            box_length: default_box_length(),
            occupied_fraction: default_occupied_fraction(),
            initial_temperature: default_temperature(),
            time_step: default_time_step(),
            entropy_every: default_entropy_every(),
            seed: None,
            publish_entities: false,
        }
    }

    /// Validate every field; never clamps.
    pub fn validate(&self) -> Result<()> {
        if self.particle_count == 0 {
            return Err(Error::InvalidParam("particle_count must be > 0".into()));
        }
        validate_positive("box_length", self.box_length)?;
        if !self.occupied_fraction.is_finite()
            || self.occupied_fraction <= 0.0
            || self.occupied_fraction > 1.0
        {
            return Err(Error::InvalidParam(
                "occupied_fraction must be in (0, 1]".into(),
            ));
        }
        validate_positive("initial_temperature", self.initial_temperature)?;
        validate_positive("time_step", self.time_step)?;
        if self.entropy_every == 0 {
            return Err(Error::InvalidParam("entropy_every must be >= 1".into()));
        }
        Ok(())
    }
}

fn validate_positive(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::InvalidParam(format!("{name} must be finite and > 0")));
    }
    Ok(())
}

/// The particle kinetics model.
///
/// Owns the particle state and the coordinate buffers. `update()` writes the
/// new positions into a back buffer and swaps it to the front once per call;
/// `snapshot()` only clones reference-counted handles.
pub struct ParticleKinetics {
    particles: ParticleArrays,
    coords: SwapBuffers<f32>,
    entities: Option<SwapBuffers<ParticleState>>,
    grid: OccupancyGrid,
    rng: StdRng,
    box_length: f32,
    temperature: f32,
    time_step: f32,
    time: f64,
    step: u64,
    epoch: u32,
    entropy: f64,
    entropy_every: u32,
    entropy_counter: u32,
}

impl ParticleKinetics {
    /// Build a model and seed its front buffer from the initial positions.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if any parameter is out of range.
    pub fn new(params: &KineticsParams) -> Result<Self> {
        params.validate()?;
        let n = params.particle_count;
        let rng = match params.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::seed_from_u64(rng().random()),
        };

        let mut model = Self {
            particles: ParticleArrays::with_capacity(n),
            coords: SwapBuffers::new(3 * n),
            entities: params.publish_entities.then(|| SwapBuffers::new(n)),
            grid: OccupancyGrid::new(params.box_length),
            rng,
            box_length: params.box_length,
            temperature: params.initial_temperature,
            time_step: params.time_step,
            time: 0.0,
            step: 0,
            epoch: 0,
            entropy: 0.0,
            entropy_every: params.entropy_every,
            entropy_counter: 0,
        };
        for _ in 0..n {
            model.particles.push_particle([0.0; 3], [0.0; 3]);
        }
        model.populate(params.occupied_fraction)?;

        tracing::debug!(
            particles = n,
            box_length = params.box_length,
            temperature = params.initial_temperature,
            entropy = model.entropy,
            "kinetics model initialized"
        );
        Ok(model)
    }

    /// Draw fresh positions in `[0, f*L]^3` and Gaussian velocities, then
    /// publish them as the front frame and recompute the entropy.
    fn populate(&mut self, occupied_fraction: f32) -> Result<()> {
        let sub_bound = self.box_length * occupied_fraction;
        let sigma = self.temperature.sqrt();
        for i in 0..self.particles.len() {
            let position = [
                self.rng.random::<f32>() * sub_bound,
                self.rng.random::<f32>() * sub_bound,
                self.rng.random::<f32>() * sub_bound,
            ];
            let velocity = [
                self.rng.sample::<f32, _>(StandardNormal) * sigma,
                self.rng.sample::<f32, _>(StandardNormal) * sigma,
                self.rng.sample::<f32, _>(StandardNormal) * sigma,
            ];
            self.particles.set_particle(i, position, velocity);
        }
        self.entropy = self.grid.entropy(&self.particles);
        self.entropy_counter = 0;
        self.publish()
    }

    /// Copy the current particle state into back buffers and swap them in.
    fn publish(&mut self) -> Result<()> {
        let particles = &self.particles;
        self.coords.write_and_swap::<Error, _>(|out| {
            particles.pack_positions(out);
            Ok(())
        })?;
        if let Some(entities) = self.entities.as_mut() {
            entities.write_and_swap::<Error, _>(|out| {
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = particles.state(i);
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Advance every particle by one explicit Euler step of `dt`, reflecting
    /// off the walls per axis, then swap the finished frame to the front.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `dt` is not finite and positive.
    /// - `Error::NonFinite` if integration produced a NaN/inf coordinate or
    ///   velocity; nothing is published in that case.
    pub fn advance(&mut self, dt: f32) -> Result<()> {
        validate_positive("dt", dt)?;
        let l = self.box_length;
        let step = self.step + 1;
        let p = &self.particles;

        // Integrate into the back buffer only; the particle arrays are
        // committed once the whole frame is known to be finite.
        self.coords.write_and_swap(|out| {
            for (i, xyz) in out.chunks_exact_mut(3).enumerate() {
                let axes = [(p.x[i], p.vx[i]), (p.y[i], p.vy[i]), (p.z[i], p.vz[i])];
                for (slot, (mut pos, mut vel)) in xyz.iter_mut().zip(axes) {
                    reflect(&mut pos, &mut vel, dt, l);
                    if !pos.is_finite() || !vel.is_finite() {
                        return Err(Error::NonFinite { step, particle: i });
                    }
                    *slot = pos;
                }
            }
            Ok(())
        })?;

        let p = &mut self.particles;
        for i in 0..p.len() {
            reflect(&mut p.x[i], &mut p.vx[i], dt, l);
            reflect(&mut p.y[i], &mut p.vy[i], dt, l);
            reflect(&mut p.z[i], &mut p.vz[i], dt, l);
        }

        if let Some(entities) = self.entities.as_mut() {
            let particles = &self.particles;
            entities.write_and_swap::<Error, _>(|out| {
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = particles.state(i);
                }
                Ok(())
            })?;
        }

        self.time += dt as f64;
        self.step = step;

        self.entropy_counter += 1;
        if self.entropy_counter >= self.entropy_every {
            self.entropy = self.grid.entropy(&self.particles);
            self.entropy_counter = 0;
        }
        Ok(())
    }

    /// Rescale every velocity by `sqrt(new / old)`; positions are untouched.
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        validate_positive("temperature", temperature)?;
        let ratio = (temperature / self.temperature).sqrt();
        if !ratio.is_finite() {
            return Err(Error::InvalidParam(format!(
                "temperature rescale {} -> {temperature} overflows",
                self.temperature
            )));
        }
        self.particles.scale_velocities(ratio);
        self.temperature = temperature;
        Ok(())
    }

    /// Reinitialize the same population in place with a new occupied fraction
    /// and temperature. The clock restarts at zero in a new epoch.
    pub fn reset(&mut self, occupied_fraction: f32, temperature: f32) -> Result<()> {
        if !occupied_fraction.is_finite() || occupied_fraction <= 0.0 || occupied_fraction > 1.0 {
            return Err(Error::InvalidParam(
                "occupied_fraction must be in (0, 1]".into(),
            ));
        }
        validate_positive("temperature", temperature)?;
        self.temperature = temperature;
        self.time = 0.0;
        self.step = 0;
        self.epoch = self.epoch.wrapping_add(1);
        self.populate(occupied_fraction)?;
        tracing::debug!(epoch = self.epoch, entropy = self.entropy, "kinetics model reset");
        Ok(())
    }

    /// Set the step used by `update()`.
    pub fn set_time_step(&mut self, dt: f32) -> Result<()> {
        validate_positive("time_step", dt)?;
        self.time_step = dt;
        Ok(())
    }

    /// Recompute the entropy only every `every` updates.
    pub fn set_entropy_every(&mut self, every: u32) -> Result<()> {
        if every == 0 {
            return Err(Error::InvalidParam("entropy_every must be >= 1".into()));
        }
        self.entropy_every = every;
        Ok(())
    }

    /// Number of particles.
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Side length of the bounding cube.
    pub fn box_length(&self) -> f32 {
        self.box_length
    }

    /// Nominal temperature (the last value set, not a measurement).
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Step used by `update()`.
    pub fn time_step(&self) -> f32 {
        self.time_step
    }

    /// Simulation clock of the current epoch.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of resets performed.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Most recent entropy estimate.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    /// Total kinetic energy (unit mass).
    pub fn kinetic_energy(&self) -> f64 {
        self.particles.kinetic_energy()
    }

    /// Temperature measured from the velocities: mean of |v|^2 / 3.
    pub fn measured_temperature(&self) -> f64 {
        2.0 * self.kinetic_energy() / (3.0 * self.particles.len() as f64)
    }

    /// Coordinate buffers allocated so far (two after construction).
    pub fn buffer_allocations(&self) -> u64 {
        self.coords.allocations()
    }
}

/// One axis of the Euler step with elastic wall reflection.
///
/// If the new coordinate leaves `[0, l]` the velocity component flips and
/// the coordinate is clamped back onto the wall.
#[inline]
fn reflect(pos: &mut f32, vel: &mut f32, dt: f32, l: f32) -> f32 {
    let mut next = *pos + *vel * dt;
    if next < 0.0 || next > l {
        *vel = -*vel;
        next = next.clamp(0.0, l);
    }
    *pos = next;
    next
}

impl SimulationModel for ParticleKinetics {
    type Entity = ParticleState;

    fn update(&mut self) -> Result<()> {
        self.advance(self.time_step)
    }

    fn snapshot(&self) -> Snapshot<ParticleState> {
        let entities = match &self.entities {
            Some(e) => Entities::Listed(e.front().clone()),
            None => Entities::Omitted,
        };
        Snapshot::new(
            self.coords.front().clone(),
            entities,
            self.time,
            self.entropy,
            self.epoch,
            self.step,
        )
    }

    fn name(&self) -> &str {
        "particle-kinetics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize) -> ParticleKinetics {
        let mut params = KineticsParams::new(n);
        params.seed = Some(7);
        ParticleKinetics::new(&params).unwrap()
    }

    #[test]
    fn rejects_invalid_params() {
        let mut p = KineticsParams::new(0);
        assert!(ParticleKinetics::new(&p).is_err());
        p.particle_count = 10;
        p.box_length = -1.0;
        assert!(ParticleKinetics::new(&p).is_err());
        p.box_length = 1.0;
        p.occupied_fraction = 1.5;
        assert!(ParticleKinetics::new(&p).is_err());
        p.occupied_fraction = 0.5;
        p.initial_temperature = 0.0;
        assert!(ParticleKinetics::new(&p).is_err());
        p.initial_temperature = 0.1;
        p.entropy_every = 0;
        assert!(ParticleKinetics::new(&p).is_err());
    }

    #[test]
    fn reflection_flips_velocity_and_clamps() {
        let mut x = 0.99_f32;
        let mut v = 2.0_f32;
        let out = reflect(&mut x, &mut v, 0.01, 1.0);
        assert_eq!(out, 1.0);
        assert_eq!(v, -2.0);

        let mut x = 0.001_f32;
        let mut v = -1.0_f32;
        reflect(&mut x, &mut v, 0.01, 1.0);
        assert_eq!(x, 0.0);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn reflection_invariant_holds_for_every_particle() {
        let mut params = KineticsParams::new(500);
        params.seed = Some(11);
        params.initial_temperature = 4.0;
        let mut model = ParticleKinetics::new(&params).unwrap();
        let dt = 0.05;
        for _ in 0..20 {
            let before = model.particles.clone();
            model.advance(dt).unwrap();
            let after = &model.particles;
            for i in 0..before.len() {
                let axes = [
                    (before.x[i], before.vx[i], after.x[i], after.vx[i]),
                    (before.y[i], before.vy[i], after.y[i], after.vy[i]),
                    (before.z[i], before.vz[i], after.z[i], after.vz[i]),
                ];
                for (p0, v0, p1, v1) in axes {
                    let unclamped = p0 + v0 * dt;
                    if unclamped < 0.0 || unclamped > 1.0 {
                        assert_eq!(v1, -v0);
                    } else {
                        assert_eq!(v1, v0);
                    }
                    assert!((0.0..=1.0).contains(&p1));
                }
            }
        }
    }

    #[test]
    fn non_finite_state_is_reported_without_publishing() {
        let mut model = seeded(4);
        let before = model.snapshot();
        model.particles.vx[2] = f32::NAN;
        let err = model.advance(0.01).unwrap_err();
        assert_eq!(err, Error::NonFinite { step: 1, particle: 2 });
        let after = model.snapshot();
        assert!(std::sync::Arc::ptr_eq(before.coord_buffer(), after.coord_buffer()));
        assert_eq!(after.time(), 0.0);
    }

    #[test]
    fn failed_step_leaves_particles_untouched() {
        let mut model = seeded(4);
        model.particles.vx[2] = f32::NAN;
        let particles = model.particles.clone();
        assert!(model.advance(0.01).is_err());

        assert_eq!(model.time(), 0.0);
        assert_eq!(model.snapshot().step(), 0);
        for i in [0, 1, 3] {
            assert_eq!(model.particles.state(i), particles.state(i));
        }
        assert_eq!(model.particles.x[2], particles.x[2]);
        assert_eq!(model.particles.y[2], particles.y[2]);
        assert_eq!(model.particles.z[2], particles.z[2]);
    }

    #[test]
    fn set_temperature_rescales_velocities() {
        let mut model = seeded(200);
        let e0 = model.kinetic_energy();
        let x0 = model.particles.x.clone();
        model.set_temperature(0.04).unwrap();
        // Energy scales with T.
        assert!((model.kinetic_energy() / e0 - 4.0).abs() < 1e-4);
        assert_eq!(model.particles.x, x0);
        assert!(model.set_temperature(-1.0).is_err());
        assert!(model.set_temperature(f32::NAN).is_err());
    }

    #[test]
    fn overflowing_rescale_is_rejected() {
        let mut model = seeded(50);
        model.set_temperature(1e-30).unwrap();
        let velocities = model.particles.vx.clone();
        assert!(matches!(
            model.set_temperature(f32::MAX),
            Err(Error::InvalidParam(_))
        ));
        assert_eq!(model.temperature(), 1e-30);
        assert_eq!(model.particles.vx, velocities);
    }

    #[test]
    fn reset_reuses_buffers_and_starts_new_epoch() {
        let mut model = seeded(100);
        for _ in 0..10 {
            model.update().unwrap();
        }
        let allocations = model.buffer_allocations();
        model.reset(0.5, 0.02).unwrap();
        let snap = model.snapshot();
        assert_eq!(snap.time(), 0.0);
        assert_eq!(snap.epoch(), 1);
        assert_eq!(snap.step(), 0);
        assert!(snap.positions().all(|p| p.iter().all(|&c| (0.0..=0.5).contains(&c))));
        assert_eq!(model.buffer_allocations(), allocations);
        assert_eq!(model.temperature(), 0.02);
    }

    #[test]
    fn entropy_every_defers_recomputation() {
        let mut model = seeded(300);
        model.set_entropy_every(5).unwrap();
        let h0 = model.entropy();
        model.set_temperature(100.0).unwrap();
        for _ in 0..4 {
            model.advance(0.01).unwrap();
            assert_eq!(model.entropy(), h0);
        }
        model.advance(0.01).unwrap();
        assert_ne!(model.entropy(), h0);
        assert!(model.set_entropy_every(0).is_err());
    }

    #[test]
    fn entity_list_tracks_coordinates() {
        let mut params = KineticsParams::new(16);
        params.seed = Some(3);
        params.publish_entities = true;
        let mut model = ParticleKinetics::new(&params).unwrap();
        model.update().unwrap();
        let snap = model.snapshot();
        let entities = snap.entities().unwrap();
        assert_eq!(entities.len(), 16);
        for (e, p) in entities.iter().zip(snap.positions()) {
            assert_eq!(e.position, p);
        }
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: KineticsParams = serde_json::from_str(r#"{ "particle_count": 42 }"#).unwrap();
        assert_eq!(p, KineticsParams::new(42));
    }
}
