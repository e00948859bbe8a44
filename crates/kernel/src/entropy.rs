//! Shannon entropy over a fixed spatial occupancy histogram.
//!
//! The cube `[0, L]^3` is split into `CELLS_PER_AXIS^3` equal cells. Each
//! particle is bucketed by its coordinates and the entropy
//! `H = -sum p_i ln p_i` is taken over nonempty cells, with
//! `p_i = count_i / N`. This is a coarse "mixedness" indicator, not a
//! thermodynamic entropy.

use crate::particle::ParticleArrays;

/// Cells along each axis of the occupancy grid.
pub const CELLS_PER_AXIS: usize = 10;

/// Total number of cells in the occupancy grid.
pub const CELL_COUNT: usize = CELLS_PER_AXIS * CELLS_PER_AXIS * CELLS_PER_AXIS;

/// Upper bound of the entropy metric: every cell equally occupied.
pub fn max_entropy() -> f64 {
    (CELL_COUNT as f64).ln()
}

/// Reusable occupancy histogram; holds its counts between calls so
/// repeated estimates do not allocate.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    box_length: f32,
    counts: Vec<u32>,
}

impl OccupancyGrid {
    /// Create a grid over a cube of side `box_length`.
    pub fn new(box_length: f32) -> Self {
        Self {
            box_length,
            counts: vec![0; CELL_COUNT],
        }
    }

    /// Cell index along one axis; coordinates on or past the far wall land in the last cell.
    #[inline]
    fn axis_cell(&self, coord: f32) -> usize {
        let cell = (coord / (self.box_length / CELLS_PER_AXIS as f32)) as usize;
        cell.min(CELLS_PER_AXIS - 1)
    }

    /// Flat cell index of a position.
    #[inline]
    pub fn cell_of(&self, x: f32, y: f32, z: f32) -> usize {
        let hx = self.axis_cell(x);
        let hy = self.axis_cell(y);
        let hz = self.axis_cell(z);
        (hx * CELLS_PER_AXIS + hy) * CELLS_PER_AXIS + hz
    }

    /// Estimate the entropy of `particles` in nats. O(N + CELL_COUNT).
    pub fn entropy(&mut self, particles: &ParticleArrays) -> f64 {
        let n = particles.len();
        if n == 0 {
            return 0.0;
        }
        self.counts.fill(0);
        for i in 0..n {
            let cell = self.cell_of(particles.x[i], particles.y[i], particles.z[i]);
            self.counts[cell] += 1;
        }

        let total = n as f64;
        let mut entropy = 0.0_f64;
        for &count in &self.counts {
            if count > 0 {
                let p = count as f64 / total;
                entropy -= p * p.ln();
            }
        }
        entropy
    }
}
