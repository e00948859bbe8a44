//! Update throughput across particle counts and entropy cadences.
//!
//! Run with: cargo bench -p kernel --bench update_throughput

use std::time::Instant;

use kernel::{KineticsParams, ParticleKinetics, SimulationModel};

fn build(n: usize, entropy_every: u32) -> ParticleKinetics {
    let mut params = KineticsParams::new(n);
    params.seed = Some(42);
    params.entropy_every = entropy_every;
    match ParticleKinetics::new(&params) {
        Ok(m) => m,
        Err(e) => panic!("invalid benchmark parameters: {e}"),
    }
}

fn main() {
    println!("=== Particle Kinetics Update Throughput ===\n");

    // (particles, steps, entropy every k updates)
    let configs = [
        (1_000, 2_000, 1),
        (10_000, 500, 1),
        (100_000, 100, 1),
        (100_000, 100, 10),
        (1_000_000, 20, 1),
        (1_000_000, 20, 10),
    ];

    println!(
        "{:>10} {:>8} {:>8} {:>12} {:>12} {:>10}",
        "Particles", "Steps", "k", "ms/step", "Mpart/s", "Allocs"
    );

    for &(n, steps, k) in &configs {
        let mut model = build(n, k);

        // Warmup
        for _ in 0..5 {
            if let Err(e) = model.update() {
                panic!("warmup failed: {e}");
            }
        }

        let start = Instant::now();
        for _ in 0..steps {
            if let Err(e) = model.update() {
                panic!("update failed: {e}");
            }
            // Keep one snapshot alive like a live reader would.
            let _held = model.snapshot();
        }
        let elapsed = start.elapsed().as_secs_f64();

        let ms_per_step = elapsed * 1000.0 / steps as f64;
        let mparticles = (n as f64 * steps as f64) / elapsed / 1.0e6;
        println!(
            "{:>10} {:>8} {:>8} {:>12.3} {:>12.1} {:>10}",
            n,
            steps,
            k,
            ms_per_step,
            mparticles,
            model.buffer_allocations()
        );
    }
}
