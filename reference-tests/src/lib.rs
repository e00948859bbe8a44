//! Reference test framework for particle kinetics validation
//!
//! This crate runs physical reference scenarios against the kinetics model
//! (containment, energy conservation, entropy rise, clock accuracy,
//! temperature rescaling) and a live hand-off scenario against the
//! background engine, and reports a pass/fail summary for each.

#[cfg(test)]
mod tests;

pub mod scenarios;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kernel::{max_entropy, KineticsParams, ParticleKinetics, SimulationModel};
use orchestrator::{EngineConfig, SimulationEngine, SnapshotCursor};

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Every coordinate stays inside the box
    pub containment: Option<ContainmentCheck>,
    /// Entropy stays in bounds and rises over the run
    pub entropy_rise: Option<EntropyRiseCheck>,
    /// Kinetic energy is unchanged by wall reflections
    pub energy: Option<EnergyCheck>,
    /// Simulated time equals steps times the step size
    pub clock: Option<ClockCheck>,
    /// Measured temperature follows a mid-run rescale
    pub temperature: Option<TemperatureCheck>,
}

/// Check that all coordinates lie within `[0, L]`
#[derive(Debug, Clone)]
pub struct ContainmentCheck {
    /// Allowed slack beyond the walls
    pub margin: f32,
}

/// Check entropy bounds and net rise
#[derive(Debug, Clone)]
pub struct EntropyRiseCheck {
    /// Minimum final minus initial entropy (nats)
    pub min_gain: f64,
}

/// Check kinetic energy drift
#[derive(Debug, Clone)]
pub struct EnergyCheck {
    /// Maximum relative drift |E - E0| / E0
    pub max_drift: f64,
}

/// Check accumulated simulation time
#[derive(Debug, Clone)]
pub struct ClockCheck {
    /// Maximum absolute error (seconds)
    pub tolerance: f64,
}

/// Rescale to `target` halfway through the run, then check the measurement
#[derive(Debug, Clone)]
pub struct TemperatureCheck {
    /// Temperature applied at the halfway step
    pub target: f32,
    /// Relative tolerance (0.0 to 1.0)
    pub tolerance: f64,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Number of updates executed
    pub timesteps: u64,
    /// Simulated time (model units)
    pub sim_time: f64,
    /// Entropy at the end of the run
    pub final_entropy: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Detail message
    pub message: Option<String>,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: String) -> Self {
        Self {
            name: name.to_string(),
            passed,
            message: Some(message),
        }
    }
}

/// A reference test case run directly against the model
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Model parameters (seeded for reproducibility)
    pub params: KineticsParams,
    /// Number of updates to run
    pub timesteps: u64,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, kernel::Error> {
        tracing::info!("Running reference test: {}", self.name);

        let mut model = ParticleKinetics::new(&self.params)?;
        tracing::info!(
            "Initialized: {} particles, L={}, T={}",
            model.particle_count(),
            model.box_length(),
            model.temperature(),
        );

        let initial_energy = model.kinetic_energy();
        let initial_entropy = model.entropy();
        let mut entropy_range = (initial_entropy, initial_entropy);
        let rescale_at = self.timesteps / 2;

        for step in 0..self.timesteps {
            if step == rescale_at {
                if let Some(ref t) = self.expected.temperature {
                    model.set_temperature(t.target)?;
                }
            }
            model.update()?;
            let h = model.entropy();
            entropy_range = (entropy_range.0.min(h), entropy_range.1.max(h));

            // Log progress every 10% of steps
            if (step + 1) % (self.timesteps / 10).max(1) == 0 {
                let progress = ((step + 1) as f64 / self.timesteps as f64) * 100.0;
                tracing::info!(
                    "Progress: {:.0}% ({}/{}), entropy={:.3}",
                    progress,
                    step + 1,
                    self.timesteps,
                    h
                );
            }
        }
        tracing::info!(
            "Simulation complete: {} steps, {:.4} simulated",
            self.timesteps,
            model.time()
        );

        let mut checks = Vec::new();

        if let Some(ref check) = self.expected.containment {
            checks.push(validate_containment(&model, check));
        }
        if let Some(ref check) = self.expected.entropy_rise {
            checks.push(validate_entropy(
                initial_entropy,
                model.entropy(),
                entropy_range,
                check,
            ));
        }
        if let Some(ref check) = self.expected.energy {
            checks.push(validate_energy(initial_energy, model.kinetic_energy(), check));
        }
        if let Some(ref check) = self.expected.clock {
            let expected = self.timesteps as f64 * model.time_step() as f64;
            checks.push(validate_clock(expected, model.time(), check));
        }
        if let Some(ref check) = self.expected.temperature {
            checks.push(validate_temperature(model.measured_temperature(), check));
        }

        Ok(TestResult {
            name: self.name.clone(),
            passed: checks.iter().all(|c| c.passed),
            checks,
            timesteps: self.timesteps,
            sim_time: model.time(),
            final_entropy: model.entropy(),
        })
    }
}

/// Validate that every published coordinate lies within the box
fn validate_containment(model: &ParticleKinetics, check: &ContainmentCheck) -> CheckResult {
    let lo = -check.margin;
    let hi = model.box_length() + check.margin;
    let snap = model.snapshot();
    let violations = snap.coords().iter().filter(|&&c| c < lo || c > hi).count();

    CheckResult::new(
        "Containment",
        violations == 0,
        format!(
            "{} of {} coordinates outside [{:.3}, {:.3}]",
            violations,
            snap.coords().len(),
            lo,
            hi
        ),
    )
}

/// Validate entropy bounds over the run and its net rise
fn validate_entropy(
    initial: f64,
    last: f64,
    range: (f64, f64),
    check: &EntropyRiseCheck,
) -> CheckResult {
    let in_bounds = range.0 >= 0.0 && range.1 <= max_entropy() + 1e-12;
    let gain = last - initial;
    CheckResult::new(
        "Entropy Rise",
        in_bounds && gain >= check.min_gain,
        format!(
            "H: {:.3} -> {:.3} (gain {:.3}, min {:.3}), range [{:.3}, {:.3}] of [0, {:.3}]",
            initial,
            last,
            gain,
            check.min_gain,
            range.0,
            range.1,
            max_entropy()
        ),
    )
}

/// Validate kinetic energy drift
fn validate_energy(initial: f64, last: f64, check: &EnergyCheck) -> CheckResult {
    let drift = if initial.abs() > 1.0e-12 {
        ((last - initial) / initial).abs()
    } else {
        (last - initial).abs()
    };
    CheckResult::new(
        "Energy Conservation",
        drift <= check.max_drift,
        format!("Drift: {:.3e} (limit: {:.1e})", drift, check.max_drift),
    )
}

/// Validate accumulated simulation time
fn validate_clock(expected: f64, actual: f64, check: &ClockCheck) -> CheckResult {
    let error = (actual - expected).abs();
    CheckResult::new(
        "Clock Accuracy",
        error <= check.tolerance,
        format!(
            "Expected: {:.6}, Got: {:.6} (error: {:.2e}, tolerance: {:.1e})",
            expected, actual, error, check.tolerance
        ),
    )
}

/// Validate measured temperature against the rescale target
fn validate_temperature(measured: f64, check: &TemperatureCheck) -> CheckResult {
    let target = check.target as f64;
    let error = (measured - target).abs() / target;
    CheckResult::new(
        "Temperature Rescale",
        error <= check.tolerance,
        format!(
            "Target: {:.4}, Measured: {:.4} (error: {:.1}%, tolerance: {:.1}%)",
            target,
            measured,
            error * 100.0,
            check.tolerance * 100.0
        ),
    )
}

/// A reference test run against the live background engine
pub struct HandoffTest {
    /// Test name
    pub name: String,
    /// Model parameters
    pub params: KineticsParams,
    /// Engine scheduling
    pub engine: EngineConfig,
    /// How long to let the engine run
    pub run_for: Duration,
    /// Minimum number of distinct frames a poller must see
    pub min_frames: usize,
    /// Maximum delay between the stop request and the output freezing
    pub stop_within: Duration,
}

impl HandoffTest {
    /// Run the engine, poll it like a render loop, then stop it
    pub fn run(&self) -> Result<TestResult, orchestrator::Error> {
        tracing::info!("Running reference test: {}", self.name);

        let model = ParticleKinetics::new(&self.params)?;
        let engine = SimulationEngine::new(model, self.engine.clone())?;
        engine.request_run();

        let mut cursor = SnapshotCursor::new();
        let mut times = Vec::new();
        let deadline = Instant::now() + self.run_for;
        while Instant::now() < deadline {
            if let Some(snap) = cursor.next(engine.latest_snapshot()) {
                times.push(snap.time());
            }
            thread::sleep(Duration::from_millis(1));
        }

        let stop_requested = Instant::now();
        engine.request_stop();
        let frozen_after = wait_for_freeze(&engine, self.stop_within * 2);

        let stats = engine.stats();
        let model = engine.join()?;

        let increasing = times.windows(2).all(|w| w[1] > w[0]);
        let mut checks = vec![CheckResult::new(
            "Strictly Increasing Time",
            increasing && times.len() >= self.min_frames,
            format!(
                "{} frames polled (min {}), {} published, {} ticks dropped",
                times.len(),
                self.min_frames,
                stats.published,
                stats.dropped_ticks
            ),
        )];
        checks.push(match frozen_after {
            Some(at) => {
                let delay = at.saturating_duration_since(stop_requested);
                CheckResult::new(
                    "Bounded Stop",
                    delay <= self.stop_within,
                    format!(
                        "Output froze {:.1} ms after stop (limit: {:.1} ms)",
                        delay.as_secs_f64() * 1000.0,
                        self.stop_within.as_secs_f64() * 1000.0
                    ),
                )
            }
            None => CheckResult::new(
                "Bounded Stop",
                false,
                "Output still changing after stop".to_string(),
            ),
        });

        Ok(TestResult {
            name: self.name.clone(),
            passed: checks.iter().all(|c| c.passed),
            checks,
            timesteps: stats.steps,
            sim_time: model.time(),
            final_entropy: model.entropy(),
        })
    }
}

/// Instant at which the published frame stopped changing, if within `limit`.
fn wait_for_freeze<M: SimulationModel>(
    engine: &SimulationEngine<M>,
    limit: Duration,
) -> Option<Instant> {
    const SETTLE: Duration = Duration::from_millis(20);
    let start = Instant::now();
    let mut last = engine.latest_snapshot();
    let mut unchanged_since = Instant::now();
    while start.elapsed() <= limit + SETTLE {
        thread::sleep(Duration::from_millis(1));
        let now = engine.latest_snapshot();
        let same = match (&last, &now) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if !same {
            last = now;
            unchanged_since = Instant::now();
        } else if unchanged_since.elapsed() >= SETTLE {
            return Some(unchanged_since);
        }
    }
    None
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Timesteps: {}", self.timesteps);
        println!("Simulated time: {:.6}", self.sim_time);
        println!("Final entropy: {:.4} (max {:.4})", self.final_entropy, max_entropy());
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}
