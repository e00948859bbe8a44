//! The reference scenarios, shared by the binary and `cargo test`.

use std::time::Duration;

use kernel::KineticsParams;
use orchestrator::EngineConfig;

use crate::{
    ClockCheck, ContainmentCheck, EnergyCheck, EntropyRiseCheck, ExpectedResult, HandoffTest,
    ReferenceTest, TemperatureCheck,
};

fn params(n: usize, temperature: f32, seed: u64) -> KineticsParams {
    KineticsParams {
        initial_temperature: temperature,
        seed: Some(seed),
        ..KineticsParams::new(n)
    }
}

/// Gas expansion
///
/// Gas released from the corner sub-cube spreads through the box: entropy
/// rises and stays within [0, ln 1000], no particle leaves the box.
pub fn gas_expansion_test() -> ReferenceTest {
    ReferenceTest {
        name: "Gas Expansion".to_string(),
        params: params(1000, 0.01, 42),
        timesteps: 600,
        expected: ExpectedResult {
            containment: Some(ContainmentCheck { margin: 0.0 }),
            entropy_rise: Some(EntropyRiseCheck { min_gain: 0.5 }),
            ..ExpectedResult::default()
        },
    }
}

/// Energy conservation
///
/// Elastic reflections only flip velocity signs, so kinetic energy is
/// unchanged to rounding.
pub fn energy_conservation_test() -> ReferenceTest {
    ReferenceTest {
        name: "Energy Conservation".to_string(),
        params: params(5000, 1.0, 7),
        timesteps: 1000,
        expected: ExpectedResult {
            containment: Some(ContainmentCheck { margin: 0.0 }),
            energy: Some(EnergyCheck { max_drift: 1.0e-9 }),
            ..ExpectedResult::default()
        },
    }
}

/// Clock accuracy
///
/// 1000 steps of 0.0083 accumulate to 8.3 in f64.
pub fn clock_accuracy_test() -> ReferenceTest {
    ReferenceTest {
        name: "Clock Accuracy".to_string(),
        params: params(100, 0.01, 3),
        timesteps: 1000,
        expected: ExpectedResult {
            clock: Some(ClockCheck { tolerance: 1.0e-9 }),
            ..ExpectedResult::default()
        },
    }
}

/// Temperature rescale
///
/// Halfway through, the gas is rescaled from T=0.5 to T=2.0; the measured
/// temperature (mean v^2 / 3) must follow.
pub fn temperature_rescale_test() -> ReferenceTest {
    ReferenceTest {
        name: "Temperature Rescale".to_string(),
        params: params(20_000, 0.5, 11),
        timesteps: 50,
        expected: ExpectedResult {
            temperature: Some(TemperatureCheck {
                target: 2.0,
                tolerance: 0.05,
            }),
            ..ExpectedResult::default()
        },
    }
}

/// Live hand-off
///
/// A poller on the test thread sees strictly increasing frame times while
/// the engine runs, and the output freezes promptly after a stop.
pub fn live_handoff_test() -> HandoffTest {
    HandoffTest {
        name: "Live Hand-off".to_string(),
        params: params(10_000, 0.01, 5),
        engine: EngineConfig::default(),
        run_for: Duration::from_millis(300),
        min_frames: 5,
        stop_within: Duration::from_millis(200),
    }
}

/// Get all model-level reference tests
pub fn all_tests() -> Vec<ReferenceTest> {
    vec![
        gas_expansion_test(),
        energy_conservation_test(),
        clock_accuracy_test(),
        temperature_rescale_test(),
    ]
}
