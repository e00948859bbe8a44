//! Reference test integration tests
//!
//! These tests run the full reference suite via cargo test.

use crate::scenarios::{
    clock_accuracy_test, energy_conservation_test, gas_expansion_test, live_handoff_test,
    temperature_rescale_test,
};
use crate::TestResult;

fn assert_passed(result: TestResult) {
    result.print_summary();
    assert!(
        result.passed,
        "{} failed: {:?}",
        result.name,
        result
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| (&c.name, &c.message))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_gas_expansion() {
    assert_passed(gas_expansion_test().run().unwrap());
}

#[test]
fn test_energy_conservation() {
    assert_passed(energy_conservation_test().run().unwrap());
}

#[test]
fn test_clock_accuracy() {
    assert_passed(clock_accuracy_test().run().unwrap());
}

#[test]
fn test_temperature_rescale() {
    assert_passed(temperature_rescale_test().run().unwrap());
}

#[test]
fn test_live_handoff() {
    assert_passed(live_handoff_test().run().unwrap());
}

#[test]
fn test_failed_check_is_reported() {
    let mut test = clock_accuracy_test();
    test.expected.clock = None;
    test.expected.entropy_rise = Some(crate::EntropyRiseCheck { min_gain: 100.0 });
    let result = test.run().unwrap();
    assert!(!result.passed);
    assert_eq!(result.checks.len(), 1);
    assert_eq!(result.checks[0].name, "Entropy Rise");
}
