//! Reference test binary entry point
//!
//! Runs every reference scenario and exits non-zero if any fails.

use reference_tests::scenarios::{all_tests, live_handoff_test};
use reference_tests::TestResult;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    tracing::info!("Particle Kinetics Reference Test Suite");
    tracing::info!("======================================");

    let tests = all_tests();
    tracing::info!("Found {} reference tests (+1 live engine test)", tests.len());

    let mut results: Vec<TestResult> = Vec::new();
    let mut passed_count = 0;
    let mut failed_count = 0;

    let mut record = |name: &str, outcome: Result<TestResult, String>| match outcome {
        Ok(result) => {
            if result.passed {
                passed_count += 1;
            } else {
                failed_count += 1;
            }
            result.print_summary();
            results.push(result);
        }
        Err(e) => {
            eprintln!("\nERROR running test {}: {}", name, e);
            failed_count += 1;
        }
    };

    for test in &tests {
        record(&test.name, test.run().map_err(|e| e.to_string()));
    }
    let handoff = live_handoff_test();
    record(&handoff.name, handoff.run().map_err(|e| e.to_string()));

    // Print overall summary
    println!("\n{}", "=".repeat(80));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Total tests: {}", passed_count + failed_count);
    println!("Passed: {}", passed_count);
    println!("Failed: {}", failed_count);
    println!("{}", "=".repeat(80));

    // Exit with error code if any tests failed
    if failed_count > 0 {
        std::process::exit(1);
    }
}
