//! Walkthrough Integration Tests
//!
//! Runs the demo scenarios end to end and checks heap counters.

use arc_demo::{run, run_all, Scenario};

/// Test: every scenario leaks exactly what it documents
#[test]
fn test_scenarios_leak_only_documented_instances() {
    for report in run_all().unwrap() {
        assert_eq!(
            report.stats.live_instances(),
            report.scenario.expected_leaks(),
            "{:?}",
            report.scenario
        );
        assert_eq!(report.stats.traps, 0);
    }
}

/// Test: non-leaking scenarios reclaim every header they allocated
#[test]
fn test_non_leaking_scenarios_reclaim_headers() {
    for scenario in [
        Scenario::Basic,
        Scenario::Weak,
        Scenario::Unowned,
        Scenario::UnownedOptional,
    ] {
        let report = run(scenario).unwrap().remove(0);
        assert_eq!(
            report.stats.headers_reclaimed, report.stats.instances_allocated,
            "{:?}",
            scenario
        );
        assert_eq!(report.stats.zombie_headers(), 0);
    }
}
