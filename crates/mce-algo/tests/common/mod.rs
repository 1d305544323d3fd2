//! Shared fixtures for the dispatch integration tests.

#![allow(dead_code)]

use mce_algo::{DispatchConfig, DispatchOutcome, Dispatcher};
use mce_core::{MarketInputs, MarketInputsBuilder, Offer, RegionalDemand, UnitInfo};

pub const TOL: f64 = 1e-4;

pub fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{what}: expected {expected}, got {actual}"
    );
}

/// Two units with three bands each in one region.
///
/// A: 20/20/5 MW at 50/60/100, B: 50/30/10 MW at 50/55/80.
pub fn bid_stack(demand_mw: f64) -> MarketInputs {
    MarketInputsBuilder::new()
        .region("NSW")
        .unit(UnitInfo::generator("A", "NSW"))
        .unit(UnitInfo::generator("B", "NSW"))
        .offer(Offer::energy("A", vec![50.0, 60.0, 100.0], vec![20.0, 20.0, 5.0]))
        .offer(Offer::energy("B", vec![50.0, 55.0, 80.0], vec![50.0, 30.0, 10.0]))
        .demand(RegionalDemand::new("NSW", demand_mw))
        .build()
        .unwrap()
}

pub fn run(inputs: &MarketInputs) -> DispatchOutcome {
    run_with(inputs, DispatchConfig::default())
}

pub fn run_with(inputs: &MarketInputs, config: DispatchConfig) -> DispatchOutcome {
    mce_solver_common::init_tracing("warn");
    Dispatcher::with_config(config).unwrap().dispatch(inputs).unwrap()
}
