//! Batch and sequential dispatch.

#![cfg(feature = "solver-highs")]

mod common;

use common::{assert_close, bid_stack, TOL};
use mce_algo::{dispatch_intervals, dispatch_sequence, Dispatcher};
use mce_core::{MarketInputsBuilder, Offer, RegionalDemand, Service, UnitInfo};

#[test]
fn test_intervals_keep_input_order() {
    let dispatcher = Dispatcher::new().unwrap();
    let intervals: Vec<_> = [60.0, 95.0, 119.0].into_iter().map(bid_stack).collect();
    let summary = dispatch_intervals(&dispatcher, &intervals, 2).unwrap();

    assert_eq!(summary.success, 3);
    assert_eq!(summary.failure, 0);
    let prices: Vec<f64> = summary
        .outcomes
        .iter()
        .map(|o| o.as_ref().unwrap().energy_price("NSW").unwrap())
        .collect();
    assert_close(prices[0], 50.0, 1e-2, "price at 60 MW");
    assert_close(prices[1], 55.0, 1e-2, "price at 95 MW");
    assert_close(prices[2], 60.0, 1e-2, "price at 119 MW");
}

#[test]
fn test_failed_interval_does_not_stop_batch() {
    let dispatcher = Dispatcher::new().unwrap();
    // 200 MW exceeds the 135 MW offered and demand is hard.
    let intervals = vec![bid_stack(60.0), bid_stack(200.0), bid_stack(119.0)];
    let summary = dispatch_intervals(&dispatcher, &intervals, 0).unwrap();
    assert_eq!(summary.success, 2);
    assert_eq!(summary.failure, 1);
    assert!(summary.outcomes[1].is_err());
}

#[test]
fn test_sequence_carries_initial_outputs() {
    // A ramps 600 MW/h, so 50 MW per five-minute interval from standstill.
    let interval = || {
        MarketInputsBuilder::new()
            .region("NSW")
            .unit(UnitInfo::generator("A", "NSW").with_ramp_rates(600.0, 600.0))
            .unit(UnitInfo::generator("B", "NSW"))
            .offer(Offer::energy("A", vec![20.0], vec![200.0]))
            .offer(Offer::energy("B", vec![90.0], vec![200.0]))
            .demand(RegionalDemand::new("NSW", 100.0))
            .build()
            .unwrap()
    };
    let dispatcher = Dispatcher::new().unwrap();
    let outcomes = dispatch_sequence(&dispatcher, vec![interval(), interval(), interval()]).unwrap();

    let a: Vec<f64> = outcomes.iter().map(|o| o.dispatch("A", Service::Energy)).collect();
    assert_close(a[0], 50.0, TOL, "A first interval");
    assert_close(a[1], 100.0, TOL, "A second interval");
    assert_close(a[2], 100.0, TOL, "A third interval");
    assert_close(outcomes[0].energy_price("NSW").unwrap(), 90.0, 1e-2, "price while ramping");
}
