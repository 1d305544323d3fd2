//! Fast-start commitment loop.

#![cfg(feature = "solver-highs")]

mod common;

use common::{assert_close, run, TOL};
use mce_algo::{ConstraintSet, DispatchState};
use mce_core::{FastStartProfile, MarketInputs, MarketInputsBuilder, Offer, RegionalDemand, Service, UnitInfo};

/// F is cheap but fast-start; G is the expensive alternative.
fn with_profile(profile: FastStartProfile, f_price: f64) -> MarketInputs {
    MarketInputsBuilder::new()
        .region("NSW")
        .unit(UnitInfo::generator("F", "NSW"))
        .unit(UnitInfo::generator("G", "NSW"))
        .offer(Offer::energy("F", vec![f_price], vec![100.0]))
        .offer(Offer::energy("G", vec![100.0], vec![100.0]))
        .fast_start_profile(profile)
        .demand(RegionalDemand::new("NSW", 60.0))
        .build()
        .unwrap()
}

#[test]
fn test_committed_unit_follows_start_up_ramp() {
    // Committed from mode 0: one minute synchronising, then four of the five
    // minutes of mode two, ending at 4/5 of a 20 MW minimum loading.
    let profile = FastStartProfile::new("F", 0, 20.0).with_mode_lengths(1.0, 5.0, 10.0, 5.0);
    let outcome = run(&with_profile(profile, 20.0));

    assert_close(outcome.dispatch("F", Service::Energy), 16.0, TOL, "F dispatch");
    assert_close(outcome.dispatch("G", Service::Energy), 44.0, TOL, "G dispatch");
    assert_close(outcome.energy_price("NSW").unwrap(), 100.0, 1e-2, "NSW price");
    assert_eq!(outcome.fast_start_iterations, 1);
    assert!(outcome.active_constraint_sets.contains(&ConstraintSet::FastStart));
    assert!(outcome.state_history.contains(&DispatchState::FastStartIterating));
}

#[test]
fn test_uncommitted_unit_stays_off() {
    // Too expensive to be dispatched in the commitment-free solve.
    let profile = FastStartProfile::new("F", 0, 20.0).with_mode_lengths(1.0, 5.0, 10.0, 5.0);
    let outcome = run(&with_profile(profile, 500.0));
    assert_close(outcome.dispatch("F", Service::Energy), 0.0, TOL, "F dispatch");
    assert_close(outcome.dispatch("G", Service::Energy), 60.0, TOL, "G dispatch");
    assert_eq!(outcome.fast_start_iterations, 1);
}

#[test]
fn test_mode_three_holds_minimum_loading() {
    let profile = FastStartProfile::new("F", 3, 30.0).with_mode_lengths(1.0, 5.0, 60.0, 5.0);
    let outcome = run(&with_profile(profile, 200.0));
    assert_close(outcome.dispatch("F", Service::Energy), 30.0, TOL, "F dispatch");
    assert_close(outcome.dispatch("G", Service::Energy), 30.0, TOL, "G dispatch");
    assert_close(outcome.energy_price("NSW").unwrap(), 100.0, 1e-2, "NSW price");
}

#[test]
fn test_mode_four_ramps_down() {
    // Two minutes into a ten minute shutdown: seven minutes in at the end of
    // the interval, leaving 3/10 of 40 MW.
    let profile = FastStartProfile::new("F", 4, 40.0)
        .with_mode_lengths(1.0, 5.0, 10.0, 10.0)
        .with_time_in_current_mode(2.0);
    let outcome = run(&with_profile(profile, 20.0));
    assert_close(outcome.dispatch("F", Service::Energy), 12.0, TOL, "F dispatch");
    assert_close(outcome.dispatch("G", Service::Energy), 48.0, TOL, "G dispatch");
}
