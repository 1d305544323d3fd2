//! Energy and FCAS co-optimisation.

#![cfg(feature = "solver-highs")]

mod common;

use common::{assert_close, run, TOL};
use mce_algo::ConstraintSet;
use mce_core::{
    FcasRequirement, FcasTrapezium, MarketInputs, MarketInputsBuilder, Offer, RegionId, RegionalDemand, Service,
    UnitInfo,
};

/// A is cheap energy whose raise 6s shares headroom with its output.
/// B is expensive energy, C offers raise 6s only.
fn co_optimised(requirement_mw: f64) -> MarketInputs {
    co_optimised_at(requirement_mw, 95.0)
}

fn co_optimised_at(requirement_mw: f64, demand_mw: f64) -> MarketInputs {
    MarketInputsBuilder::new()
        .region("NSW")
        .unit(UnitInfo::generator("A", "NSW"))
        .unit(UnitInfo::generator("B", "NSW"))
        .unit(UnitInfo::generator("C", "NSW"))
        .offer(Offer::energy("A", vec![40.0], vec![100.0]))
        .offer(Offer::new("A", Service::Raise6s, vec![0.0], vec![20.0]))
        .offer(Offer::energy("B", vec![80.0], vec![50.0]))
        .offer(Offer::new("C", Service::Raise6s, vec![50.0], vec![10.0]))
        .fcas_trapezium(FcasTrapezium::new("A", Service::Raise6s, 20.0, 0.0, 0.0, 80.0, 100.0))
        .fcas_requirement(FcasRequirement::new(
            "NSW_R6",
            Service::Raise6s,
            vec![RegionId::new("NSW")],
            requirement_mw,
        ))
        .demand(RegionalDemand::new("NSW", demand_mw))
        .build()
        .unwrap()
}

#[test]
fn test_headroom_is_shared() {
    let outcome = run(&co_optimised(25.0));

    // A + raise_6s(A) ≤ 100 holds A at 80 once it carries 20 MW of raise.
    assert_close(outcome.dispatch("A", Service::Energy), 80.0, TOL, "A energy");
    assert_close(outcome.dispatch("A", Service::Raise6s), 20.0, TOL, "A raise 6s");
    assert_close(outcome.dispatch("B", Service::Energy), 15.0, TOL, "B energy");
    assert_close(outcome.dispatch("C", Service::Raise6s), 5.0, TOL, "C raise 6s");

    assert_close(outcome.energy_price("NSW").unwrap(), 80.0, 1e-2, "energy price");
    assert_close(
        outcome.fcas_price("NSW", Service::Raise6s).unwrap(),
        50.0,
        1e-2,
        "raise 6s price",
    );

    for set in [
        ConstraintSet::Fcas,
        ConstraintSet::FcasMaxAvailability,
        ConstraintSet::JointCapacity,
    ] {
        assert!(outcome.active_constraint_sets.contains(&set), "missing {set}");
    }
}

#[test]
fn test_free_fcas_prices_at_zero() {
    let outcome = run(&co_optimised(10.0));
    assert_close(outcome.dispatch("A", Service::Raise6s), 10.0, TOL, "A raise 6s");
    assert_close(outcome.dispatch("A", Service::Energy), 90.0, TOL, "A energy");
    assert_close(outcome.dispatch("C", Service::Raise6s), 0.0, TOL, "C raise 6s");
    // One more MW of raise from A displaces a MW of A's energy with B's.
    assert_close(
        outcome.fcas_price("NSW", Service::Raise6s).unwrap(),
        40.0,
        1e-2,
        "raise 6s price",
    );
}

#[test]
fn test_overlapping_requirements_add_to_region_prices() {
    let inputs = MarketInputsBuilder::new()
        .region("NSW")
        .region("VIC")
        .unit(UnitInfo::generator("A", "NSW"))
        .unit(UnitInfo::generator("B", "VIC"))
        .unit(UnitInfo::generator("C", "NSW"))
        .offer(Offer::new("A", Service::Raise6s, vec![5.0], vec![10.0]))
        .offer(Offer::new("B", Service::Raise6s, vec![8.0], vec![20.0]))
        .offer(Offer::new("C", Service::Raise6s, vec![12.0], vec![20.0]))
        .fcas_requirement(FcasRequirement::new(
            "MAINLAND_R6",
            Service::Raise6s,
            vec![RegionId::new("NSW"), RegionId::new("VIC")],
            25.0,
        ))
        .fcas_requirement(FcasRequirement::new(
            "NSW_R6",
            Service::Raise6s,
            vec![RegionId::new("NSW")],
            15.0,
        ))
        .demand(RegionalDemand::new("NSW", 0.0))
        .demand(RegionalDemand::new("VIC", 0.0))
        .build()
        .unwrap();
    let outcome = run(&inputs);

    assert_close(outcome.dispatch("A", Service::Raise6s), 10.0, TOL, "A raise 6s");
    assert_close(outcome.dispatch("B", Service::Raise6s), 10.0, TOL, "B raise 6s");
    assert_close(outcome.dispatch("C", Service::Raise6s), 5.0, TOL, "C raise 6s");

    // VIC only sees the mainland requirement, priced by B. NSW adds the
    // local requirement's shadow price on top: 8 + (12 − 8).
    assert_close(
        outcome.fcas_price("VIC", Service::Raise6s).unwrap(),
        8.0,
        1e-2,
        "VIC raise 6s price",
    );
    assert_close(
        outcome.fcas_price("NSW", Service::Raise6s).unwrap(),
        12.0,
        1e-2,
        "NSW raise 6s price",
    );
}

#[test]
fn test_availability_reports_unused_headroom() {
    // At 90 MW of energy the joint capacity row binds, so A has nothing spare.
    let outcome = run(&co_optimised(10.0));
    assert_close(
        outcome.fcas_available("A", Service::Raise6s).unwrap(),
        10.0,
        TOL,
        "A raise 6s availability",
    );

    // At 60 MW the 20 MW offer cap binds before the trapezium does.
    let outcome = run(&co_optimised_at(10.0, 60.0));
    assert_close(outcome.dispatch("A", Service::Energy), 60.0, TOL, "A energy");
    assert_close(
        outcome.fcas_available("A", Service::Raise6s).unwrap(),
        20.0,
        TOL,
        "A raise 6s availability",
    );

    // Without a trapezium nothing bounds C's raise beyond its offer.
    assert!(outcome.fcas_available("C", Service::Raise6s).is_none());
}
