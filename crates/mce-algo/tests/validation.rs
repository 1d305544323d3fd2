//! Inputs are rejected before any solve.

#[cfg(feature = "solver-highs")]
use mce_algo::{DispatchError, Dispatcher};
use mce_core::{
    FcasRequirement, GenericConstraint, MarketInputsBuilder, Offer, RegionId, RegionalDemand, Sense, Service,
    UnitCoefficient, UnitInfo, ValidationError,
};

#[cfg(feature = "solver-highs")]
fn dispatch_err(builder: MarketInputsBuilder) -> DispatchError {
    Dispatcher::new().unwrap().dispatch(&builder.build_unchecked()).unwrap_err()
}

#[test]
fn test_non_monotonic_offer_rejected() {
    let builder = MarketInputsBuilder::new()
        .region("NSW")
        .unit(UnitInfo::generator("A", "NSW"))
        .offer(Offer::energy("A", vec![60.0, 50.0], vec![10.0, 10.0]))
        .demand(RegionalDemand::new("NSW", 5.0));
    assert!(matches!(
        builder.clone().build(),
        Err(ValidationError::NonMonotonicPrices { .. })
    ));
    #[cfg(feature = "solver-highs")]
    assert!(matches!(
        dispatch_err(builder),
        DispatchError::Validation(ValidationError::NonMonotonicPrices { .. })
    ));
}

#[test]
fn test_unknown_unit_rejected() {
    let builder = MarketInputsBuilder::new()
        .region("NSW")
        .offer(Offer::energy("GHOST", vec![50.0], vec![10.0]));
    assert!(matches!(
        builder.clone().build(),
        Err(ValidationError::UnknownUnit { .. })
    ));
    #[cfg(feature = "solver-highs")]
    assert!(matches!(
        dispatch_err(builder),
        DispatchError::Validation(ValidationError::UnknownUnit { .. })
    ));
}

#[test]
fn test_negative_volume_rejected() {
    let result = MarketInputsBuilder::new()
        .region("NSW")
        .unit(UnitInfo::generator("A", "NSW"))
        .offer(Offer::energy("A", vec![50.0], vec![-1.0]))
        .build();
    assert!(matches!(result, Err(ValidationError::NegativeVolume { .. })));
}

#[test]
fn test_coefficient_for_unknown_constraint_rejected() {
    let result = MarketInputsBuilder::new()
        .region("NSW")
        .unit(UnitInfo::generator("A", "NSW"))
        .generic_constraint(GenericConstraint::new("GC1", Sense::LessEqual, 10.0))
        .unit_coefficient(UnitCoefficient::new("GC2", "A", Service::Energy, 1.0))
        .build();
    assert!(matches!(result, Err(ValidationError::UnknownConstraint { .. })));
}

#[test]
fn test_duplicate_region_rejected() {
    let result = MarketInputsBuilder::new().region("NSW").region("NSW").build();
    assert!(matches!(result, Err(ValidationError::DuplicateKey { .. })));
}

#[test]
fn test_requirement_named_like_generic_constraint_rejected() {
    let builder = MarketInputsBuilder::new()
        .region("NSW")
        .unit(UnitInfo::generator("A", "NSW"))
        .offer(Offer::energy("A", vec![50.0], vec![10.0]))
        .generic_constraint(GenericConstraint::new("NSW_R6", Sense::LessEqual, 10.0))
        .fcas_requirement(FcasRequirement::new(
            "NSW_R6",
            Service::Raise6s,
            vec![RegionId::new("NSW")],
            5.0,
        ))
        .demand(RegionalDemand::new("NSW", 5.0));
    assert!(matches!(
        builder.clone().build(),
        Err(ValidationError::DuplicateKey { table: "constraint_names", .. })
    ));
    #[cfg(feature = "solver-highs")]
    assert!(matches!(
        dispatch_err(builder),
        DispatchError::Validation(ValidationError::DuplicateKey { table: "constraint_names", .. })
    ));
}
