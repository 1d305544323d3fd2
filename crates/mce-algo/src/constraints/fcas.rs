//! FCAS trapezium rows.
//!
//! An FCAS trapezium bounds how much of a service a unit can provide as a
//! function of its energy dispatch. The flat top is `max_availability`; the
//! sloped sides are expressed as joint energy/FCAS rows so the model stays
//! linear.

use mce_core::{DispatchType, FcasTrapezium, MarketInputs, Sense, Service};

use super::ramp::RampLimit;
use super::{ConstraintSet, RowSpec};
use crate::registry::VariableRegistry;

/// `Σ fcas ≤ max_availability` for every trapezium with bid variables.
pub fn fcas_max_availability(trapeziums: &[FcasTrapezium], registry: &VariableRegistry) -> Vec<RowSpec> {
    trapeziums
        .iter()
        .filter_map(|t| {
            let vars = registry.bid_variables(&t.unit, t.service);
            (!vars.is_empty()).then(|| {
                RowSpec::new(
                    ConstraintSet::FcasMaxAvailability,
                    format!("{}/{}", t.unit, t.service),
                    Sense::LessEqual,
                    t.max_availability,
                )
                .terms(vars, 1.0)
            })
        })
        .collect()
}

/// Upper and lower slope rows for contingency services, sharing headroom
/// with regulation.
///
/// Upper: `energy + upper_coef·fcas + reg_up ≤ enablement_max`.
/// Lower: `energy − lower_coef·fcas − reg_down ≥ enablement_min`.
/// Generators raise with raise regulation; loads raise by reducing
/// consumption, so the regulation services swap. Bidirectional units use
/// the generator orientation on net energy.
pub fn joint_capacity(inputs: &MarketInputs, registry: &VariableRegistry) -> Vec<RowSpec> {
    let mut rows = Vec::new();
    for t in inputs.fcas_trapeziums.iter().filter(|t| t.service.is_contingency()) {
        let fcas = registry.bid_variables(&t.unit, t.service);
        let energy = registry.unit_terms(&t.unit, Service::Energy);
        if fcas.is_empty() || energy.is_empty() {
            continue;
        }
        let Some(unit) = inputs.unit(&t.unit) else {
            continue;
        };
        let (upper_reg, lower_reg) = match unit.dispatch_type {
            DispatchType::Generator => (Service::RaiseReg, Service::LowerReg),
            DispatchType::Load => (Service::LowerReg, Service::RaiseReg),
        };

        let upper = RowSpec::new(
            ConstraintSet::JointCapacity,
            format!("{}/{}/upper", t.unit, t.service),
            Sense::LessEqual,
            t.enablement_max,
        )
        .scaled(&energy, 1.0)
        .terms(fcas, t.upper_slope_coefficient())
        .terms(registry.bid_variables(&t.unit, upper_reg), 1.0);
        rows.push(upper);

        let lower = RowSpec::new(
            ConstraintSet::JointCapacity,
            format!("{}/{}/lower", t.unit, t.service),
            Sense::GreaterEqual,
            t.enablement_min,
        )
        .scaled(&energy, 1.0)
        .terms(fcas, -t.lower_slope_coefficient())
        .terms(registry.bid_variables(&t.unit, lower_reg), -1.0);
        rows.push(lower);
    }
    rows
}

/// Upper and lower slope rows of regulation trapeziums against energy only.
pub fn energy_and_regulation_capacity(trapeziums: &[FcasTrapezium], registry: &VariableRegistry) -> Vec<RowSpec> {
    let mut rows = Vec::new();
    for t in trapeziums.iter().filter(|t| t.service.is_regulation()) {
        let reg = registry.bid_variables(&t.unit, t.service);
        let energy = registry.unit_terms(&t.unit, Service::Energy);
        if reg.is_empty() || energy.is_empty() {
            continue;
        }
        rows.push(
            RowSpec::new(
                ConstraintSet::EnergyAndRegulationCapacity,
                format!("{}/{}/upper", t.unit, t.service),
                Sense::LessEqual,
                t.enablement_max,
            )
            .scaled(&energy, 1.0)
            .terms(reg, t.upper_slope_coefficient()),
        );
        rows.push(
            RowSpec::new(
                ConstraintSet::EnergyAndRegulationCapacity,
                format!("{}/{}/lower", t.unit, t.service),
                Sense::GreaterEqual,
                t.enablement_min,
            )
            .scaled(&energy, 1.0)
            .terms(reg, -t.lower_slope_coefficient()),
        );
    }
    rows
}

/// Energy plus raise regulation must fit inside the SCADA ramp envelope.
///
/// Generators: `energy + raise_reg ≤ initial + up·I/60`.
/// Loads: `energy − raise_reg ≥ initial − down·I/60`.
pub fn joint_ramping_raise_reg(
    limits: &[RampLimit],
    registry: &VariableRegistry,
    interval_minutes: f64,
) -> Vec<RowSpec> {
    joint_ramping(limits, registry, interval_minutes, Service::RaiseReg)
}

/// Energy minus lower regulation must fit inside the SCADA ramp envelope.
///
/// Generators: `energy − lower_reg ≥ initial − down·I/60`.
/// Loads: `energy + lower_reg ≤ initial + up·I/60`.
pub fn joint_ramping_lower_reg(
    limits: &[RampLimit],
    registry: &VariableRegistry,
    interval_minutes: f64,
) -> Vec<RowSpec> {
    joint_ramping(limits, registry, interval_minutes, Service::LowerReg)
}

fn joint_ramping(
    limits: &[RampLimit],
    registry: &VariableRegistry,
    interval_minutes: f64,
    service: Service,
) -> Vec<RowSpec> {
    let set = match service {
        Service::RaiseReg => ConstraintSet::JointRampingRaiseReg,
        _ => ConstraintSet::JointRampingLowerReg,
    };
    limits
        .iter()
        .filter_map(|limit| {
            let reg = registry.bid_variables(&limit.unit, service);
            let energy = registry.unit_terms(&limit.unit, Service::Energy);
            if reg.is_empty() || energy.is_empty() {
                return None;
            }
            // Raising frequency means more output from a generator and less
            // consumption from a load.
            let pushes_up = (service == Service::RaiseReg) == (limit.dispatch_type == DispatchType::Generator);
            if pushes_up {
                let rhs = limit.max_output(interval_minutes);
                rhs.is_finite().then(|| {
                    RowSpec::new(set, limit.unit.as_str(), Sense::LessEqual, rhs)
                        .scaled(&energy, 1.0)
                        .terms(reg, 1.0)
                })
            } else {
                let rhs = limit.min_output(interval_minutes);
                rhs.is_finite().then(|| {
                    RowSpec::new(set, limit.unit.as_str(), Sense::GreaterEqual, rhs)
                        .scaled(&energy, 1.0)
                        .terms(reg, -1.0)
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ramp::scada_ramp_limits;
    use mce_core::{MarketInputsBuilder, Offer, RegionalDemand, UnitId, UnitInfo};

    fn inputs(dispatch_type: DispatchType) -> MarketInputs {
        MarketInputsBuilder::new()
            .region("NSW")
            .unit(
                UnitInfo::new("U", "NSW", dispatch_type)
                    .with_initial_output(50.0)
                    .with_scada_ramp_rates(120.0, 240.0),
            )
            .offer(Offer::energy("U", vec![10.0], vec![100.0]))
            .offer(Offer::new("U", Service::Raise6s, vec![5.0], vec![30.0]))
            .offer(Offer::new("U", Service::RaiseReg, vec![5.0], vec![20.0]))
            .offer(Offer::new("U", Service::LowerReg, vec![5.0], vec![20.0]))
            .fcas_trapezium(FcasTrapezium::new("U", Service::Raise6s, 25.0, 0.0, 0.0, 75.0, 100.0))
            .fcas_trapezium(FcasTrapezium::new("U", Service::RaiseReg, 20.0, 10.0, 30.0, 70.0, 90.0))
            .demand(RegionalDemand::new("NSW", 10.0))
            .build()
            .unwrap()
    }

    fn registry(inputs: &MarketInputs) -> VariableRegistry {
        let mut registry = VariableRegistry::new();
        registry.register_bid_tranches(inputs).unwrap();
        registry
    }

    #[test]
    fn test_joint_capacity_generator_uses_raise_reg_on_upper_slope() {
        let inputs = inputs(DispatchType::Generator);
        let registry = registry(&inputs);
        let rows = joint_capacity(&inputs, &registry);
        assert_eq!(rows.len(), 2);

        let raise_reg = registry.bid_variables(&UnitId::new("U"), Service::RaiseReg)[0];
        let lower_reg = registry.bid_variables(&UnitId::new("U"), Service::LowerReg)[0];
        let fcas = registry.bid_variables(&UnitId::new("U"), Service::Raise6s)[0];

        let upper = &rows[0];
        assert_eq!(upper.rhs, 100.0);
        assert!(upper.terms.contains(&(raise_reg, 1.0)));
        assert!(upper.terms.contains(&(fcas, 1.0)));

        let lower = &rows[1];
        assert_eq!(lower.sense, Sense::GreaterEqual);
        assert!(lower.terms.contains(&(lower_reg, -1.0)));
        // lower slope is vertical: (0 - 0) / 25
        assert!(lower.terms.contains(&(fcas, 0.0)));
    }

    #[test]
    fn test_joint_capacity_load_swaps_regulation() {
        let inputs = inputs(DispatchType::Load);
        let registry = registry(&inputs);
        let rows = joint_capacity(&inputs, &registry);
        let raise_reg = registry.bid_variables(&UnitId::new("U"), Service::RaiseReg)[0];
        let lower_reg = registry.bid_variables(&UnitId::new("U"), Service::LowerReg)[0];
        assert!(rows[0].terms.contains(&(lower_reg, 1.0)));
        assert!(rows[1].terms.contains(&(raise_reg, -1.0)));
    }

    #[test]
    fn test_energy_and_regulation_capacity_slopes() {
        let inputs = inputs(DispatchType::Generator);
        let registry = registry(&inputs);
        let rows = energy_and_regulation_capacity(&inputs.fcas_trapeziums, &registry);
        assert_eq!(rows.len(), 2);
        let reg = registry.bid_variables(&UnitId::new("U"), Service::RaiseReg)[0];
        // (90 - 70) / 20 and (30 - 10) / 20
        assert!(rows[0].terms.contains(&(reg, 1.0)));
        assert!(rows[1].terms.contains(&(reg, -1.0)));
        assert_eq!(rows[1].rhs, 10.0);
    }

    #[test]
    fn test_joint_ramping_directions() {
        let gen = inputs(DispatchType::Generator);
        let registry = registry(&gen);
        let limits = scada_ramp_limits(&gen);

        let raise = joint_ramping_raise_reg(&limits, &registry, 5.0);
        assert_eq!(raise[0].sense, Sense::LessEqual);
        assert!((raise[0].rhs - 60.0).abs() < 1e-9);

        let lower = joint_ramping_lower_reg(&limits, &registry, 5.0);
        assert_eq!(lower[0].sense, Sense::GreaterEqual);
        assert!((lower[0].rhs - 30.0).abs() < 1e-9);

        let load = inputs(DispatchType::Load);
        let raise = joint_ramping_raise_reg(&scada_ramp_limits(&load), &registry, 5.0);
        assert_eq!(raise[0].sense, Sense::GreaterEqual);
    }

    #[test]
    fn test_max_availability() {
        let inputs = inputs(DispatchType::Generator);
        let registry = registry(&inputs);
        let rows = fcas_max_availability(&inputs.fcas_trapeziums, &registry);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "U/raise_6s");
        assert_eq!(rows[0].rhs, 25.0);
    }
}
