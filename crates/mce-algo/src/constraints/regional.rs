//! Market rows: regional energy balance and FCAS requirements.
//!
//! Duals of these rows in the pricing LP are the market prices.

use std::collections::HashSet;

use mce_core::{DispatchType, MarketInputs, RegionId, Sense, Service};

use super::interconnector::PreparedLossModel;
use super::{ConstraintSet, RowSpec};
use crate::registry::{VariableKind, VariableRegistry};

/// One balance row per region:
///
/// ```text
/// Σ gen − Σ load + Σ inflow·lf_to − Σ outflow·lf_from − allocated losses = demand
/// ```
///
/// The to-region carries `(1 − share)` of an interconnector's losses and the
/// from-region carries `share`. Each link of a multi-link interconnector
/// enters with its own regions and loss factors. Regions without a demand
/// record balance to 0.
pub fn regional_demand(
    inputs: &MarketInputs,
    registry: &VariableRegistry,
    loss_models: &[PreparedLossModel],
) -> Vec<RowSpec> {
    inputs
        .regions
        .iter()
        .map(|region| {
            let demand = inputs.demand_for(region).map(|d| d.demand_mw).unwrap_or(0.0);
            let mut row = RowSpec::new(ConstraintSet::Demand, region.as_str(), Sense::Equal, demand);

            for def in registry.iter() {
                if let VariableKind::Bid {
                    service: Service::Energy,
                    region: unit_region,
                    dispatch_type,
                    ..
                } = &def.kind
                {
                    if unit_region == region {
                        row = row.term(def.id, dispatch_type.balance_sign());
                    }
                }
            }

            for ic in &inputs.interconnectors {
                let link = ic.key();
                let Some(flow) = registry.flow(&link) else {
                    continue;
                };
                let share = loss_models
                    .iter()
                    .find(|m| m.link == link)
                    .map(|m| m.from_region_loss_share);
                let loss = registry.loss(&link);
                if &ic.to_region == region {
                    row = row.term(flow, ic.to_region_loss_factor);
                    if let (Some(loss), Some(share)) = (loss, share) {
                        row = row.term(loss, -(1.0 - share));
                    }
                }
                if &ic.from_region == region {
                    row = row.term(flow, -ic.from_region_loss_factor);
                    if let (Some(loss), Some(share)) = (loss, share) {
                        row = row.term(loss, -share);
                    }
                }
            }
            row
        })
        .collect()
}

/// `Σ fcas of units in the covered regions [sense] volume`, per requirement.
pub fn fcas_requirements(inputs: &MarketInputs, registry: &VariableRegistry) -> Vec<RowSpec> {
    inputs
        .fcas_requirements
        .iter()
        .map(|req| {
            let regions: HashSet<&RegionId> = req.regions.iter().collect();
            let mut row = RowSpec::new(ConstraintSet::Fcas, req.name.as_str(), req.sense, req.volume_mw);
            for def in registry.iter() {
                if let VariableKind::Bid { service, region, .. } = &def.kind {
                    if *service == req.service && regions.contains(region) {
                        row = row.term(def.id, 1.0);
                    }
                }
            }
            row
        })
        .collect()
}

/// Net energy injection of a region's units.
pub fn net_unit_dispatch(region: &RegionId, registry: &VariableRegistry, values: &[f64]) -> f64 {
    registry
        .iter()
        .filter_map(|def| match &def.kind {
            VariableKind::Bid {
                service: Service::Energy,
                region: r,
                dispatch_type,
                ..
            } if r == region => Some(match dispatch_type {
                DispatchType::Generator => values[def.id.value()],
                DispatchType::Load => -values[def.id.value()],
            }),
            _ => None,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::interconnector::{prepare_loss_models, LossSegmentSelection};
    use mce_core::{
        FcasRequirement, Interconnector, LossModel, MarketInputsBuilder, Offer, RegionalDemand, UnitId, UnitInfo,
    };

    fn inputs() -> MarketInputs {
        MarketInputsBuilder::new()
            .region("NSW")
            .region("VIC")
            .unit(UnitInfo::generator("A", "NSW"))
            .unit(UnitInfo::load("L", "VIC"))
            .offer(Offer::energy("A", vec![10.0], vec![100.0]))
            .offer(Offer::energy("L", vec![300.0], vec![20.0]))
            .offer(Offer::new("A", Service::Raise6s, vec![1.0], vec![10.0]))
            .interconnector(Interconnector::new("N-V", "NSW", "VIC", -100.0, 100.0).with_loss_factors(0.98, 1.02))
            .loss_model(LossModel::percentage("N-V", 0.4, &[(-100.0, 5.0), (100.0, 5.0)]))
            .fcas_requirement(FcasRequirement::new(
                "R6_MAIN",
                Service::Raise6s,
                vec![RegionId::new("NSW"), RegionId::new("VIC")],
                5.0,
            ))
            .demand(RegionalDemand::new("NSW", 50.0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_balance_rows() {
        let inputs = inputs();
        let mut registry = VariableRegistry::new();
        registry.register_bid_tranches(&inputs).unwrap();
        let losses = prepare_loss_models(&inputs, LossSegmentSelection::Auto);
        registry.register_interconnectors(&inputs, &losses);

        let rows = regional_demand(&inputs, &registry, &losses);
        assert_eq!(rows.len(), 2);

        let flow = registry.flow(&"N-V".into()).unwrap();
        let loss = registry.loss(&"N-V".into()).unwrap();
        let nsw = &rows[0];
        assert_eq!(nsw.rhs, 50.0);
        assert!(nsw.terms.contains(&(flow, -0.98)));
        assert!(nsw.terms.contains(&(loss, -0.4)));

        let vic = &rows[1];
        assert_eq!(vic.rhs, 0.0, "missing demand balances to zero");
        assert!(vic.terms.contains(&(flow, 1.02)));
        assert!(vic.terms.iter().any(|&(v, c)| v == loss && (c + 0.6).abs() < 1e-12));
        let l = registry.bid_variables(&UnitId::new("L"), Service::Energy)[0];
        assert!(vic.terms.contains(&(l, -1.0)));
    }

    #[test]
    fn test_fcas_requirement_rows() {
        let inputs = inputs();
        let mut registry = VariableRegistry::new();
        registry.register_bid_tranches(&inputs).unwrap();
        let rows = fcas_requirements(&inputs, &registry);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "R6_MAIN");
        assert_eq!(rows[0].sense, Sense::GreaterEqual);
        assert_eq!(rows[0].terms.len(), 1);
    }
}
