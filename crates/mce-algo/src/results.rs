//! Dispatch and price results.
//!
//! Read-only projections of a solved model, produced once per interval.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use mce_core::{DispatchType, InterconnectorId, LinkId, MarketInputs, RegionId, Sense, Service, UnitId};
use mce_solver_common::SolverId;
use serde::Serialize;

use crate::constraints::{regional, ConstraintSet};
use crate::elastic::RowViolation;
use crate::model::DispatchModel;
use crate::orchestrator::DispatchState;
use crate::registry::{VariableKind, VariableRegistry};

/// Dispatch of one unit side for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitDispatch {
    pub unit: UnitId,
    pub service: Service,
    pub dispatch_type: DispatchType,
    pub dispatch_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyPrice {
    pub region: RegionId,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FcasPrice {
    pub region: RegionId,
    pub service: Service,
    pub price: f64,
}

/// Flow on one interconnector link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterconnectorFlow {
    pub interconnector: InterconnectorId,
    pub link: Option<LinkId>,
    pub flow_mw: f64,
    pub losses_mw: f64,
}

/// FCAS a unit could still provide once every unit-level FCAS row is
/// respected: its dispatch plus the tightest remaining row slack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FcasAvailability {
    pub unit: UnitId,
    pub service: Service,
    pub availability_mw: f64,
}

/// Energy balance of one region.
///
/// `dispatch_mw + inflow_mw − interconnector_losses_mw` equals the region's demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub region: RegionId,
    /// Generation minus scheduled load.
    pub dispatch_mw: f64,
    /// Net interconnector import, loss factors applied.
    pub inflow_mw: f64,
    /// Interconnector losses allocated to the region.
    pub interconnector_losses_mw: f64,
}

/// Result of dispatching one interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub interval_start: Option<NaiveDateTime>,
    pub solver: SolverId,
    /// Objective of the dispatch MIP.
    pub objective_value: f64,
    pub unit_dispatch: Vec<UnitDispatch>,
    pub energy_prices: Vec<EnergyPrice>,
    pub fcas_prices: Vec<FcasPrice>,
    pub interconnector_flows: Vec<InterconnectorFlow>,
    pub fcas_availability: Vec<FcasAvailability>,
    pub region_summary: Vec<RegionSummary>,
    pub active_constraint_sets: Vec<ConstraintSet>,
    /// `set:row` names of every row in the dispatch model.
    pub constraint_names: Vec<String>,
    pub violations: Vec<RowViolation>,
    /// Over-constrained dispatch scenario the result comes from.
    pub selected_scenario: String,
    pub fast_start_iterations: usize,
    pub prices_clipped: bool,
    pub state_history: Vec<DispatchState>,
}

impl DispatchOutcome {
    pub fn energy_price(&self, region: &str) -> Option<f64> {
        self.energy_prices
            .iter()
            .find(|p| p.region.as_str() == region)
            .map(|p| p.price)
    }

    pub fn fcas_price(&self, region: &str, service: Service) -> Option<f64> {
        self.fcas_prices
            .iter()
            .find(|p| p.region.as_str() == region && p.service == service)
            .map(|p| p.price)
    }

    /// Dispatch of `unit` for `service`; 0 when the unit has no offer.
    ///
    /// Energy of a unit dispatched on both sides is reported net of its load.
    pub fn dispatch(&self, unit: &str, service: Service) -> f64 {
        let sides: Vec<&UnitDispatch> = self
            .unit_dispatch
            .iter()
            .filter(|d| d.unit.as_str() == unit && d.service == service)
            .collect();
        match sides.as_slice() {
            [] => 0.0,
            [only] => only.dispatch_mw,
            both => both.iter().map(|d| d.dispatch_type.balance_sign() * d.dispatch_mw).sum(),
        }
    }

    /// Dispatch of one side of `unit`.
    pub fn dispatch_side(&self, unit: &str, dispatch_type: DispatchType, service: Service) -> f64 {
        self.unit_dispatch
            .iter()
            .find(|d| d.unit.as_str() == unit && d.dispatch_type == dispatch_type && d.service == service)
            .map(|d| d.dispatch_mw)
            .unwrap_or(0.0)
    }

    /// First link of `interconnector`.
    pub fn flow(&self, interconnector: &str) -> Option<&InterconnectorFlow> {
        self.interconnector_flows
            .iter()
            .find(|f| f.interconnector.as_str() == interconnector)
    }

    pub fn link_flow(&self, interconnector: &str, link: &str) -> Option<&InterconnectorFlow> {
        self.interconnector_flows.iter().find(|f| {
            f.interconnector.as_str() == interconnector && f.link.as_ref().is_some_and(|l| l.as_str() == link)
        })
    }

    pub fn fcas_available(&self, unit: &str, service: Service) -> Option<f64> {
        self.fcas_availability
            .iter()
            .find(|a| a.unit.as_str() == unit && a.service == service)
            .map(|a| a.availability_mw)
    }

    pub fn region(&self, region: &str) -> Option<&RegionSummary> {
        self.region_summary.iter().find(|r| r.region.as_str() == region)
    }

    pub fn total_violation(&self) -> f64 {
        self.violations.iter().map(|v| v.violation).sum()
    }

    pub fn violation_for(&self, set: ConstraintSet) -> f64 {
        self.violations
            .iter()
            .filter(|v| v.set == set)
            .map(|v| v.violation)
            .sum()
    }

    /// Energy dispatch per unit, to seed the next interval's initial outputs
    /// through [`MarketInputs::with_initial_outputs`]. Net for units
    /// dispatched on both sides.
    pub fn initial_outputs(&self) -> HashMap<UnitId, f64> {
        self.unit_dispatch
            .iter()
            .filter(|d| d.service == Service::Energy)
            .map(|d| (d.unit.clone(), self.dispatch(d.unit.as_str(), Service::Energy)))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn unit_dispatch(model: &DispatchModel, inputs: &MarketInputs, values: &[f64]) -> Vec<UnitDispatch> {
    let registry = model.variables();
    let mut keys: Vec<&(UnitId, Service)> = registry.bid_keys().collect();
    keys.sort();
    let mut dispatch = Vec::new();
    for (unit, service) in keys {
        for dispatch_type in [DispatchType::Generator, DispatchType::Load] {
            if inputs.unit_side(unit, Some(dispatch_type)).is_none() {
                continue;
            }
            let ids = registry.side_variables(unit, dispatch_type, *service);
            if ids.is_empty() {
                continue;
            }
            dispatch.push(UnitDispatch {
                unit: unit.clone(),
                service: *service,
                dispatch_type,
                dispatch_mw: VariableRegistry::sum(&ids, values),
            });
        }
    }
    dispatch
}

pub(crate) fn interconnector_flows(
    model: &DispatchModel,
    inputs: &MarketInputs,
    values: &[f64],
) -> Vec<InterconnectorFlow> {
    let registry = model.variables();
    inputs
        .interconnectors
        .iter()
        .filter_map(|ic| {
            let link = ic.key();
            let flow = registry.flow(&link)?;
            Some(InterconnectorFlow {
                interconnector: ic.id.clone(),
                link: ic.link.clone(),
                flow_mw: values[flow.value()],
                losses_mw: registry.loss(&link).map(|l| values[l.value()]).unwrap_or(0.0),
            })
        })
        .collect()
}

/// Sets whose rows bound a unit's FCAS dispatch.
const FCAS_LIMITING_SETS: [ConstraintSet; 5] = [
    ConstraintSet::FcasMaxAvailability,
    ConstraintSet::JointCapacity,
    ConstraintSet::EnergyAndRegulationCapacity,
    ConstraintSet::JointRampingRaiseReg,
    ConstraintSet::JointRampingLowerReg,
];

/// Dispatch plus the smallest slack, per unit of coefficient, over every
/// unit-level FCAS row in which the service pushes against the limit.
pub(crate) fn fcas_availability(model: &DispatchModel, values: &[f64]) -> Vec<FcasAvailability> {
    let registry = model.variables();
    let mut room: BTreeMap<(UnitId, Service), f64> = BTreeMap::new();
    for set in FCAS_LIMITING_SETS {
        for row in model.constraints().in_set(set) {
            let slack = match row.sense {
                Sense::LessEqual => row.rhs - row.lhs(values),
                Sense::GreaterEqual => row.lhs(values) - row.rhs,
                Sense::Equal => continue,
            };
            for &(var, coefficient) in &row.terms {
                let VariableKind::Bid { unit, service, .. } = &registry.get(var).kind else {
                    continue;
                };
                let limits = match row.sense {
                    Sense::LessEqual => coefficient > 1e-5,
                    Sense::GreaterEqual => coefficient < -1e-5,
                    Sense::Equal => false,
                };
                if !service.is_fcas() || !limits {
                    continue;
                }
                let headroom = slack.abs() / coefficient.abs();
                room.entry((unit.clone(), *service))
                    .and_modify(|r| *r = r.min(headroom))
                    .or_insert(headroom);
            }
        }
    }
    room.into_iter()
        .map(|((unit, service), headroom)| FcasAvailability {
            availability_mw: registry.unit_value(&unit, service, values) + headroom,
            unit,
            service,
        })
        .collect()
}

pub(crate) fn region_summary(model: &DispatchModel, inputs: &MarketInputs, values: &[f64]) -> Vec<RegionSummary> {
    let registry = model.variables();
    inputs
        .regions
        .iter()
        .map(|region| {
            let mut inflow = 0.0;
            let mut losses = 0.0;
            for ic in &inputs.interconnectors {
                let link = ic.key();
                let Some(flow) = registry.flow(&link).map(|f| values[f.value()]) else {
                    continue;
                };
                let loss = registry.loss(&link).map(|l| values[l.value()]).unwrap_or(0.0);
                let share = model
                    .loss_models()
                    .iter()
                    .find(|m| m.link == link)
                    .map(|m| m.from_region_loss_share)
                    .unwrap_or(0.0);
                if &ic.to_region == region {
                    inflow += flow * ic.to_region_loss_factor;
                    losses += (1.0 - share) * loss;
                }
                if &ic.from_region == region {
                    inflow -= flow * ic.from_region_loss_factor;
                    losses += share * loss;
                }
            }
            RegionSummary {
                region: region.clone(),
                dispatch_mw: regional::net_unit_dispatch(region, registry, values),
                inflow_mw: inflow,
                interconnector_losses_mw: losses,
            }
        })
        .collect()
}

/// Duals of the regional balance rows.
pub(crate) fn energy_prices(model: &DispatchModel, duals: &[f64]) -> Vec<EnergyPrice> {
    model
        .constraints()
        .in_set(ConstraintSet::Demand)
        .map(|row| EnergyPrice {
            region: RegionId::new(row.name.clone()),
            price: duals[row.id.value()],
        })
        .collect()
}

/// Sum of FCAS requirement duals per covered (region, service).
pub(crate) fn fcas_prices(model: &DispatchModel, inputs: &MarketInputs, duals: &[f64]) -> Vec<FcasPrice> {
    let mut prices: BTreeMap<(RegionId, Service), f64> = BTreeMap::new();
    for req in &inputs.fcas_requirements {
        let Some(row) = model.constraints().find(ConstraintSet::Fcas, &req.name) else {
            continue;
        };
        let dual = duals[row.id.value()];
        for region in &req.regions {
            *prices.entry((region.clone(), req.service)).or_insert(0.0) += dual;
        }
    }
    prices
        .into_iter()
        .map(|((region, service), price)| FcasPrice { region, service, price })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> DispatchOutcome {
        DispatchOutcome {
            interval_start: None,
            solver: SolverId::Highs,
            objective_value: 100.0,
            unit_dispatch: vec![
                UnitDispatch {
                    unit: "A".into(),
                    service: Service::Energy,
                    dispatch_type: DispatchType::Generator,
                    dispatch_mw: 40.0,
                },
                UnitDispatch {
                    unit: "A".into(),
                    service: Service::Raise6s,
                    dispatch_type: DispatchType::Generator,
                    dispatch_mw: 5.0,
                },
            ],
            energy_prices: vec![EnergyPrice {
                region: "NSW".into(),
                price: 60.0,
            }],
            fcas_prices: vec![],
            interconnector_flows: vec![InterconnectorFlow {
                interconnector: "X".into(),
                link: Some("X2".into()),
                flow_mw: 30.0,
                losses_mw: 1.0,
            }],
            fcas_availability: vec![FcasAvailability {
                unit: "A".into(),
                service: Service::Raise6s,
                availability_mw: 8.0,
            }],
            region_summary: vec![],
            active_constraint_sets: vec![ConstraintSet::Demand],
            constraint_names: vec!["demand:NSW".into()],
            violations: vec![RowViolation {
                set: ConstraintSet::Generic,
                name: "GC1".into(),
                violation: 2.0,
            }],
            selected_scenario: "base".into(),
            fast_start_iterations: 0,
            prices_clipped: false,
            state_history: vec![DispatchState::Unbuilt],
        }
    }

    #[test]
    fn test_lookups() {
        let outcome = outcome();
        assert_eq!(outcome.energy_price("NSW"), Some(60.0));
        assert_eq!(outcome.energy_price("VIC"), None);
        assert_eq!(outcome.dispatch("A", Service::Raise6s), 5.0);
        assert_eq!(outcome.dispatch("B", Service::Energy), 0.0);
        assert_eq!(outcome.violation_for(ConstraintSet::Generic), 2.0);
        assert_eq!(outcome.violation_for(ConstraintSet::Fcas), 0.0);

        assert_eq!(outcome.fcas_available("A", Service::Raise6s), Some(8.0));
        assert_eq!(outcome.link_flow("X", "X2").map(|f| f.flow_mw), Some(30.0));
        assert!(outcome.link_flow("X", "X1").is_none());

        let initial = outcome.initial_outputs();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[&UnitId::new("A")], 40.0);
    }

    #[test]
    fn test_bidirectional_dispatch_is_net() {
        let mut outcome = outcome();
        outcome.unit_dispatch.push(UnitDispatch {
            unit: "BAT".into(),
            service: Service::Energy,
            dispatch_type: DispatchType::Generator,
            dispatch_mw: 0.0,
        });
        outcome.unit_dispatch.push(UnitDispatch {
            unit: "BAT".into(),
            service: Service::Energy,
            dispatch_type: DispatchType::Load,
            dispatch_mw: 25.0,
        });
        assert_eq!(outcome.dispatch("BAT", Service::Energy), -25.0);
        assert_eq!(outcome.dispatch_side("BAT", DispatchType::Load, Service::Energy), 25.0);
        assert_eq!(outcome.initial_outputs()[&UnitId::new("BAT")], -25.0);
    }

    #[test]
    fn test_json_export() {
        let json = outcome().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["energy_prices"][0]["region"], "NSW");
        assert_eq!(value["unit_dispatch"][1]["service"], "raise_6s");
        assert_eq!(value["solver"], "highs");
    }
}
