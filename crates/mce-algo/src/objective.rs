//! Objective builder.
//!
//! Cost terms are additive per variable, so bid costs and the slack costs
//! appended by the elasticity transformer never overwrite each other.

use std::collections::BTreeMap;

use mce_core::{DispatchType, MarketInputs, Service};

use crate::registry::{VarId, VariableKind, VariableRegistry};

/// Linear minimisation objective.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Objective {
    coefficients: BTreeMap<VarId, f64>,
}

impl Objective {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `cost` to the coefficient of `var`.
    pub fn add(&mut self, var: VarId, cost: f64) {
        *self.coefficients.entry(var).or_insert(0.0) += cost;
    }

    pub fn cost(&self, var: VarId) -> f64 {
        self.coefficients.get(&var).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.coefficients.iter().map(|(&var, &cost)| (var, cost))
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .map(|(var, cost)| cost * values[var.value()])
            .sum()
    }

    /// Cost of every bid variable.
    ///
    /// Energy prices are referred to the regional reference node by dividing
    /// by the unit's loss factor; load energy bids enter with the opposite
    /// sign since dispatching a load earns its bid price. FCAS prices are used
    /// unscaled. Returns the number of terms added.
    pub fn add_bid_costs(&mut self, registry: &VariableRegistry, inputs: &MarketInputs) -> usize {
        let mut added = 0;
        for def in registry.iter() {
            let VariableKind::Bid {
                unit,
                service,
                dispatch_type,
                price,
                ..
            } = &def.kind
            else {
                continue;
            };
            let cost = if *service == Service::Energy {
                let loss_factor = inputs
                    .unit_side(unit, Some(*dispatch_type))
                    .map(|u| u.loss_factor)
                    .unwrap_or(1.0);
                let referred = price / loss_factor;
                match dispatch_type {
                    DispatchType::Generator => referred,
                    DispatchType::Load => -referred,
                }
            } else {
                *price
            };
            self.add(def.id, cost);
            added += 1;
        }
        added
    }
}
