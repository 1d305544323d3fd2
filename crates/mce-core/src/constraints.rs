//! Market-level constraint records: generic constraints and their linking
//! tables, regional demand, FCAS requirements and violation costs.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ValidationResult};
use crate::{InterconnectorId, RegionId, Sense, Service, UnitId};

/// Externally computed network or security constraint.
///
/// The left-hand side is assembled from [`UnitCoefficient`],
/// [`RegionCoefficient`] and [`InterconnectorCoefficient`] rows naming this
/// constraint. A `violation_cost` makes the constraint elastic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericConstraint {
    pub name: String,
    pub sense: Sense,
    pub rhs: f64,
    #[serde(default)]
    pub violation_cost: Option<f64>,
}

impl GenericConstraint {
    pub fn new(name: impl Into<String>, sense: Sense, rhs: f64) -> Self {
        Self {
            name: name.into(),
            sense,
            rhs,
            violation_cost: None,
        }
    }

    pub fn elastic(mut self, violation_cost: f64) -> Self {
        self.violation_cost = Some(violation_cost);
        self
    }

    pub fn is_elastic(&self) -> bool {
        self.violation_cost.is_some()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        ensure_finite(|| format!("generic constraint {} rhs", self.name), self.rhs)?;
        if let Some(cost) = self.violation_cost {
            ensure_finite(|| format!("generic constraint {} violation cost", self.name), cost)?;
        }
        Ok(())
    }
}

/// Coefficient on a unit's dispatch of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCoefficient {
    pub constraint: String,
    pub unit: UnitId,
    pub service: Service,
    pub coefficient: f64,
}

impl UnitCoefficient {
    pub fn new(constraint: impl Into<String>, unit: impl Into<UnitId>, service: Service, coefficient: f64) -> Self {
        Self {
            constraint: constraint.into(),
            unit: unit.into(),
            service,
            coefficient,
        }
    }
}

/// Coefficient applied to every unit of a region for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionCoefficient {
    pub constraint: String,
    pub region: RegionId,
    pub service: Service,
    pub coefficient: f64,
}

impl RegionCoefficient {
    pub fn new(constraint: impl Into<String>, region: impl Into<RegionId>, service: Service, coefficient: f64) -> Self {
        Self {
            constraint: constraint.into(),
            region: region.into(),
            service,
            coefficient,
        }
    }
}

/// Coefficient on an interconnector's flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterconnectorCoefficient {
    pub constraint: String,
    pub interconnector: InterconnectorId,
    pub coefficient: f64,
}

impl InterconnectorCoefficient {
    pub fn new(constraint: impl Into<String>, interconnector: impl Into<InterconnectorId>, coefficient: f64) -> Self {
        Self {
            constraint: constraint.into(),
            interconnector: interconnector.into(),
            coefficient,
        }
    }
}

/// Operational demand a region's balance has to meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalDemand {
    pub region: RegionId,
    pub demand_mw: f64,
    /// Demand used when evaluating demand-dependent loss functions.
    #[serde(default)]
    pub loss_function_demand_mw: Option<f64>,
}

impl RegionalDemand {
    pub fn new(region: impl Into<RegionId>, demand_mw: f64) -> Self {
        Self {
            region: region.into(),
            demand_mw,
            loss_function_demand_mw: None,
        }
    }

    pub fn with_loss_function_demand(mut self, demand_mw: f64) -> Self {
        self.loss_function_demand_mw = Some(demand_mw);
        self
    }

    pub fn loss_function_demand(&self) -> f64 {
        self.loss_function_demand_mw.unwrap_or(self.demand_mw)
    }
}

/// Volume of an FCAS service to be enabled across a set of regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcasRequirement {
    pub name: String,
    pub service: Service,
    pub regions: Vec<RegionId>,
    pub volume_mw: f64,
    #[serde(default = "default_requirement_sense")]
    pub sense: Sense,
    #[serde(default)]
    pub violation_cost: Option<f64>,
}

fn default_requirement_sense() -> Sense {
    Sense::GreaterEqual
}

impl FcasRequirement {
    pub fn new(name: impl Into<String>, service: Service, regions: Vec<RegionId>, volume_mw: f64) -> Self {
        Self {
            name: name.into(),
            service,
            regions,
            volume_mw,
            sense: default_requirement_sense(),
            violation_cost: None,
        }
    }

    pub fn elastic(mut self, violation_cost: f64) -> Self {
        self.violation_cost = Some(violation_cost);
        self
    }
}

/// Violation costs for the feature constraint sets.
///
/// `None` leaves the set hard. Generic constraints and FCAS requirements carry
/// their own costs; `fcas_requirement` is the fallback for requirement rows
/// without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationCosts {
    pub unit_capacity: Option<f64>,
    pub uigf: Option<f64>,
    pub ramp_up: Option<f64>,
    pub ramp_down: Option<f64>,
    pub fast_start: Option<f64>,
    pub fcas_max_availability: Option<f64>,
    pub joint_capacity: Option<f64>,
    pub energy_and_regulation_capacity: Option<f64>,
    pub joint_ramping: Option<f64>,
    pub regional_demand: Option<f64>,
    pub fcas_requirement: Option<f64>,
}

impl ViolationCosts {
    /// Same cost on every feature set.
    pub fn uniform(cost: f64) -> Self {
        Self {
            unit_capacity: Some(cost),
            uigf: Some(cost),
            ramp_up: Some(cost),
            ramp_down: Some(cost),
            fast_start: Some(cost),
            fcas_max_availability: Some(cost),
            joint_capacity: Some(cost),
            energy_and_regulation_capacity: Some(cost),
            joint_ramping: Some(cost),
            regional_demand: Some(cost),
            fcas_requirement: Some(cost),
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        for cost in [
            self.unit_capacity,
            self.uigf,
            self.ramp_up,
            self.ramp_down,
            self.fast_start,
            self.fcas_max_availability,
            self.joint_capacity,
            self.energy_and_regulation_capacity,
            self.joint_ramping,
            self.regional_demand,
            self.fcas_requirement,
        ]
        .into_iter()
        .flatten()
        {
            ensure_finite(|| "violation cost".to_string(), cost)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_constraint_elastic_flag() {
        let hard = GenericConstraint::new("N>>V", Sense::LessEqual, 100.0);
        assert!(!hard.is_elastic());
        let soft = hard.clone().elastic(1e5);
        assert!(soft.is_elastic());
        assert_eq!(soft.violation_cost, Some(1e5));
    }

    #[test]
    fn test_requirement_defaults_to_greater_equal() {
        let json = r#"{"name":"R6_MAIN","service":"raise_6s","regions":["NSW"],"volume_mw":100.0}"#;
        let req: FcasRequirement = serde_json::from_str(json).unwrap();
        assert_eq!(req.sense, Sense::GreaterEqual);
        assert!(req.violation_cost.is_none());
    }

    #[test]
    fn test_violation_costs_partial_deserialize() {
        let costs: ViolationCosts = serde_json::from_str(r#"{"ramp_up": 1000.0}"#).unwrap();
        assert_eq!(costs.ramp_up, Some(1000.0));
        assert!(costs.unit_capacity.is_none());
        assert!(ViolationCosts::uniform(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_loss_function_demand_fallback() {
        let demand = RegionalDemand::new("NSW", 7000.0);
        assert_eq!(demand.loss_function_demand(), 7000.0);
    }
}
