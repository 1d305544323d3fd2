//! The complete input bundle for one dispatch interval.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ValidationError, ValidationResult};
use crate::{
    DispatchType, FastStartProfile, FcasRequirement, FcasTrapezium, GenericConstraint, Interconnector,
    InterconnectorCoefficient, InterconnectorId, LinkKey, LossModel, Offer, RegionCoefficient, RegionId,
    RegionalDemand, UnitCoefficient, UnitId, UnitInfo, UnitLimit, ViolationCosts,
};

/// Every table the clearing engine consumes for one interval.
///
/// Construct through [`MarketInputsBuilder`] (which validates) or deserialize
/// and call [`MarketInputs::validate`] before dispatching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketInputs {
    /// Start of the interval, for time-sequential runs.
    pub interval_start: Option<NaiveDateTime>,
    pub regions: Vec<RegionId>,
    pub units: Vec<UnitInfo>,
    pub offers: Vec<Offer>,
    /// Bid availability limits on energy dispatch.
    pub unit_limits: Vec<UnitLimit>,
    /// Unconstrained intermittent generation forecasts.
    pub uigf_limits: Vec<UnitLimit>,
    pub fcas_trapeziums: Vec<FcasTrapezium>,
    pub interconnectors: Vec<Interconnector>,
    pub loss_models: Vec<LossModel>,
    pub generic_constraints: Vec<GenericConstraint>,
    pub unit_coefficients: Vec<UnitCoefficient>,
    pub region_coefficients: Vec<RegionCoefficient>,
    pub interconnector_coefficients: Vec<InterconnectorCoefficient>,
    pub demand: Vec<RegionalDemand>,
    pub fcas_requirements: Vec<FcasRequirement>,
    pub fast_start_profiles: Vec<FastStartProfile>,
    pub violation_costs: ViolationCosts,
}

impl MarketInputs {
    /// A unit's reference data; the generator side of a bidirectional unit.
    pub fn unit(&self, id: &UnitId) -> Option<&UnitInfo> {
        self.unit_side(id, None)
    }

    /// One side of a unit. `None` resolves to the generator side when the
    /// unit has one, otherwise to its only record.
    pub fn unit_side(&self, id: &UnitId, side: Option<DispatchType>) -> Option<&UnitInfo> {
        let mut records = self.units.iter().filter(|u| &u.id == id);
        match side {
            Some(side) => records.find(|u| u.dispatch_type == side),
            None => records.min_by_key(|u| u.dispatch_type),
        }
    }

    /// The unit side an offer is dispatched on.
    pub fn offer_side(&self, offer: &Offer) -> Option<&UnitInfo> {
        self.unit_side(&offer.unit, offer.dispatch_type)
    }

    /// Units with both a generator and a load record.
    pub fn bidirectional_units(&self) -> HashSet<UnitId> {
        let mut generators = HashSet::new();
        let mut loads = HashSet::new();
        for unit in &self.units {
            match unit.dispatch_type {
                DispatchType::Generator => generators.insert(unit.id.clone()),
                DispatchType::Load => loads.insert(unit.id.clone()),
            };
        }
        generators.intersection(&loads).cloned().collect()
    }

    /// First record of an interconnector.
    pub fn interconnector(&self, id: &InterconnectorId) -> Option<&Interconnector> {
        self.interconnectors.iter().find(|ic| &ic.id == id)
    }

    /// Every link of an interconnector, in input order.
    pub fn links_of<'a>(&'a self, id: &'a InterconnectorId) -> impl Iterator<Item = &'a Interconnector> + 'a {
        self.interconnectors.iter().filter(move |ic| &ic.id == id)
    }

    pub fn loss_model(&self, key: &LinkKey) -> Option<&LossModel> {
        self.loss_models.iter().find(|m| &m.key() == key)
    }

    /// Whether an interconnector is split into more than one link.
    pub fn is_multi_link(&self, id: &InterconnectorId) -> bool {
        self.links_of(id).nth(1).is_some()
    }

    pub fn demand_for(&self, region: &RegionId) -> Option<&RegionalDemand> {
        self.demand.iter().find(|d| &d.region == region)
    }

    /// Replace each unit's initial output, e.g. with the previous interval's dispatch.
    ///
    /// Units missing from `outputs` keep their current value. Both sides of a
    /// bidirectional unit take the same net output.
    pub fn with_initial_outputs(mut self, outputs: &HashMap<UnitId, f64>) -> Self {
        for unit in &mut self.units {
            if let Some(&mw) = outputs.get(&unit.id) {
                unit.initial_output_mw = mw;
            }
        }
        self
    }

    /// Check every column-level invariant and cross-table reference.
    pub fn validate(&self) -> ValidationResult<()> {
        let regions = unique_keys("regions", self.regions.iter().map(|r| r.to_string()))?;
        let known_region = |table: &'static str, region: &RegionId| {
            if regions.contains(region.as_str()) {
                Ok(())
            } else {
                Err(ValidationError::UnknownRegion {
                    table,
                    region: region.clone(),
                })
            }
        };

        unique_keys(
            "units",
            self.units.iter().map(|u| format!("{}/{}", u.id, u.dispatch_type)),
        )?;
        for unit in &self.units {
            known_region("units", &unit.region)?;
            unit.validate()?;
        }
        for id in self.bidirectional_units() {
            let mut regions = self.units.iter().filter(|u| u.id == id).map(|u| &u.region);
            if let (Some(first), Some(second)) = (regions.next(), regions.next()) {
                if first != second {
                    return Err(ValidationError::Other(format!(
                        "bidirectional unit {id} has sides in regions {first} and {second}"
                    )));
                }
            }
        }
        let units: HashSet<&str> = self.units.iter().map(|u| u.id.as_str()).collect();
        let known_unit = |table: &'static str, unit: &UnitId| {
            if units.contains(unit.as_str()) {
                Ok(())
            } else {
                Err(ValidationError::UnknownUnit {
                    table,
                    unit: unit.clone(),
                })
            }
        };

        let mut offer_keys = HashSet::new();
        for offer in &self.offers {
            known_unit("offers", &offer.unit)?;
            let side = self.offer_side(offer).ok_or_else(|| {
                ValidationError::Other(format!(
                    "offer {}/{} names a {} side the unit does not have",
                    offer.unit,
                    offer.service,
                    offer.dispatch_type.map_or("generator", |d| d.as_str())
                ))
            })?;
            let key = format!("{}/{}/{}", offer.unit, side.dispatch_type, offer.service);
            if !offer_keys.insert(key.clone()) {
                return Err(ValidationError::DuplicateKey { table: "offers", key });
            }
            offer.validate()?;
        }

        for (table, limits) in [("unit_limits", &self.unit_limits), ("uigf_limits", &self.uigf_limits)] {
            unique_keys(table, limits.iter().map(|l| l.unit.to_string()))?;
            for limit in limits {
                known_unit(table, &limit.unit)?;
                ensure_finite(|| format!("{} {}", table, limit.unit), limit.capacity_mw)?;
            }
        }

        unique_keys(
            "fcas_trapeziums",
            self.fcas_trapeziums
                .iter()
                .map(|t| format!("{}/{}", t.unit, t.service)),
        )?;
        for trapezium in &self.fcas_trapeziums {
            known_unit("fcas_trapeziums", &trapezium.unit)?;
            trapezium.validate()?;
        }

        let links = unique_keys(
            "interconnectors",
            self.interconnectors.iter().map(|ic| ic.key().to_string()),
        )?;
        for ic in &self.interconnectors {
            known_region("interconnectors", &ic.from_region)?;
            known_region("interconnectors", &ic.to_region)?;
            ic.validate()?;
            if ic.link.is_none() && self.is_multi_link(&ic.id) {
                return Err(ValidationError::InvalidInterconnector {
                    interconnector: ic.id.clone(),
                    reason: "every link of a multi-link interconnector needs a name".into(),
                });
            }
        }
        let interconnectors: HashSet<&str> = self.interconnectors.iter().map(|ic| ic.id.as_str()).collect();
        let known_interconnector = |table: &'static str, id: &InterconnectorId| {
            if interconnectors.contains(id.as_str()) {
                Ok(())
            } else {
                Err(ValidationError::UnknownInterconnector {
                    table,
                    interconnector: id.clone(),
                })
            }
        };

        unique_keys(
            "loss_models",
            self.loss_models.iter().map(|m| m.key().to_string()),
        )?;
        for model in &self.loss_models {
            known_interconnector("loss_models", &model.interconnector)?;
            if !links.contains(&model.key().to_string()) {
                return Err(ValidationError::InvalidInterconnector {
                    interconnector: model.interconnector.clone(),
                    reason: format!("loss model for unknown link {}", model.key()),
                });
            }
            model.validate()?;
            if let crate::LossCurve::Quadratic {
                demand_coefficients, ..
            } = &model.curve
            {
                for (region, k) in demand_coefficients {
                    known_region("loss_models", region)?;
                    ensure_finite(|| format!("loss model {} demand coefficient", model.interconnector), *k)?;
                }
            }
        }

        let generic = unique_keys(
            "generic_constraints",
            self.generic_constraints.iter().map(|c| c.name.clone()),
        )?;
        for constraint in &self.generic_constraints {
            constraint.validate()?;
        }
        let known_generic = |table: &'static str, name: &str| {
            if generic.contains(name) {
                Ok(())
            } else {
                Err(ValidationError::UnknownConstraint {
                    table,
                    name: name.to_string(),
                })
            }
        };
        for row in &self.unit_coefficients {
            known_generic("unit_coefficients", &row.constraint)?;
            known_unit("unit_coefficients", &row.unit)?;
            ensure_finite(|| format!("unit coefficient {}/{}", row.constraint, row.unit), row.coefficient)?;
        }
        for row in &self.region_coefficients {
            known_generic("region_coefficients", &row.constraint)?;
            known_region("region_coefficients", &row.region)?;
            ensure_finite(|| format!("region coefficient {}/{}", row.constraint, row.region), row.coefficient)?;
        }
        for row in &self.interconnector_coefficients {
            known_generic("interconnector_coefficients", &row.constraint)?;
            known_interconnector("interconnector_coefficients", &row.interconnector)?;
            ensure_finite(
                || format!("interconnector coefficient {}/{}", row.constraint, row.interconnector),
                row.coefficient,
            )?;
        }

        unique_keys("demand", self.demand.iter().map(|d| d.region.to_string()))?;
        for demand in &self.demand {
            known_region("demand", &demand.region)?;
            ensure_finite(|| format!("demand {}", demand.region), demand.demand_mw)?;
            if let Some(mw) = demand.loss_function_demand_mw {
                ensure_finite(|| format!("loss function demand {}", demand.region), mw)?;
            }
        }

        unique_keys(
            "fcas_requirements",
            self.fcas_requirements.iter().map(|r| r.name.clone()),
        )?;
        // Generic constraints and FCAS requirements share one namespace for
        // prices, violations and overrides.
        if let Some(shared) = self.fcas_requirements.iter().find(|r| generic.contains(&r.name)) {
            return Err(ValidationError::DuplicateKey {
                table: "constraint_names",
                key: shared.name.clone(),
            });
        }
        for requirement in &self.fcas_requirements {
            if !requirement.service.is_fcas() {
                return Err(ValidationError::Other(format!(
                    "FCAS requirement {} names non-FCAS service {}",
                    requirement.name, requirement.service
                )));
            }
            if requirement.regions.is_empty() {
                return Err(ValidationError::Other(format!(
                    "FCAS requirement {} covers no regions",
                    requirement.name
                )));
            }
            for region in &requirement.regions {
                known_region("fcas_requirements", region)?;
            }
            ensure_finite(|| format!("FCAS requirement {}", requirement.name), requirement.volume_mw)?;
        }

        unique_keys(
            "fast_start_profiles",
            self.fast_start_profiles.iter().map(|p| p.unit.to_string()),
        )?;
        for profile in &self.fast_start_profiles {
            known_unit("fast_start_profiles", &profile.unit)?;
            profile.validate()?;
        }

        self.violation_costs.validate()
    }
}

fn unique_keys(table: &'static str, keys: impl Iterator<Item = String>) -> ValidationResult<HashSet<String>> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key.clone()) {
            return Err(ValidationError::DuplicateKey { table, key });
        }
    }
    Ok(seen)
}

/// Builder for [`MarketInputs`].
///
/// # Example
///
/// ```
/// use mce_core::{MarketInputsBuilder, Offer, RegionalDemand, UnitInfo};
///
/// let inputs = MarketInputsBuilder::new()
///     .region("NSW")
///     .unit(UnitInfo::generator("A", "NSW"))
///     .offer(Offer::energy("A", vec![50.0], vec![100.0]))
///     .demand(RegionalDemand::new("NSW", 80.0))
///     .build()
///     .unwrap();
/// assert_eq!(inputs.offers.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MarketInputsBuilder {
    inputs: MarketInputs,
}

impl MarketInputsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval_start(mut self, start: NaiveDateTime) -> Self {
        self.inputs.interval_start = Some(start);
        self
    }

    pub fn region(mut self, region: impl Into<RegionId>) -> Self {
        self.inputs.regions.push(region.into());
        self
    }

    pub fn unit(mut self, unit: UnitInfo) -> Self {
        self.inputs.units.push(unit);
        self
    }

    pub fn offer(mut self, offer: Offer) -> Self {
        self.inputs.offers.push(offer);
        self
    }

    pub fn unit_limit(mut self, limit: UnitLimit) -> Self {
        self.inputs.unit_limits.push(limit);
        self
    }

    pub fn uigf_limit(mut self, limit: UnitLimit) -> Self {
        self.inputs.uigf_limits.push(limit);
        self
    }

    pub fn fcas_trapezium(mut self, trapezium: FcasTrapezium) -> Self {
        self.inputs.fcas_trapeziums.push(trapezium);
        self
    }

    pub fn interconnector(mut self, interconnector: Interconnector) -> Self {
        self.inputs.interconnectors.push(interconnector);
        self
    }

    pub fn loss_model(mut self, model: LossModel) -> Self {
        self.inputs.loss_models.push(model);
        self
    }

    pub fn generic_constraint(mut self, constraint: GenericConstraint) -> Self {
        self.inputs.generic_constraints.push(constraint);
        self
    }

    pub fn unit_coefficient(mut self, row: UnitCoefficient) -> Self {
        self.inputs.unit_coefficients.push(row);
        self
    }

    pub fn region_coefficient(mut self, row: RegionCoefficient) -> Self {
        self.inputs.region_coefficients.push(row);
        self
    }

    pub fn interconnector_coefficient(mut self, row: InterconnectorCoefficient) -> Self {
        self.inputs.interconnector_coefficients.push(row);
        self
    }

    pub fn demand(mut self, demand: RegionalDemand) -> Self {
        self.inputs.demand.push(demand);
        self
    }

    pub fn fcas_requirement(mut self, requirement: FcasRequirement) -> Self {
        self.inputs.fcas_requirements.push(requirement);
        self
    }

    pub fn fast_start_profile(mut self, profile: FastStartProfile) -> Self {
        self.inputs.fast_start_profiles.push(profile);
        self
    }

    pub fn violation_costs(mut self, costs: ViolationCosts) -> Self {
        self.inputs.violation_costs = costs;
        self
    }

    /// Validate and return the inputs.
    pub fn build(self) -> ValidationResult<MarketInputs> {
        self.inputs.validate()?;
        Ok(self.inputs)
    }

    /// Return the inputs without validating them.
    pub fn build_unchecked(self) -> MarketInputs {
        self.inputs
    }
}
