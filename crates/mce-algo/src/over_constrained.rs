//! Over-constrained dispatch (OCD) reruns.
//!
//! When a base solve prices a region at or beyond the market limits because
//! an elastic generic or FCAS row had to be violated, the interval is re-run
//! with the violated rows moved just far enough to be satisfied. Caller
//! declared RHS-override scenarios are evaluated alongside. The scenario with
//! the lowest objective wins.

use mce_core::{MarketInputs, ValidationError};
use serde::{Deserialize, Serialize};

use crate::constraints::ConstraintSet;
use crate::elastic::RowViolation;
use crate::error::DispatchError;
use crate::model::DispatchModel;
use crate::registry::VariableKind;
use crate::results::{EnergyPrice, FcasPrice};

pub const BASE_SCENARIO: &str = "base";
pub const RELAXED_SCENARIO: &str = "relaxed";

/// New right-hand side for a generic constraint or FCAS requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhsOverride {
    pub constraint: String,
    pub rhs: f64,
}

/// A named set of RHS overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioVariant {
    pub name: String,
    #[serde(default)]
    pub rhs_overrides: Vec<RhsOverride>,
}

impl ScenarioVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rhs_overrides: Vec::new(),
        }
    }

    pub fn with_override(mut self, constraint: impl Into<String>, rhs: f64) -> Self {
        self.rhs_overrides.push(RhsOverride {
            constraint: constraint.into(),
            rhs,
        });
        self
    }

    /// Copy of `inputs` with the overrides applied.
    ///
    /// A name matching a generic constraint sets its RHS; otherwise a name
    /// matching an FCAS requirement sets its volume.
    pub fn apply(&self, inputs: &MarketInputs) -> Result<MarketInputs, DispatchError> {
        let mut out = inputs.clone();
        for o in &self.rhs_overrides {
            if !o.rhs.is_finite() {
                return Err(ValidationError::NonFinite {
                    context: format!("scenario {} override {}", self.name, o.constraint),
                    value: o.rhs,
                }
                .into());
            }
            if let Some(c) = out.generic_constraints.iter_mut().find(|c| c.name == o.constraint) {
                c.rhs = o.rhs;
            } else if let Some(r) = out.fcas_requirements.iter_mut().find(|r| r.name == o.constraint) {
                r.volume_mw = o.rhs;
            } else {
                return Err(ValidationError::UnknownConstraint {
                    table: "scenario_overrides",
                    name: o.constraint.clone(),
                }
                .into());
            }
        }
        Ok(out)
    }
}

/// How equal-objective scenarios are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTieBreak {
    /// Base first, then declared scenarios in order, then the relaxed one.
    #[default]
    DeclarationOrder,
    /// Least total elastic violation, then declaration order.
    LeastViolation,
}

/// Which outcomes have their prices clipped to the market limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipPolicy {
    /// Only outcomes selected from a rerun.
    #[default]
    SelectedScenario,
    /// Every outcome while over-constrained dispatch is enabled.
    AllOutcomes,
}

/// Over-constrained dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverConstrainedConfig {
    pub enabled: bool,
    /// Market price floor ($/MWh).
    pub energy_floor: f64,
    /// Market price cap ($/MWh).
    pub energy_ceiling: f64,
    pub fcas_floor: f64,
    pub fcas_ceiling: f64,
    pub tie_break: ScenarioTieBreak,
    pub clip_policy: ClipPolicy,
    /// Declared RHS-override scenarios, evaluated in order.
    pub scenarios: Vec<ScenarioVariant>,
    /// Slack above which a generic or FCAS row counts as violated.
    pub violation_tolerance: f64,
    /// Extra RHS movement beyond the violation in the relaxed scenario.
    pub relaxation_margin: f64,
}

impl Default for OverConstrainedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            energy_floor: -1000.0,
            energy_ceiling: 15_500.0,
            fcas_floor: 0.0,
            fcas_ceiling: 15_500.0,
            tie_break: ScenarioTieBreak::DeclarationOrder,
            clip_policy: ClipPolicy::SelectedScenario,
            scenarios: Vec::new(),
            violation_tolerance: 1e-4,
            relaxation_margin: 0.01,
        }
    }
}

impl OverConstrainedConfig {
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.energy_floor >= self.energy_ceiling || self.fcas_floor >= self.fcas_ceiling {
            return Err(DispatchError::Config(format!(
                "price floors must sit below ceilings (energy {}..{}, FCAS {}..{})",
                self.energy_floor, self.energy_ceiling, self.fcas_floor, self.fcas_ceiling
            )));
        }
        let mut names = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            if scenario.name == BASE_SCENARIO || scenario.name == RELAXED_SCENARIO {
                return Err(DispatchError::Config(format!(
                    "scenario name '{}' is reserved",
                    scenario.name
                )));
            }
            if !names.insert(scenario.name.as_str()) {
                return Err(DispatchError::Config(format!("duplicate scenario '{}'", scenario.name)));
            }
        }
        Ok(())
    }

    /// Prices at a market limit caused by a violated generic or FCAS row.
    pub fn is_triggered(&self, energy: &[EnergyPrice], fcas: &[FcasPrice], violations: &[RowViolation]) -> bool {
        let extreme_price = energy
            .iter()
            .any(|p| p.price >= self.energy_ceiling || p.price <= self.energy_floor)
            || fcas.iter().any(|p| p.price >= self.fcas_ceiling);
        let violated = violations.iter().any(|v| {
            matches!(v.set, ConstraintSet::Generic | ConstraintSet::Fcas) && v.violation > self.violation_tolerance
        });
        extreme_price && violated
    }

    /// Clip prices into the market limits. Returns whether anything moved.
    pub fn clip_prices(&self, energy: &mut [EnergyPrice], fcas: &mut [FcasPrice]) -> bool {
        let mut clipped = false;
        for p in energy.iter_mut() {
            let c = p.price.clamp(self.energy_floor, self.energy_ceiling);
            clipped |= c != p.price;
            p.price = c;
        }
        for p in fcas.iter_mut() {
            let c = p.price.clamp(self.fcas_floor, self.fcas_ceiling);
            clipped |= c != p.price;
            p.price = c;
        }
        clipped
    }

    /// Scenario that moves every violated generic and FCAS row of `model`
    /// by its violation plus the margin, towards feasibility.
    pub fn relaxed_variant(&self, model: &DispatchModel, values: &[f64]) -> Option<ScenarioVariant> {
        let mut shifts: Vec<(String, f64, f64)> = Vec::new();
        for def in model.variables().iter() {
            let VariableKind::Slack { set, row, sign } = &def.kind else {
                continue;
            };
            if !matches!(set, ConstraintSet::Generic | ConstraintSet::Fcas) {
                continue;
            }
            let slack = values[def.id.value()];
            if slack <= self.violation_tolerance {
                continue;
            }
            let row = model.constraints().get(*row);
            let delta = -(slack + self.relaxation_margin) * sign.coefficient();
            match shifts.iter_mut().find(|(name, _, _)| name == &row.name) {
                Some(entry) => entry.2 += delta,
                None => shifts.push((row.name.clone(), row.rhs, delta)),
            }
        }
        if shifts.is_empty() {
            return None;
        }
        let mut variant = ScenarioVariant::new(RELAXED_SCENARIO);
        for (name, rhs, delta) in shifts {
            variant = variant.with_override(name, rhs + delta);
        }
        Some(variant)
    }
}

/// One solved scenario, ranked by [`select_scenario`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioCandidate {
    pub name: String,
    pub objective: f64,
    pub total_violation: f64,
}

/// Index of the winning candidate: lowest objective, ties broken by
/// `tie_break`. Candidates must be in declaration order.
pub fn select_scenario(candidates: &[ScenarioCandidate], tie_break: ScenarioTieBreak) -> Option<usize> {
    let best = candidates.iter().map(|c| c.objective).fold(f64::INFINITY, f64::min);
    let tolerance = 1e-6 * best.abs().max(1.0);
    let tied = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.objective <= best + tolerance);
    match tie_break {
        ScenarioTieBreak::DeclarationOrder => tied.map(|(i, _)| i).next(),
        ScenarioTieBreak::LeastViolation => tied
            .min_by(|(i, a), (j, b)| a.total_violation.total_cmp(&b.total_violation).then(i.cmp(j)))
            .map(|(i, _)| i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mce_core::{FcasRequirement, GenericConstraint, MarketInputsBuilder, RegionId, Sense, Service};

    fn inputs() -> MarketInputs {
        MarketInputsBuilder::new()
            .region("NSW")
            .generic_constraint(GenericConstraint::new("GC1", Sense::GreaterEqual, 120.0).elastic(1e4))
            .fcas_requirement(FcasRequirement::new(
                "R6",
                Service::Raise6s,
                vec![RegionId::new("NSW")],
                20.0,
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_apply_overrides() {
        let variant = ScenarioVariant::new("s1").with_override("GC1", 40.0).with_override("R6", 5.0);
        let out = variant.apply(&inputs()).unwrap();
        assert_eq!(out.generic_constraints[0].rhs, 40.0);
        assert_eq!(out.fcas_requirements[0].volume_mw, 5.0);

        let bad = ScenarioVariant::new("s2").with_override("NOPE", 1.0);
        assert!(matches!(
            bad.apply(&inputs()),
            Err(DispatchError::Validation(ValidationError::UnknownConstraint { .. }))
        ));
    }

    #[test]
    fn test_trigger_needs_price_and_violation() {
        let config = OverConstrainedConfig::default();
        let low = vec![EnergyPrice {
            region: "NSW".into(),
            price: -9950.0,
        }];
        let normal = vec![EnergyPrice {
            region: "NSW".into(),
            price: 50.0,
        }];
        let violated = vec![RowViolation {
            set: ConstraintSet::Generic,
            name: "GC1".into(),
            violation: 70.0,
        }];
        let ramp_only = vec![RowViolation {
            set: ConstraintSet::RampUp,
            name: "A".into(),
            violation: 70.0,
        }];
        assert!(config.is_triggered(&low, &[], &violated));
        assert!(!config.is_triggered(&normal, &[], &violated));
        assert!(!config.is_triggered(&low, &[], &ramp_only));

        let fcas = vec![FcasPrice {
            region: "NSW".into(),
            service: Service::Raise6s,
            price: 20_000.0,
        }];
        assert!(config.is_triggered(&normal, &fcas, &violated));
    }

    #[test]
    fn test_clip_prices() {
        let config = OverConstrainedConfig::default();
        let mut energy = vec![EnergyPrice {
            region: "NSW".into(),
            price: 20_000.0,
        }];
        let mut fcas = vec![FcasPrice {
            region: "NSW".into(),
            service: Service::Raise6s,
            price: -3.0,
        }];
        assert!(config.clip_prices(&mut energy, &mut fcas));
        assert_eq!(energy[0].price, 15_500.0);
        assert_eq!(fcas[0].price, 0.0);
        assert!(!config.clip_prices(&mut energy, &mut fcas));
    }

    #[test]
    fn test_selection_and_tie_break() {
        let candidates = vec![
            ScenarioCandidate {
                name: BASE_SCENARIO.into(),
                objective: 700_000.0,
                total_violation: 70.0,
            },
            ScenarioCandidate {
                name: "declared".into(),
                objective: 2500.0,
                total_violation: 1.0,
            },
            ScenarioCandidate {
                name: RELAXED_SCENARIO.into(),
                objective: 2500.0,
                total_violation: 0.0,
            },
        ];
        assert_eq!(select_scenario(&candidates, ScenarioTieBreak::DeclarationOrder), Some(1));
        assert_eq!(select_scenario(&candidates, ScenarioTieBreak::LeastViolation), Some(2));
        assert_eq!(select_scenario(&[], ScenarioTieBreak::DeclarationOrder), None);
    }

    #[test]
    fn test_reserved_names_rejected() {
        let config = OverConstrainedConfig {
            scenarios: vec![ScenarioVariant::new(RELAXED_SCENARIO)],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DispatchError::Config(_))));
    }
}
