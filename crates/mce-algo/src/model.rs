//! Model assembly.
//!
//! [`ModelBuilder`] runs the registry, objective builder, constraint builders
//! and elasticity transformer in order and freezes the result into an
//! immutable [`DispatchModel`]. Every fast-start iteration and every
//! over-constrained scenario builds a fresh model; only the pricing LP is
//! derived from an existing one, by fixing its integers.

use std::collections::{BTreeSet, HashMap};

use mce_core::MarketInputs;
use tracing::debug;

use crate::constraints::interconnector::{self, LossSegmentSelection, PreparedLossModel};
use crate::constraints::{
    capacity, fast_start, fcas, generic, ramp, regional, tie_break, ConstraintSet, ConstraintStore, Row,
};
use crate::elastic::{self, RowViolation, ViolationCost};
use crate::error::DispatchError;
use crate::fast_start::{adjust_ramp_limits, FastStartStage};
use crate::objective::Objective;
use crate::registry::VariableRegistry;

/// Per-build choices that aren't part of the market data.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub interval_minutes: f64,
    pub loss_segments: LossSegmentSelection,
    /// Cost of the elastic tie-break rows; `None` disables tie-breaking.
    pub tie_break_cost: Option<f64>,
    pub fast_start: FastStartStage,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            interval_minutes: 5.0,
            loss_segments: LossSegmentSelection::Auto,
            tie_break_cost: Some(1e-3),
            fast_start: FastStartStage::Inactive,
        }
    }
}

/// A complete optimisation model for one interval.
#[derive(Debug, Clone)]
pub struct DispatchModel {
    registry: VariableRegistry,
    objective: Objective,
    constraints: ConstraintStore,
    loss_models: Vec<PreparedLossModel>,
}

impl DispatchModel {
    pub fn variables(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &ConstraintStore {
        &self.constraints
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.constraints.iter()
    }

    pub fn loss_models(&self) -> &[PreparedLossModel] {
        &self.loss_models
    }

    pub fn has_integers(&self) -> bool {
        self.registry.has_integers()
    }

    /// Sets with at least one row.
    pub fn constraint_sets(&self) -> BTreeSet<ConstraintSet> {
        self.constraints.sets()
    }

    pub fn constraint_names(&self) -> Vec<String> {
        self.constraints
            .iter()
            .map(|row| format!("{}:{}", row.set, row.name))
            .collect()
    }

    /// Every row carries slack variables.
    pub fn is_fully_elastic(&self) -> bool {
        self.constraints.iter().all(|row| row.elastic)
    }

    /// Sets that contain at least one hard row.
    pub fn hard_sets(&self) -> BTreeSet<ConstraintSet> {
        self.constraints
            .iter()
            .filter(|row| !row.elastic)
            .map(|row| row.set)
            .collect()
    }

    /// Copy with every integer variable fixed at its rounded value in `values`.
    pub fn fix_integers(&self, values: &[f64]) -> DispatchModel {
        let mut fixed = self.clone();
        let integers: Vec<_> = self.registry.iter().filter(|v| v.integer).map(|v| v.id).collect();
        for id in integers {
            fixed.registry.fix(id, values[id.value()].round());
        }
        fixed
    }

    /// Copy in which every hard row is elastic at unit cost and the
    /// original objective is dropped, so the optimum measures how far the
    /// hard rows are from being satisfiable.
    pub fn feasibility_relaxation(&self) -> Result<DispatchModel, DispatchError> {
        let mut relaxed = self.clone();
        // Existing slacks become free, so only hard rows carry cost.
        relaxed.objective = Objective::new();
        for set in self.hard_sets() {
            let names: HashMap<String, f64> = relaxed
                .constraints
                .in_set(set)
                .filter(|row| !row.elastic)
                .map(|row| (row.name.clone(), 1.0))
                .collect();
            elastic::make_elastic(
                &mut relaxed.constraints,
                &mut relaxed.registry,
                &mut relaxed.objective,
                set,
                &ViolationCost::PerConstraint(names),
            )?;
        }
        Ok(relaxed)
    }

    /// Elastic rows violated by more than `tolerance` at `values`.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<RowViolation> {
        elastic::row_violations(&self.constraints, &self.registry, values, tolerance)
    }
}

/// Builds a [`DispatchModel`] from market inputs.
pub struct ModelBuilder<'a> {
    inputs: &'a MarketInputs,
    options: BuildOptions,
    registry: VariableRegistry,
    objective: Objective,
    constraints: ConstraintStore,
    loss_models: Vec<PreparedLossModel>,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(inputs: &'a MarketInputs, options: BuildOptions) -> Self {
        Self {
            inputs,
            options,
            registry: VariableRegistry::new(),
            objective: Objective::new(),
            constraints: ConstraintStore::new(),
            loss_models: Vec::new(),
        }
    }

    /// Validate the inputs and assemble the full model.
    pub fn build(mut self) -> Result<DispatchModel, DispatchError> {
        self.inputs.validate()?;
        if !(self.options.interval_minutes.is_finite() && self.options.interval_minutes > 0.0) {
            return Err(DispatchError::Config(format!(
                "dispatch interval must be positive, got {} minutes",
                self.options.interval_minutes
            )));
        }

        self.register_variables()?;
        self.add_rows();
        self.apply_violation_costs()?;

        debug!(
            variables = self.registry.len(),
            rows = self.constraints.len(),
            integers = self.registry.has_integers(),
            "built dispatch model"
        );
        Ok(DispatchModel {
            registry: self.registry,
            objective: self.objective,
            constraints: self.constraints,
            loss_models: self.loss_models,
        })
    }

    fn register_variables(&mut self) -> Result<(), DispatchError> {
        let inputs = self.inputs;
        self.registry.register_bid_tranches(inputs)?;
        self.loss_models = interconnector::prepare_loss_models(inputs, self.options.loss_segments);
        self.registry.register_interconnectors(inputs, &self.loss_models);
        self.objective.add_bid_costs(&self.registry, inputs);
        Ok(())
    }

    fn add_rows(&mut self) {
        let inputs = self.inputs;
        let interval = self.options.interval_minutes;
        let stage = &self.options.fast_start;
        let registry = &self.registry;

        let bid_ramps = adjust_ramp_limits(
            ramp::bid_ramp_limits(inputs, interval),
            stage,
            &inputs.fast_start_profiles,
            interval,
        );
        let scada_ramps =
            adjust_ramp_limits(ramp::scada_ramp_limits(inputs), stage, &inputs.fast_start_profiles, interval);

        let batches = [
            capacity::unit_bid_capacity(&inputs.unit_limits, registry),
            capacity::uigf_capacity(&inputs.uigf_limits, registry),
            ramp::ramp_up(&bid_ramps, registry, interval),
            ramp::ramp_down(&bid_ramps, registry, interval),
            fcas::fcas_max_availability(&inputs.fcas_trapeziums, registry),
            fcas::joint_capacity(inputs, registry),
            fcas::energy_and_regulation_capacity(&inputs.fcas_trapeziums, registry),
            fcas::joint_ramping_raise_reg(&scada_ramps, registry, interval),
            fcas::joint_ramping_lower_reg(&scada_ramps, registry, interval),
            interconnector::interconnector_losses(&self.loss_models, registry),
            interconnector::interconnector_links(inputs, registry),
            generic::generic_constraints(inputs, registry),
            regional::regional_demand(inputs, registry, &self.loss_models),
            regional::fcas_requirements(inputs, registry),
            match self.options.tie_break_cost {
                Some(_) => tie_break::tie_break(inputs, registry),
                None => Vec::new(),
            },
            fast_start::fast_start_profiles(stage.targets(), registry),
        ];
        for batch in batches {
            self.constraints.extend(batch);
        }
    }

    fn apply_violation_costs(&mut self) -> Result<(), DispatchError> {
        let costs = &self.inputs.violation_costs;
        let mut plan: Vec<(ConstraintSet, ViolationCost)> = Vec::new();
        let mut uniform = |set: ConstraintSet, cost: Option<f64>| {
            if let Some(c) = cost {
                plan.push((set, ViolationCost::Uniform(c)));
            }
        };
        uniform(ConstraintSet::UnitBidCapacity, costs.unit_capacity);
        uniform(ConstraintSet::UigfCapacity, costs.uigf);
        uniform(ConstraintSet::RampUp, costs.ramp_up);
        uniform(ConstraintSet::RampDown, costs.ramp_down);
        uniform(ConstraintSet::FastStart, costs.fast_start);
        uniform(ConstraintSet::FcasMaxAvailability, costs.fcas_max_availability);
        uniform(ConstraintSet::JointCapacity, costs.joint_capacity);
        uniform(ConstraintSet::EnergyAndRegulationCapacity, costs.energy_and_regulation_capacity);
        uniform(ConstraintSet::JointRampingRaiseReg, costs.joint_ramping);
        uniform(ConstraintSet::JointRampingLowerReg, costs.joint_ramping);
        uniform(ConstraintSet::Demand, costs.regional_demand);
        uniform(ConstraintSet::TieBreak, self.options.tie_break_cost);

        let generic: HashMap<String, f64> = self
            .inputs
            .generic_constraints
            .iter()
            .filter_map(|c| c.violation_cost.map(|cost| (c.name.clone(), cost)))
            .collect();
        if !generic.is_empty() {
            plan.push((ConstraintSet::Generic, ViolationCost::PerConstraint(generic)));
        }

        let fcas: HashMap<String, f64> = self
            .inputs
            .fcas_requirements
            .iter()
            .filter_map(|r| {
                r.violation_cost
                    .or(costs.fcas_requirement)
                    .map(|cost| (r.name.clone(), cost))
            })
            .collect();
        if !fcas.is_empty() {
            plan.push((ConstraintSet::Fcas, ViolationCost::PerConstraint(fcas)));
        }

        let present = self.constraints.sets();
        for (set, cost) in plan {
            if !present.contains(&set) {
                continue;
            }
            let n = elastic::make_elastic(
                &mut self.constraints,
                &mut self.registry,
                &mut self.objective,
                set,
                &cost,
            )?;
            debug!(set = %set, rows = n, "made rows elastic");
        }
        Ok(())
    }
}
