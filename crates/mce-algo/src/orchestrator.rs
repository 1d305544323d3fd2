//! Two-phase dispatch.
//!
//! Each interval is cleared in two solves. The MIP picks the dispatch,
//! including any loss-segment selectors; the same model with its integers
//! fixed is then solved as an LP, whose row duals are the market prices.
//!
//! Around that core run two feedback loops:
//!
//! * **fast start**: units dispatched from mode 0 are committed, their
//!   profiles advanced and the model rebuilt until the commitment set stops
//!   growing;
//! * **over-constrained dispatch**: when enabled, declared RHS-override
//!   scenarios and a derived `relaxed` scenario are cleared alongside the
//!   base case and the cheapest one is reported.
//!
//! Progress is tracked by [`DispatchState`]; every transition is checked and
//! recorded in the outcome.

use std::collections::{BTreeSet, HashMap};

use mce_core::{MarketInputs, Service, UnitId};
use mce_solver_common::{SolutionStatus, SolverError};
use serde::Serialize;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::config::DispatchConfig;
use crate::constraints::ConstraintSet;
use crate::elastic::RowViolation;
use crate::error::DispatchError;
use crate::fast_start::{commitment_set, targets_for, FastStartStage};
use crate::model::{DispatchModel, ModelBuilder};
use crate::over_constrained::{
    select_scenario, ClipPolicy, ScenarioCandidate, ScenarioVariant, BASE_SCENARIO,
};
use crate::results::{self, DispatchOutcome, EnergyPrice, FcasPrice};
use crate::solver::{backend_for, MipBackend, SolverOutput};

/// Slack below which an elastic row counts as satisfied in the outcome.
const REPORT_TOLERANCE: f64 = 1e-6;

/// Stage of one interval's clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Unbuilt,
    Built,
    MipSolved,
    FastStartIterating,
    PriceFixed,
    PriceSolved,
}

impl DispatchState {
    pub fn can_transition_to(self, next: DispatchState) -> bool {
        use DispatchState::*;
        matches!(
            (self, next),
            (Unbuilt, Built)
                | (Built, MipSolved)
                | (MipSolved, FastStartIterating)
                | (FastStartIterating, Built)
                | (MipSolved, PriceFixed)
                | (PriceFixed, PriceSolved)
                | (PriceSolved, Built)
        )
    }
}

/// Checked state with its history.
#[derive(Debug, Clone)]
struct StateMachine {
    state: DispatchState,
    history: Vec<DispatchState>,
}

impl StateMachine {
    fn new() -> Self {
        Self {
            state: DispatchState::Unbuilt,
            history: vec![DispatchState::Unbuilt],
        }
    }

    fn advance(&mut self, next: DispatchState) -> Result<(), DispatchError> {
        if !self.state.can_transition_to(next) {
            return Err(DispatchError::InternalFormulation(format!(
                "illegal dispatch transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!(from = ?self.state, to = ?next, "dispatch transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

/// One fully priced scenario.
struct ScenarioRun {
    name: String,
    inputs: MarketInputs,
    model: DispatchModel,
    mip: SolverOutput,
    energy_prices: Vec<EnergyPrice>,
    fcas_prices: Vec<FcasPrice>,
    violations: Vec<RowViolation>,
    fast_start_iterations: usize,
}

impl ScenarioRun {
    fn candidate(&self) -> ScenarioCandidate {
        ScenarioCandidate {
            name: self.name.clone(),
            objective: self.mip.objective,
            total_violation: self.violations.iter().map(|v| v.violation).sum(),
        }
    }
}

/// Clears intervals with a fixed configuration and solver backend.
pub struct Dispatcher {
    config: DispatchConfig,
    backend: Box<dyn MipBackend>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("backend", &self.backend.id())
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher with the default configuration.
    pub fn new() -> Result<Self, DispatchError> {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;
        let backend = backend_for(config.solver)?;
        Ok(Self { config, backend })
    }

    /// Replace the backend chosen from the configuration.
    pub fn with_backend(mut self, backend: Box<dyn MipBackend>) -> Self {
        self.config.solver = backend.id();
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Clear one interval.
    pub fn dispatch(&self, inputs: &MarketInputs) -> Result<DispatchOutcome, DispatchError> {
        let start = Instant::now();
        inputs.validate()?;
        let mut machine = StateMachine::new();

        let base = self.run_scenario(BASE_SCENARIO, inputs.clone(), &mut machine)?;
        let ocd = &self.config.over_constrained;
        if !ocd.enabled {
            let outcome = self.outcome(base, false, machine.history);
            info!(
                objective = outcome.objective_value,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "dispatch complete"
            );
            return Ok(outcome);
        }

        let triggered = ocd.is_triggered(&base.energy_prices, &base.fcas_prices, &base.violations);
        let relaxed = if triggered {
            ocd.relaxed_variant(&base.model, &base.mip.values)
        } else {
            None
        };
        if triggered {
            info!(violations = base.violations.len(), "over-constrained dispatch triggered");
        }

        let variants: Vec<&ScenarioVariant> = ocd.scenarios.iter().chain(relaxed.as_ref()).collect();
        let rerun = !variants.is_empty();
        let mut runs = vec![base];
        for variant in variants {
            let scenario_inputs = variant.apply(inputs)?;
            runs.push(self.run_scenario(&variant.name, scenario_inputs, &mut machine)?);
        }

        let candidates: Vec<ScenarioCandidate> = runs.iter().map(ScenarioRun::candidate).collect();
        let index = select_scenario(&candidates, ocd.tie_break).ok_or_else(|| {
            DispatchError::InternalFormulation("no over-constrained dispatch scenario to select".into())
        })?;
        let mut selected = runs.swap_remove(index);
        info!(scenario = %selected.name, objective = selected.mip.objective, "selected dispatch scenario");

        let clip = match ocd.clip_policy {
            ClipPolicy::SelectedScenario => rerun,
            ClipPolicy::AllOutcomes => true,
        };
        let clipped = clip && ocd.clip_prices(&mut selected.energy_prices, &mut selected.fcas_prices);
        let outcome = self.outcome(selected, clipped, machine.history);
        info!(
            objective = outcome.objective_value,
            scenario = %outcome.selected_scenario,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "dispatch complete"
        );
        Ok(outcome)
    }

    /// MIP with the fast-start loop, then the pricing LP.
    fn run_scenario(
        &self,
        name: &str,
        inputs: MarketInputs,
        machine: &mut StateMachine,
    ) -> Result<ScenarioRun, DispatchError> {
        let profiles = &inputs.fast_start_profiles;
        let interval = self.config.dispatch_interval_minutes;

        let (mut model, mut mip) = self.build_and_solve(&inputs, FastStartStage::initial(profiles), machine)?;

        let mut iterations = 0;
        if !profiles.is_empty() {
            let mut committed = BTreeSet::new();
            loop {
                let next = commitment_set(profiles, &energy_dispatch(&model, &mip.values), &committed);
                if iterations > 0 && next == committed {
                    break;
                }
                if iterations == self.config.fast_start.max_iterations {
                    warn!(
                        iterations,
                        scenario = name,
                        "fast-start commitment did not settle; keeping last dispatch"
                    );
                    break;
                }
                committed = next;
                iterations += 1;
                machine.advance(DispatchState::FastStartIterating)?;
                debug!(iteration = iterations, committed = committed.len(), "fast-start iteration");
                let stage = FastStartStage::Constrained(targets_for(profiles, &committed, interval));
                (model, mip) = self.build_and_solve(&inputs, stage, machine)?;
            }
        }

        let duals = self.price(&model, &mip, machine)?;
        let energy_prices = results::energy_prices(&model, &duals);
        let fcas_prices = results::fcas_prices(&model, &inputs, &duals);
        let violations = model
            .violations(&mip.values, REPORT_TOLERANCE)
            .into_iter()
            .filter(|v| v.set != ConstraintSet::TieBreak)
            .collect();
        Ok(ScenarioRun {
            name: name.to_string(),
            inputs,
            model,
            mip,
            energy_prices,
            fcas_prices,
            violations,
            fast_start_iterations: iterations,
        })
    }

    fn build_and_solve(
        &self,
        inputs: &MarketInputs,
        stage: FastStartStage,
        machine: &mut StateMachine,
    ) -> Result<(DispatchModel, SolverOutput), DispatchError> {
        let model = ModelBuilder::new(inputs, self.config.build_options(stage)).build()?;
        machine.advance(DispatchState::Built)?;
        let mip = self.solve_dispatch(&model)?;
        machine.advance(DispatchState::MipSolved)?;
        debug!(
            objective = mip.objective,
            solve_ms = mip.solve_time.as_millis() as u64,
            "dispatch MIP solved"
        );
        Ok((model, mip))
    }

    fn solve_dispatch(&self, model: &DispatchModel) -> Result<SolverOutput, DispatchError> {
        let output = self.backend.solve(model, &self.config.solver_options, false)?;
        match output.status {
            SolutionStatus::Optimal => Ok(output),
            SolutionStatus::Infeasible => Err(self.diagnose_infeasible(model)),
            status => Err(DispatchError::InternalFormulation(format!(
                "dispatch model is {status}"
            ))),
        }
    }

    /// Classify an infeasible dispatch model by re-solving it with every
    /// hard row elastic at unit cost.
    fn diagnose_infeasible(&self, model: &DispatchModel) -> DispatchError {
        if model.is_fully_elastic() {
            return DispatchError::InternalFormulation("fully elastic dispatch model reported infeasible".into());
        }
        let hard: Vec<ConstraintSet> = model.hard_sets().into_iter().collect();
        let relaxed = match model.feasibility_relaxation() {
            Ok(relaxed) => relaxed,
            Err(err) => return err,
        };
        let output = match self.backend.solve(&relaxed, &self.config.solver_options, false) {
            Ok(output) => output,
            Err(err) => return err.into(),
        };
        if !output.status.is_success() {
            warn!(status = %output.status, "feasibility relaxation did not solve");
            return DispatchError::ModelInfeasible { sets: hard };
        }

        let implicated: BTreeSet<ConstraintSet> = relaxed
            .violations(&output.values, REPORT_TOLERANCE)
            .into_iter()
            .filter(|v| {
                model
                    .constraints()
                    .find(v.set, &v.name)
                    .is_some_and(|row| !row.elastic)
            })
            .map(|v| v.set)
            .collect();
        let sets = if implicated.is_empty() {
            hard
        } else {
            implicated.into_iter().collect()
        };
        warn!(sets = ?sets, "dispatch model infeasible");
        DispatchError::ModelInfeasible { sets }
    }

    /// Fix integers at the MIP solution and read row duals from the LP.
    fn price(
        &self,
        model: &DispatchModel,
        mip: &SolverOutput,
        machine: &mut StateMachine,
    ) -> Result<Vec<f64>, DispatchError> {
        let fixed = model.fix_integers(&mip.values);
        machine.advance(DispatchState::PriceFixed)?;
        let output = self.backend.solve(&fixed, &self.config.solver_options, true)?;
        if !output.status.is_success() {
            return Err(DispatchError::InternalFormulation(format!(
                "pricing LP with fixed integers is {}",
                output.status
            )));
        }
        machine.advance(DispatchState::PriceSolved)?;
        let duals = output.duals.ok_or(SolverError::MissingDuals {
            solver: self.backend.id(),
        })?;
        debug!(rows = duals.len(), "pricing LP solved");
        Ok(duals)
    }

    fn outcome(&self, run: ScenarioRun, prices_clipped: bool, state_history: Vec<DispatchState>) -> DispatchOutcome {
        let values = &run.mip.values;
        DispatchOutcome {
            interval_start: run.inputs.interval_start,
            solver: self.backend.id(),
            objective_value: run.mip.objective,
            unit_dispatch: results::unit_dispatch(&run.model, &run.inputs, values),
            interconnector_flows: results::interconnector_flows(&run.model, &run.inputs, values),
            fcas_availability: results::fcas_availability(&run.model, values),
            region_summary: results::region_summary(&run.model, &run.inputs, values),
            active_constraint_sets: run.model.constraint_sets().into_iter().collect(),
            constraint_names: run.model.constraint_names(),
            energy_prices: run.energy_prices,
            fcas_prices: run.fcas_prices,
            violations: run.violations,
            selected_scenario: run.name,
            fast_start_iterations: run.fast_start_iterations,
            prices_clipped,
            state_history,
        }
    }
}

/// Clear one interval with `config`.
pub fn dispatch(inputs: &MarketInputs, config: &DispatchConfig) -> Result<DispatchOutcome, DispatchError> {
    Dispatcher::with_config(config.clone())?.dispatch(inputs)
}

/// Energy dispatch per unit at `values`, net for bidirectional units.
fn energy_dispatch(model: &DispatchModel, values: &[f64]) -> HashMap<UnitId, f64> {
    let registry = model.variables();
    registry
        .bid_keys()
        .filter(|(_, service)| *service == Service::Energy)
        .map(|(unit, _)| (unit.clone(), registry.unit_value(unit, Service::Energy, values)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_path() {
        let mut machine = StateMachine::new();
        for next in [
            DispatchState::Built,
            DispatchState::MipSolved,
            DispatchState::FastStartIterating,
            DispatchState::Built,
            DispatchState::MipSolved,
            DispatchState::PriceFixed,
            DispatchState::PriceSolved,
            DispatchState::Built,
        ] {
            machine.advance(next).unwrap();
        }
        assert_eq!(machine.history.len(), 9);
        assert_eq!(machine.history[0], DispatchState::Unbuilt);
    }

    #[test]
    fn test_illegal_transition() {
        let mut machine = StateMachine::new();
        let err = machine.advance(DispatchState::PriceFixed).unwrap_err();
        assert!(matches!(err, DispatchError::InternalFormulation(_)));
        assert_eq!(machine.state, DispatchState::Unbuilt);

        machine.advance(DispatchState::Built).unwrap();
        assert!(machine.advance(DispatchState::PriceSolved).is_err());
    }

    #[test]
    fn test_state_serialises_snake_case() {
        let json = serde_json::to_string(&DispatchState::FastStartIterating).unwrap();
        assert_eq!(json, "\"fast_start_iterating\"");
    }
}
