//! Clarabel backend via good_lp.
//!
//! Interior-point, continuous only: usable when every loss curve is convex
//! and no integer selectors are needed, or for the fixed-integer pricing LP.

use good_lp::solvers::clarabel::clarabel;
use good_lp::solvers::{DualValues, SolutionWithDual};
use good_lp::{Solution, SolverModel};
use mce_solver_common::{SolutionStatus, SolverError, SolverId, SolverResult};
use tracing::debug;
use web_time::Instant;

use super::{check_termination, classify_failure, lower_variables, objective_expression, row_constraint};
use super::{MipBackend, SolveOptions, SolverOutput};
use crate::model::DispatchModel;

#[derive(Debug, Default, Clone, Copy)]
pub struct ClarabelBackend;

impl MipBackend for ClarabelBackend {
    fn id(&self) -> SolverId {
        SolverId::Clarabel
    }

    fn solve(&self, model: &DispatchModel, options: &SolveOptions, compute_duals: bool) -> SolverResult<SolverOutput> {
        if model.has_integers() {
            return Err(SolverError::Unsupported {
                solver: SolverId::Clarabel,
                reason: "model has integer loss-segment selectors; use HiGHS or convex loss curves".into(),
            });
        }
        if options.mip_gap.is_some() {
            debug!("Clarabel solves continuous models only; ignoring MIP gap");
        }

        let start = Instant::now();
        let (vars, handles) = lower_variables(model);
        let objective = objective_expression(model, &handles);
        let mut problem = vars.minimise(objective).using(clarabel);
        if let Some(limit) = options.time_limit_seconds {
            problem.settings().time_limit(limit);
        }
        problem.settings().verbose(options.verbose);
        let refs: Vec<_> = model
            .rows()
            .map(|row| problem.add_constraint(row_constraint(row, &handles)))
            .collect();

        let mut solution = match problem.solve() {
            Ok(solution) => solution,
            Err(err) => {
                let status = classify_failure(SolverId::Clarabel, err, options, start.elapsed())?;
                return Ok(SolverOutput::unsolved(status, start.elapsed()));
            }
        };

        check_termination(SolverId::Clarabel, solution.status(), options)?;

        let values: Vec<f64> = handles.iter().map(|&v| solution.value(v)).collect();
        let duals = if compute_duals {
            let dual_values = solution.compute_dual();
            Some(refs.into_iter().map(|r| dual_values.dual(r)).collect())
        } else {
            None
        };

        Ok(SolverOutput {
            status: SolutionStatus::Optimal,
            objective: model.objective().evaluate(&values),
            values,
            duals,
            solve_time: start.elapsed(),
        })
    }
}
