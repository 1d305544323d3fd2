//! HiGHS backend via good_lp. Handles both the MIP and the pricing LP.

use good_lp::solvers::highs::highs;
use good_lp::solvers::{DualValues, SolutionWithDual};
use good_lp::{Solution, SolverModel};
use mce_solver_common::{SolutionStatus, SolverError, SolverId, SolverResult};
use tracing::trace;
use web_time::Instant;

use super::{check_termination, classify_failure, lower_variables, objective_expression, row_constraint};
use super::{MipBackend, SolveOptions, SolverOutput};
use crate::model::DispatchModel;

#[derive(Debug, Default, Clone, Copy)]
pub struct HighsBackend;

impl MipBackend for HighsBackend {
    fn id(&self) -> SolverId {
        SolverId::Highs
    }

    fn solve(&self, model: &DispatchModel, options: &SolveOptions, compute_duals: bool) -> SolverResult<SolverOutput> {
        let start = Instant::now();
        let (vars, handles) = lower_variables(model);
        let objective = objective_expression(model, &handles);

        let mut problem = vars.minimise(objective).using(highs).set_verbose(options.verbose);
        if let Some(limit) = options.time_limit_seconds {
            problem = problem.set_option("time_limit", limit);
        }
        if let Some(gap) = options.mip_gap {
            if !(gap.is_finite() && gap >= 0.0) {
                return Err(SolverError::Failed {
                    solver: SolverId::Highs,
                    message: format!("invalid MIP gap {gap}"),
                });
            }
            problem = problem.set_option("mip_rel_gap", gap);
        }

        let refs: Vec<_> = model
            .rows()
            .map(|row| problem.add_constraint(row_constraint(row, &handles)))
            .collect();
        trace!(rows = refs.len(), vars = handles.len(), "submitting model to HiGHS");

        let mut solution = match problem.solve() {
            Ok(solution) => solution,
            Err(err) => {
                let status = classify_failure(SolverId::Highs, err, options, start.elapsed())?;
                return Ok(SolverOutput::unsolved(status, start.elapsed()));
            }
        };

        check_termination(SolverId::Highs, solution.status(), options)?;

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
