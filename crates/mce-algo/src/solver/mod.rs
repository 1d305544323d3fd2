//! Solver adapter.
//!
//! Presents a [`DispatchModel`] to an external LP/MIP solver through
//! `good_lp` and reads back primal values, the objective and (on request)
//! row duals. Backends are selected by [`SolverId`]; each solve creates and
//! owns its own solver problem, so backends are stateless and `Sync`.
//!
//! Row duals follow the `∂objective/∂rhs` convention: the dual of a regional
//! balance row is the cost of serving one more MW of demand there.

use std::time::Duration;

use good_lp::{constraint, variable, Constraint, Expression, ProblemVariables, Variable};
use mce_solver_common::{SolutionStatus, SolverError, SolverId, SolverResult};
use serde::{Deserialize, Serialize};

use crate::constraints::Row;
use crate::model::DispatchModel;

#[cfg(feature = "solver-clarabel")]
pub mod clarabel;
#[cfg(feature = "solver-highs")]
pub mod highs;

#[cfg(feature = "solver-clarabel")]
pub use clarabel::ClarabelBackend;
#[cfg(feature = "solver-highs")]
pub use highs::HighsBackend;

/// Options passed through to the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Wall-clock limit per solve.
    pub time_limit_seconds: Option<f64>,
    /// Relative MIP gap.
    pub mip_gap: Option<f64>,
    /// Let the backend print its log.
    pub verbose: bool,
}

/// What a backend returns.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub status: SolutionStatus,
    /// Objective at `values`; 0 unless optimal.
    pub objective: f64,
    /// Primal value per variable, indexed by `VarId`; empty unless optimal.
    pub values: Vec<f64>,
    /// Dual per row, indexed by `RowId`, when requested.
    pub duals: Option<Vec<f64>>,
    pub solve_time: Duration,
}

impl SolverOutput {
    pub fn unsolved(status: SolutionStatus, solve_time: Duration) -> Self {
        Self {
            status,
            objective: 0.0,
            values: Vec::new(),
            duals: None,
            solve_time,
        }
    }
}

/// An LP/MIP solver the dispatch engine can drive.
pub trait MipBackend: Send + Sync {
    fn id(&self) -> SolverId;

    /// Solve `model`. Infeasible and unbounded models are reported through
    /// [`SolverOutput::status`]; errors are reserved for solver failures.
    fn solve(&self, model: &DispatchModel, options: &SolveOptions, compute_duals: bool) -> SolverResult<SolverOutput>;
}

/// Backend for `id`, if it was compiled in.
pub fn backend_for(id: SolverId) -> SolverResult<Box<dyn MipBackend>> {
    match id {
        #[cfg(feature = "solver-highs")]
        SolverId::Highs => Ok(Box::new(HighsBackend)),
        #[cfg(not(feature = "solver-highs"))]
        SolverId::Highs => Err(SolverError::NotAvailable {
            solver: id,
            feature: "solver-highs",
        }),
        #[cfg(feature = "solver-clarabel")]
        SolverId::Clarabel => Ok(Box::new(ClarabelBackend)),
        #[cfg(not(feature = "solver-clarabel"))]
        SolverId::Clarabel => Err(SolverError::NotAvailable {
            solver: id,
            feature: "solver-clarabel",
        }),
    }
}

/// Solvers compiled into this build.
pub fn available_solvers() -> Vec<SolverId> {
    SolverId::all()
        .iter()
        .copied()
        .filter(|&id| backend_for(id).is_ok())
        .collect()
}

/// Message good_lp attaches to interior-point solves stopped by their time limit.
const TIME_LIMIT_REACHED: &str = "Time limit reached";

/// Declare every model variable with its finite bounds.
pub(crate) fn lower_variables(model: &DispatchModel) -> (ProblemVariables, Vec<Variable>) {
    let mut vars = ProblemVariables::new();
    let handles = model
        .variables()
        .iter()
        .map(|def| {
            let mut v = variable();
            if def.lower.is_finite() {
                v = v.min(def.lower);
            }
            if def.upper.is_finite() {
                v = v.max(def.upper);
            }
            if def.integer {
                v = v.integer();
            }
            vars.add(v)
        })
        .collect();
    (vars, handles)
}

pub(crate) fn objective_expression(model: &DispatchModel, vars: &[Variable]) -> Expression {
    model
        .objective()
        .iter()
        .map(|(id, cost)| cost * vars[id.value()])
        .sum()
}

pub(crate) fn row_constraint(row: &Row, vars: &[Variable]) -> Constraint {
    let lhs: Expression = row.terms.iter().map(|&(id, coef)| coef * vars[id.value()]).sum();
    let rhs = row.rhs;
    match row.sense {
        mce_core::Sense::LessEqual => constraint!(lhs <= rhs),
        mce_core::Sense::GreaterEqual => constraint!(lhs >= rhs),
        mce_core::Sense::Equal => constraint!(lhs == rhs),
    }
}

/// Reject solutions that stopped short of optimality.
///
/// A gap-limited MIP is accepted only when a MIP gap was asked for; a
/// time-limited one is always a [`SolverError::Timeout`].
pub(crate) fn check_termination(
    solver: SolverId,
    status: good_lp::solvers::SolutionStatus,
    options: &SolveOptions,
) -> SolverResult<()> {
    match status {
        good_lp::solvers::SolutionStatus::Optimal => Ok(()),
        good_lp::solvers::SolutionStatus::GapLimit if options.mip_gap.is_some() => Ok(()),
        good_lp::solvers::SolutionStatus::GapLimit => Err(SolverError::Failed {
            solver,
            message: "stopped on a MIP gap limit that was not requested".into(),
        }),
        good_lp::solvers::SolutionStatus::TimeLimit => Err(SolverError::Timeout {
            solver,
            seconds: options.time_limit_seconds.unwrap_or_default(),
        }),
    }
}

/// Map a `good_lp` failure onto a status or a [`SolverError`].
pub(crate) fn classify_failure(
    solver: SolverId,
    err: good_lp::ResolutionError,
    options: &SolveOptions,
    elapsed: Duration,
) -> SolverResult<SolutionStatus> {
    match err {
        good_lp::ResolutionError::Infeasible => Ok(SolutionStatus::Infeasible),
        good_lp::ResolutionError::Unbounded => Ok(SolutionStatus::Unbounded),
        good_lp::ResolutionError::Other(TIME_LIMIT_REACHED) => Err(SolverError::Timeout {
            solver,
            seconds: options.time_limit_seconds.unwrap_or_default(),
        }),
        other => match options.time_limit_seconds {
            Some(limit) if elapsed.as_secs_f64() >= limit => Err(SolverError::Timeout {
                solver,
                seconds: limit,
            }),
            _ => Err(SolverError::Failed {
                solver,
                message: other.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_available() {
        #[cfg(feature = "solver-highs")]
        assert!(available_solvers().contains(&SolverId::Highs));
        #[cfg(not(feature = "solver-clarabel"))]
        assert!(matches!(
            backend_for(SolverId::Clarabel),
            Err(SolverError::NotAvailable { .. })
        ));
    }

    #[test]
    fn test_time_limited_solution_is_a_timeout() {
        use good_lp::solvers::SolutionStatus as LpStatus;

        let limited = SolveOptions {
            time_limit_seconds: Some(0.5),
            ..Default::default()
        };
        assert!(check_termination(SolverId::Highs, LpStatus::Optimal, &limited).is_ok());
        assert_eq!(
            check_termination(SolverId::Highs, LpStatus::TimeLimit, &limited),
            Err(SolverError::Timeout {
                solver: SolverId::Highs,
                seconds: 0.5,
            })
        );
        assert!(matches!(
            check_termination(SolverId::Highs, LpStatus::GapLimit, &limited),
            Err(SolverError::Failed { .. })
        ));

        let gapped = SolveOptions {
            mip_gap: Some(0.01),
            ..Default::default()
        };
        assert!(check_termination(SolverId::Highs, LpStatus::GapLimit, &gapped).is_ok());
    }

    #[test]
    fn test_interior_point_time_limit_is_a_timeout() {
        let options = SolveOptions {
            time_limit_seconds: Some(2.0),
            ..Default::default()
        };
        let err = classify_failure(
            SolverId::Clarabel,
            good_lp::ResolutionError::Other("Time limit reached"),
            &options,
            Duration::from_millis(1),
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::Timeout { seconds, .. } if seconds == 2.0));

        let status = classify_failure(
            SolverId::Clarabel,
            good_lp::ResolutionError::Infeasible,
            &options,
            Duration::ZERO,
        )
        .unwrap();
        assert_eq!(status, SolutionStatus::Infeasible);
    }

    #[test]
    fn test_solve_options_from_toml() {
        let options: SolveOptions = toml::from_str("time_limit_seconds = 2.5\nverbose = true").unwrap();
        assert_eq!(options.time_limit_seconds, Some(2.5));
        assert_eq!(options.mip_gap, None);
        assert!(options.verbose);
    }
}
