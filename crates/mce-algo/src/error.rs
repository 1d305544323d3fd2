//! Errors raised while building, solving or pricing a dispatch model.

use mce_core::ValidationError;
use mce_solver_common::SolverError;
use thiserror::Error;

use crate::constraints::ConstraintSet;

/// Dispatch failure.
///
/// Nothing is retried internally: every variant is surfaced to the caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Input tables violate an invariant. Raised before any solve.
    #[error("Invalid inputs: {0}")]
    Validation(#[from] ValidationError),

    /// No dispatch satisfies the hard constraints.
    #[error("Model infeasible; implicated constraint sets: {}", join_sets(.sets))]
    ModelInfeasible { sets: Vec<ConstraintSet> },

    /// The solver failed or is unavailable.
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// A model that cannot be infeasible was reported infeasible, or the
    /// orchestrator was driven through an illegal transition.
    #[error("Internal formulation error: {0}")]
    InternalFormulation(String),

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn join_sets(sets: &[ConstraintSet]) -> String {
    if sets.is_empty() {
        return "<none identified>".to_string();
    }
    sets.iter()
        .map(ConstraintSet::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
