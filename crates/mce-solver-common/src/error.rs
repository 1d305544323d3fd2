//! Error types for solver communication.

use thiserror::Error;

use crate::SolverId;

/// Errors raised by a solver backend.
///
/// None of these are retried by the clearing engine; the caller decides
/// whether to try again with different settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// Unknown solver ID.
    #[error("Unknown solver: {0}")]
    UnknownSolver(String),

    /// Solver was not compiled into this build.
    #[error("Solver {solver} is not available in this build. Enable the `{feature}` feature")]
    NotAvailable {
        solver: SolverId,
        feature: &'static str,
    },

    /// Model uses features the backend can't handle.
    #[error("Solver {solver} cannot solve this model: {reason}")]
    Unsupported { solver: SolverId, reason: String },

    /// Timeout while waiting for solver.
    #[error("Solver {solver} timed out after {seconds} seconds")]
    Timeout { solver: SolverId, seconds: f64 },

    /// Backend failed without returning a usable status.
    #[error("Solver {solver} failed: {message}")]
    Failed { solver: SolverId, message: String },

    /// Duals were requested but the backend returned none.
    #[error("Solver {solver} returned no dual values")]
    MissingDuals { solver: SolverId },
}

/// Result type alias for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SolverError::Timeout {
            solver: SolverId::Highs,
            seconds: 30.0,
        };
        assert_eq!(err.to_string(), "Solver HiGHS timed out after 30 seconds");

        let err = SolverError::NotAvailable {
            solver: SolverId::Clarabel,
            feature: "solver-clarabel",
        };
        assert!(err.to_string().contains("solver-clarabel"));
    }
}
