//! Common solver types for the market clearing engine.
//!
//! The clearing engine hands a mixed-integer linear program to an external
//! solver and reads back primal values, the objective and (for the pricing LP)
//! dual values. This crate names the solvers that can be selected, the status
//! they report and the errors they raise, so the model-building crate and any
//! caller agree on them without depending on a particular backend.
//!
//! # Supported Solvers
//!
//! | Solver | Problem Type | Duals | Reference |
//! |--------|--------------|-------|-----------|
//! | HiGHS  | LP/MIP | yes | Huangfu & Hall (2018) |
//! | Clarabel | LP (no integers) | yes | Goulart et al. (2024) |

pub mod error;
pub mod logging;
pub mod solution;

pub use error::{SolverError, SolverResult};
pub use logging::init_tracing;
pub use solution::SolutionStatus;

/// Solvers the clearing engine can be configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverId {
    /// HiGHS, driven through `good_lp`.
    ///
    /// Branch-and-cut for the dispatch MIP, dual revised simplex for the
    /// pricing LP; row duals come from the final simplex basis.
    /// See Huangfu & Hall (2018), *Math. Prog. Comp.* 10(1), 119-142,
    /// doi:[10.1007/s12532-017-0130-5](https://doi.org/10.1007/s12532-017-0130-5).
    Highs,

    /// Clarabel, a pure-Rust interior-point solver.
    ///
    /// Continuous models only: markets whose loss curves are convex clear
    /// without segment selectors and can use it end to end.
    /// See Goulart, Chen & Schwan (2024), "Clarabel: An interior-point solver
    /// for conic programs with quadratic objectives".
    Clarabel,
}

impl SolverId {
    pub fn display_name(&self) -> &'static str {
        match self {
            SolverId::Highs => "HiGHS",
            SolverId::Clarabel => "Clarabel",
        }
    }

    /// Whether the solver accepts integer variables.
    pub fn supports_integers(&self) -> bool {
        matches!(self, SolverId::Highs)
    }

    pub fn all() -> &'static [SolverId] {
        &[SolverId::Highs, SolverId::Clarabel]
    }
}

impl Default for SolverId {
    fn default() -> Self {
        SolverId::Highs
    }
}

impl std::fmt::Display for SolverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for SolverId {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "highs" => Ok(SolverId::Highs),
            "clarabel" => Ok(SolverId::Clarabel),
            _ => Err(SolverError::UnknownSolver(s.to_string())),
        }
    }
}
