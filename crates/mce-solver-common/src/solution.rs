//! Outcome of one backend solve.

use serde::{Deserialize, Serialize};

/// How a dispatch or pricing solve ended.
///
/// Solver failures and timeouts are errors, not statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    /// Primal values (and duals, if requested) are available.
    Optimal,
    /// No dispatch satisfies the hard rows.
    Infeasible,
    /// Only reachable through a malformed objective: every bid band is bounded.
    Unbounded,
}

impl SolutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolutionStatus::Optimal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionStatus::Optimal => "optimal",
            SolutionStatus::Infeasible => "infeasible",
            SolutionStatus::Unbounded => "unbounded",
        }
    }
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
