//! Dispatch configuration.
//!
//! Every field has a default, so a TOML file only needs the settings it
//! changes:
//!
//! ```toml
//! solver = "highs"
//! dispatch_interval_minutes = 5.0
//!
//! [solver_options]
//! time_limit_seconds = 10.0
//!
//! [over_constrained]
//! enabled = true
//! energy_ceiling = 15500.0
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use mce_solver_common::SolverId;
use serde::{Deserialize, Serialize};

use crate::constraints::interconnector::LossSegmentSelection;
use crate::error::DispatchError;
use crate::fast_start::{FastStartConfig, FastStartStage};
use crate::model::BuildOptions;
use crate::over_constrained::{OverConstrainedConfig, ScenarioVariant};
use crate::solver::SolveOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub solver: SolverId,
    pub dispatch_interval_minutes: f64,
    pub solver_options: SolveOptions,
    /// Cost of the tie-break slacks; `None` disables tie-breaking.
    pub tie_break_cost: Option<f64>,
    pub loss_segments: LossSegmentSelection,
    pub fast_start: FastStartConfig,
    pub over_constrained: OverConstrainedConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            solver: SolverId::Highs,
            dispatch_interval_minutes: 5.0,
            solver_options: SolveOptions::default(),
            tie_break_cost: Some(1e-3),
            loss_segments: LossSegmentSelection::Auto,
            fast_start: FastStartConfig::default(),
            over_constrained: OverConstrainedConfig::default(),
        }
    }
}

impl DispatchConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading dispatch config {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("parsing dispatch config {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing dispatch config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if !(self.dispatch_interval_minutes.is_finite() && self.dispatch_interval_minutes > 0.0) {
            return Err(DispatchError::Config(format!(
                "dispatch_interval_minutes must be positive, got {}",
                self.dispatch_interval_minutes
            )));
        }
        if let Some(cost) = self.tie_break_cost {
            if !(cost.is_finite() && cost > 0.0) {
                return Err(DispatchError::Config(format!("tie_break_cost must be positive, got {cost}")));
            }
        }
        if let Some(limit) = self.solver_options.time_limit_seconds {
            if !(limit.is_finite() && limit > 0.0) {
                return Err(DispatchError::Config(format!(
                    "time_limit_seconds must be positive, got {limit}"
                )));
            }
        }
        if self.fast_start.max_iterations == 0 {
            return Err(DispatchError::Config("fast_start.max_iterations must be at least 1".into()));
        }
        self.over_constrained.validate()
    }

    pub fn with_solver(mut self, solver: SolverId) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_interval_minutes(mut self, minutes: f64) -> Self {
        self.dispatch_interval_minutes = minutes;
        self
    }

    pub fn with_tie_break_cost(mut self, cost: Option<f64>) -> Self {
        self.tie_break_cost = cost;
        self
    }

    pub fn with_loss_segments(mut self, selection: LossSegmentSelection) -> Self {
        self.loss_segments = selection;
        self
    }

    pub fn with_over_constrained(mut self, config: OverConstrainedConfig) -> Self {
        self.over_constrained = config;
        self
    }

    /// Enable over-constrained dispatch with the default limits.
    pub fn with_over_constrained_dispatch(mut self) -> Self {
        self.over_constrained.enabled = true;
        self
    }

    pub fn with_scenario(mut self, scenario: ScenarioVariant) -> Self {
        self.over_constrained.scenarios.push(scenario);
        self
    }

    pub fn build_options(&self, fast_start: FastStartStage) -> BuildOptions {
        BuildOptions {
            interval_minutes: self.dispatch_interval_minutes,
            loss_segments: self.loss_segments,
            tie_break_cost: self.tie_break_cost,
            fast_start,
        }
    }
}
