//! Interconnectors and their loss models.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ValidationError, ValidationResult};
use crate::{InterconnectorId, LinkId, RegionId};

/// Identifies one flow path: an interconnector, or one link of a
/// multi-link interconnector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub interconnector: InterconnectorId,
    #[serde(default)]
    pub link: Option<LinkId>,
}

impl LinkKey {
    pub fn new(interconnector: impl Into<InterconnectorId>, link: Option<LinkId>) -> Self {
        Self {
            interconnector: interconnector.into(),
            link,
        }
    }
}

impl From<InterconnectorId> for LinkKey {
    fn from(interconnector: InterconnectorId) -> Self {
        Self::new(interconnector, None)
    }
}

impl From<&str> for LinkKey {
    fn from(interconnector: &str) -> Self {
        Self::new(interconnector, None)
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.link {
            Some(link) => write!(f, "{}/{}", self.interconnector, link),
            None => write!(f, "{}", self.interconnector),
        }
    }
}

/// Directed link between two regions.
///
/// Positive flow runs from `from_region` to `to_region`. Records sharing an
/// `id` but naming different `link`s are parallel paths of one
/// interconnector; each carries its own regions, limits and loss factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interconnector {
    pub id: InterconnectorId,
    #[serde(default)]
    pub link: Option<LinkId>,
    pub from_region: RegionId,
    pub to_region: RegionId,
    pub min_flow_mw: f64,
    pub max_flow_mw: f64,
    #[serde(default = "unity")]
    pub from_region_loss_factor: f64,
    #[serde(default = "unity")]
    pub to_region_loss_factor: f64,
    /// `1` or `-1`: sign of this link's flow in generic constraints that
    /// reference the interconnector.
    #[serde(default = "unity")]
    pub generic_constraint_factor: f64,
}

fn unity() -> f64 {
    1.0
}

impl Interconnector {
    pub fn new(
        id: impl Into<InterconnectorId>,
        from_region: impl Into<RegionId>,
        to_region: impl Into<RegionId>,
        min_flow_mw: f64,
        max_flow_mw: f64,
    ) -> Self {
        Self {
            id: id.into(),
            link: None,
            from_region: from_region.into(),
            to_region: to_region.into(),
            min_flow_mw,
            max_flow_mw,
            from_region_loss_factor: 1.0,
            to_region_loss_factor: 1.0,
            generic_constraint_factor: 1.0,
        }
    }

    pub fn with_loss_factors(mut self, from_region: f64, to_region: f64) -> Self {
        self.from_region_loss_factor = from_region;
        self.to_region_loss_factor = to_region;
        self
    }

    pub fn with_generic_constraint_factor(mut self, factor: f64) -> Self {
        self.generic_constraint_factor = factor;
        self
    }

    pub fn with_link(mut self, link: impl Into<LinkId>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.id.clone(), self.link.clone())
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let invalid = |reason: String| ValidationError::InvalidInterconnector {
            interconnector: self.id.clone(),
            reason,
        };
        if self.from_region == self.to_region {
            return Err(invalid(format!(
                "connects region {} to itself",
                self.from_region
            )));
        }
        for value in [
            self.min_flow_mw,
            self.max_flow_mw,
            self.from_region_loss_factor,
            self.to_region_loss_factor,
        ] {
            ensure_finite(|| format!("interconnector {}", self.id), value)?;
        }
        if self.min_flow_mw > self.max_flow_mw {
            return Err(invalid(format!(
                "min flow {} exceeds max flow {}",
                self.min_flow_mw, self.max_flow_mw
            )));
        }
        if self.from_region_loss_factor <= 0.0 || self.to_region_loss_factor <= 0.0 {
            return Err(invalid("region loss factors must be positive".into()));
        }
        if self.generic_constraint_factor != 1.0 && self.generic_constraint_factor != -1.0 {
            return Err(invalid(format!(
                "generic constraint factor {} must be 1 or -1",
                self.generic_constraint_factor
            )));
        }
        Ok(())
    }
}

/// One point of a percentage loss curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossBreakpoint {
    pub flow_mw: f64,
    pub loss_percent: f64,
}

impl LossBreakpoint {
    pub fn new(flow_mw: f64, loss_percent: f64) -> Self {
        Self {
            flow_mw,
            loss_percent,
        }
    }

    pub fn loss_mw(&self) -> f64 {
        self.flow_mw.abs() * self.loss_percent / 100.0
    }
}

/// Loss as a function of flow, sampled at break points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LossCurve {
    /// Loss at each break point is `|flow| * loss_percent / 100`.
    Percentage { break_points: Vec<LossBreakpoint> },
    /// Demand dependent quadratic:
    /// `loss(f) = (loss_constant + Σ k_r·D_r − 1)·f + (flow_coefficient / 2)·f²`
    /// where `D_r` is the loss-function demand of region `r`.
    Quadratic {
        loss_constant: f64,
        flow_coefficient: f64,
        #[serde(default)]
        demand_coefficients: Vec<(RegionId, f64)>,
        break_points: Vec<f64>,
    },
}

impl LossCurve {
    pub fn break_point_flows(&self) -> Vec<f64> {
        match self {
            LossCurve::Percentage { break_points } => {
                break_points.iter().map(|bp| bp.flow_mw).collect()
            }
            LossCurve::Quadratic { break_points, .. } => break_points.clone(),
        }
    }

    /// `(flow, loss)` samples. `demand` resolves a region's loss-function demand.
    pub fn sample<F>(&self, demand: F) -> Vec<(f64, f64)>
    where
        F: Fn(&RegionId) -> f64,
    {
        match self {
            LossCurve::Percentage { break_points } => break_points
                .iter()
                .map(|bp| (bp.flow_mw, bp.loss_mw()))
                .collect(),
            LossCurve::Quadratic {
                loss_constant,
                flow_coefficient,
                demand_coefficients,
                break_points,
            } => {
                let offset: f64 = demand_coefficients
                    .iter()
                    .map(|(region, k)| k * demand(region))
                    .sum();
                let linear = loss_constant + offset - 1.0;
                break_points
                    .iter()
                    .map(|&f| (f, linear * f + flow_coefficient / 2.0 * f * f))
                    .collect()
            }
        }
    }
}

/// Piecewise-linear loss model of one interconnector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossModel {
    pub interconnector: InterconnectorId,
    /// Link the model applies to, for multi-link interconnectors.
    #[serde(default)]
    pub link: Option<LinkId>,
    /// Share of losses allocated to the from-region; the remainder goes to the to-region.
    pub from_region_loss_share: f64,
    pub curve: LossCurve,
}

impl LossModel {
    /// Percentage model from `(flow, loss %)` pairs.
    pub fn percentage(
        interconnector: impl Into<InterconnectorId>,
        from_region_loss_share: f64,
        points: &[(f64, f64)],
    ) -> Self {
        Self {
            interconnector: interconnector.into(),
            link: None,
            from_region_loss_share,
            curve: LossCurve::Percentage {
                break_points: points
                    .iter()
                    .map(|&(flow, pct)| LossBreakpoint::new(flow, pct))
                    .collect(),
            },
        }
    }

    pub fn for_link(mut self, link: impl Into<LinkId>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.interconnector.clone(), self.link.clone())
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if !(0.0..=1.0).contains(&self.from_region_loss_share) {
            return Err(ValidationError::InvalidLossShare {
                interconnector: self.interconnector.clone(),
                value: self.from_region_loss_share,
            });
        }
        let flows = self.curve.break_point_flows();
        if flows.len() < 2 {
            return Err(ValidationError::TooFewBreakpoints {
                interconnector: self.interconnector.clone(),
                count: flows.len(),
            });
        }
        for flow in &flows {
            ensure_finite(|| format!("loss model {} break point", self.interconnector), *flow)?;
        }
        for pair in flows.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ValidationError::NonIncreasingBreakpoints {
                    interconnector: self.interconnector.clone(),
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        if let LossCurve::Percentage { break_points } = &self.curve {
            for bp in break_points {
                ensure_finite(|| format!("loss model {} loss %", self.interconnector), bp.loss_percent)?;
            }
        }
        Ok(())
    }
}
