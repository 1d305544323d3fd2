//! Piecewise-linear interconnector loss rows.
//!
//! Losses are interpolated between sampled break points with weight
//! variables `λ_i ∈ [0, 1]`:
//!
//! ```text
//! Σ λ_i = 1
//! Σ λ_i·flow_i − flow = 0
//! Σ λ_i·loss_i − loss = 0
//! ```
//!
//! When the sampled curve is convex and every extra MW of energy costs
//! money, the least-cost solution already uses adjacent break points.
//! Otherwise binary segment selectors `z_s` restrict the non-zero weights to
//! one segment:
//!
//! ```text
//! Σ z_s = 1
//! λ_0 ≤ z_0,  λ_i ≤ z_{i−1} + z_i,  λ_n ≤ z_{n−1}
//! ```
//!
//! A model that profits from consuming energy (negative-priced generation or
//! load bids) would otherwise interpolate between non-adjacent break points
//! and book losses the curve doesn't have.
//!
//! Links of a multi-link interconnector share one binary budget, so at most
//! one of them carries flow:
//!
//! ```text
//! min_l·y_l ≤ flow_l ≤ max_l·y_l,   Σ y_l ≤ 1
//! ```

use mce_core::{DispatchType, InterconnectorId, LinkKey, MarketInputs, Sense, Service};
use serde::{Deserialize, Serialize};

use super::{ConstraintSet, RowSpec};
use crate::registry::VariableRegistry;

/// How loss segments are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossSegmentSelection {
    /// Binary selectors only where interpolation could skip break points.
    #[default]
    Auto,
    /// Binary selectors for every curve.
    AlwaysBinary,
}

/// A loss model sampled for this interval.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLossModel {
    pub link: LinkKey,
    pub from_region_loss_share: f64,
    /// `(flow, loss)` at each break point, flows strictly increasing.
    pub samples: Vec<(f64, f64)>,
    pub needs_segment_selection: bool,
}

/// Sample every loss model at its break points.
///
/// Demand-dependent curves use each region's loss-function demand.
pub fn prepare_loss_models(inputs: &MarketInputs, selection: LossSegmentSelection) -> Vec<PreparedLossModel> {
    let energy_has_value = energy_can_earn(inputs);
    inputs
        .loss_models
        .iter()
        .map(|model| {
            let samples = model.curve.sample(|region| {
                inputs
                    .demand_for(region)
                    .map(|d| d.loss_function_demand())
                    .unwrap_or(0.0)
            });
            let needs_segment_selection = match selection {
                LossSegmentSelection::AlwaysBinary => true,
                LossSegmentSelection::Auto => energy_has_value || !is_convex(&samples),
            };
            PreparedLossModel {
                link: model.key(),
                from_region_loss_share: model.from_region_loss_share,
                samples,
                needs_segment_selection,
            }
        })
        .collect()
}

/// Whether any energy bid lowers the objective when dispatched: a load
/// energy band, or a generation band priced below zero at the reference node.
pub fn energy_can_earn(inputs: &MarketInputs) -> bool {
    inputs
        .offers
        .iter()
        .filter(|offer| offer.service == Service::Energy)
        .any(|offer| {
            let Some(side) = inputs.offer_side(offer) else {
                return false;
            };
            offer.tranches().filter(|&(_, _, volume)| volume > 0.0).any(|(_, price, _)| {
                side.dispatch_type == DispatchType::Load || price / side.loss_factor < 0.0
            })
        })
}

/// Whether segment slopes are non-decreasing.
pub fn is_convex(samples: &[(f64, f64)]) -> bool {
    let slopes: Vec<f64> = samples
        .windows(2)
        .map(|w| (w[1].1 - w[0].1) / (w[1].0 - w[0].0))
        .collect();
    slopes.windows(2).all(|s| s[1] >= s[0] - 1e-9)
}

pub fn interconnector_losses(models: &[PreparedLossModel], registry: &VariableRegistry) -> Vec<RowSpec> {
    let set = ConstraintSet::InterconnectorLosses;
    let mut rows = Vec::new();
    for model in models {
        let ic = &model.link;
        let (Some(flow), Some(loss)) = (registry.flow(ic), registry.loss(ic)) else {
            continue;
        };
        let weights = registry.loss_weights(ic);
        if weights.len() != model.samples.len() {
            continue;
        }

        rows.push(RowSpec::new(set, format!("{ic}/weights"), Sense::Equal, 1.0).terms(weights, 1.0));

        let mut flow_row = RowSpec::new(set, format!("{ic}/flow"), Sense::Equal, 0.0).term(flow, -1.0);
        let mut loss_row = RowSpec::new(set, format!("{ic}/loss"), Sense::Equal, 0.0).term(loss, -1.0);
        for (&w, &(bp_flow, bp_loss)) in weights.iter().zip(&model.samples) {
            flow_row = flow_row.term(w, bp_flow);
            loss_row = loss_row.term(w, bp_loss);
        }
        rows.push(flow_row);
        rows.push(loss_row);

        let selectors = registry.segment_selectors(ic);
        if selectors.is_empty() {
            continue;
        }
        rows.push(RowSpec::new(set, format!("{ic}/segments"), Sense::Equal, 1.0).terms(selectors, 1.0));
        for (i, &w) in weights.iter().enumerate() {
            let mut row = RowSpec::new(set, format!("{ic}/adjacent/{i}"), Sense::LessEqual, 0.0).term(w, 1.0);
            if i > 0 {
                row = row.term(selectors[i - 1], -1.0);
            }
            if i < selectors.len() {
                row = row.term(selectors[i], -1.0);
            }
            rows.push(row);
        }
    }
    rows
}

/// One-of-links rows for every multi-link interconnector.
pub fn interconnector_links(inputs: &MarketInputs, registry: &VariableRegistry) -> Vec<RowSpec> {
    let set = ConstraintSet::InterconnectorLinks;
    let mut rows = Vec::new();
    let mut seen: Vec<&InterconnectorId> = Vec::new();
    for ic in &inputs.interconnectors {
        let link = ic.key();
        let (Some(flow), Some(selector)) = (registry.flow(&link), registry.link_selector(&link)) else {
            continue;
        };
        rows.push(
            RowSpec::new(set, format!("{link}/max"), Sense::LessEqual, 0.0)
                .term(flow, 1.0)
                .term(selector, -ic.max_flow_mw),
        );
        rows.push(
            RowSpec::new(set, format!("{link}/min"), Sense::GreaterEqual, 0.0)
                .term(flow, 1.0)
                .term(selector, -ic.min_flow_mw),
        );
        if seen.contains(&&ic.id) {
            continue;
        }
        seen.push(&ic.id);
        let selectors: Vec<_> = inputs
            .links_of(&ic.id)
            .filter_map(|l| registry.link_selector(&l.key()))
            .collect();
        rows.push(RowSpec::new(set, format!("{}/one_link", ic.id), Sense::LessEqual, 1.0).terms(&selectors, 1.0));
    }
    rows
}
