//! Variable registry.
//!
//! Allocates every decision variable of the dispatch model together with its
//! bounds, integrality and the entity it belongs to, so solved values can be
//! mapped back to units, interconnectors and constraint slacks.

use std::collections::{HashMap, HashSet};

use mce_core::{DispatchType, LinkKey, MarketInputs, RegionId, Service, UnitId, ValidationError};
use serde::Serialize;

use crate::constraints::{ConstraintSet, RowId};
use crate::constraints::interconnector::PreparedLossModel;
use crate::error::DispatchError;

/// Index of a decision variable within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn new(value: usize) -> Self {
        VarId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Coefficient of a slack variable in the row it relaxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlackSign {
    Plus,
    Minus,
}

impl SlackSign {
    pub fn coefficient(&self) -> f64 {
        match self {
            SlackSign::Plus => 1.0,
            SlackSign::Minus => -1.0,
        }
    }
}

/// The entity a variable belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableKind {
    /// Dispatch of one price band of a unit's offer.
    Bid {
        unit: UnitId,
        service: Service,
        band: usize,
        dispatch_type: DispatchType,
        region: RegionId,
        price: f64,
    },
    InterconnectorFlow {
        link: LinkKey,
    },
    InterconnectorLoss {
        link: LinkKey,
    },
    /// Interpolation weight on one loss-curve break point.
    LossWeight {
        link: LinkKey,
        break_point: usize,
    },
    /// Binary selecting the active loss segment.
    SegmentSelector {
        link: LinkKey,
        segment: usize,
    },
    /// Binary selecting the one link of a multi-link interconnector allowed to flow.
    LinkSelector {
        link: LinkKey,
    },
    /// Violation of an elastic row.
    Slack {
        set: ConstraintSet,
        row: RowId,
        sign: SlackSign,
    },
}

/// A registered decision variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDef {
    pub id: VarId,
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
    pub kind: VariableKind,
}

/// Id to metadata mapping for one model.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    vars: Vec<VariableDef>,
    bids: HashMap<(UnitId, Service), Vec<VarId>>,
    bidirectional: HashSet<UnitId>,
    flows: HashMap<LinkKey, VarId>,
    losses: HashMap<LinkKey, VarId>,
    weights: HashMap<LinkKey, Vec<VarId>>,
    selectors: HashMap<LinkKey, Vec<VarId>>,
    link_selectors: HashMap<LinkKey, VarId>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDef> {
        self.vars.iter()
    }

    pub fn get(&self, id: VarId) -> &VariableDef {
        &self.vars[id.0]
    }

    /// Register a variable and index it by owning entity.
    pub fn add(&mut self, lower: f64, upper: f64, integer: bool, kind: VariableKind) -> VarId {
        let id = VarId(self.vars.len());
        match &kind {
            VariableKind::Bid { unit, service, .. } => {
                self.bids.entry((unit.clone(), *service)).or_default().push(id);
            }
            VariableKind::InterconnectorFlow { link } => {
                self.flows.insert(link.clone(), id);
            }
            VariableKind::InterconnectorLoss { link } => {
                self.losses.insert(link.clone(), id);
            }
            VariableKind::LossWeight { link, .. } => {
                self.weights.entry(link.clone()).or_default().push(id);
            }
            VariableKind::SegmentSelector { link, .. } => {
                self.selectors.entry(link.clone()).or_default().push(id);
            }
            VariableKind::LinkSelector { link } => {
                self.link_selectors.insert(link.clone(), id);
            }
            VariableKind::Slack { .. } => {}
        }
        self.vars.push(VariableDef {
            id,
            lower,
            upper,
            integer,
            kind,
        });
        id
    }

    /// One variable per offer band with positive volume, bounded `[0, volume]`.
    ///
    /// Zero-volume bands are skipped. Returns the number of variables created.
    pub fn register_bid_tranches(&mut self, inputs: &MarketInputs) -> Result<usize, DispatchError> {
        let mut created = 0;
        self.bidirectional = inputs.bidirectional_units();
        for offer in &inputs.offers {
            let unit = inputs.offer_side(offer).ok_or_else(|| ValidationError::UnknownUnit {
                table: "offers",
                unit: offer.unit.clone(),
            })?;
            for (band, price, volume) in offer.tranches() {
                if volume < 0.0 {
                    return Err(ValidationError::NegativeVolume {
                        unit: offer.unit.clone(),
                        service: offer.service,
                        band,
                        volume,
                    }
                    .into());
                }
                if volume == 0.0 {
                    continue;
                }
                self.add(
                    0.0,
                    volume,
                    false,
                    VariableKind::Bid {
                        unit: offer.unit.clone(),
                        service: offer.service,
                        band,
                        dispatch_type: unit.dispatch_type,
                        region: unit.region.clone(),
                        price,
                    },
                );
                created += 1;
            }
        }
        Ok(created)
    }

    /// Flow, loss, interpolation weight and (for non-convex curves) segment
    /// selector variables for every interconnector link.
    ///
    /// Links of a multi-link interconnector also get a binary selector, and
    /// their flow bounds are widened to include zero so an unselected link
    /// can sit idle; the link rows enforce the real limits.
    pub fn register_interconnectors(
        &mut self,
        inputs: &MarketInputs,
        loss_models: &[PreparedLossModel],
    ) -> usize {
        let before = self.vars.len();
        for ic in &inputs.interconnectors {
            let link = ic.key();
            let multi_link = inputs.is_multi_link(&ic.id);
            let (lower, upper) = if multi_link {
                (ic.min_flow_mw.min(0.0), ic.max_flow_mw.max(0.0))
            } else {
                (ic.min_flow_mw, ic.max_flow_mw)
            };
            self.add(lower, upper, false, VariableKind::InterconnectorFlow { link: link.clone() });
            if multi_link {
                self.add(0.0, 1.0, true, VariableKind::LinkSelector { link: link.clone() });
            }
            let Some(model) = loss_models.iter().find(|m| m.link == link) else {
                continue;
            };
            self.add(
                f64::NEG_INFINITY,
                f64::INFINITY,
                false,
                VariableKind::InterconnectorLoss { link: link.clone() },
            );
            for break_point in 0..model.samples.len() {
                self.add(
                    0.0,
                    1.0,
                    false,
                    VariableKind::LossWeight {
                        link: link.clone(),
                        break_point,
                    },
                );
            }
            if model.needs_segment_selection {
                for segment in 0..model.samples.len() - 1 {
                    self.add(
                        0.0,
                        1.0,
                        true,
                        VariableKind::SegmentSelector {
                            link: link.clone(),
                            segment,
                        },
                    );
                }
            }
        }
        self.vars.len() - before
    }

    /// Band variables of one (unit, service), in band order.
    pub fn bid_variables(&self, unit: &UnitId, service: Service) -> &[VarId] {
        self.bids
            .get(&(unit.clone(), service))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Band variables of one side of a unit.
    pub fn side_variables(&self, unit: &UnitId, dispatch_type: DispatchType, service: Service) -> Vec<VarId> {
        self.bid_variables(unit, service)
            .iter()
            .copied()
            .filter(|&id| matches!(self.get(id).kind, VariableKind::Bid { dispatch_type: d, .. } if d == dispatch_type))
            .collect()
    }

    /// Terms whose sum is the unit's dispatch of `service`.
    ///
    /// Energy of a bidirectional unit is net of its load side, so load-side
    /// energy bands carry `-1`.
    pub fn unit_terms(&self, unit: &UnitId, service: Service) -> Vec<(VarId, f64)> {
        let net = service == Service::Energy && self.bidirectional.contains(unit);
        self.bid_variables(unit, service)
            .iter()
            .map(|&id| match self.get(id).kind {
                VariableKind::Bid {
                    dispatch_type: DispatchType::Load,
                    ..
                } if net => (id, -1.0),
                _ => (id, 1.0),
            })
            .collect()
    }

    /// The unit's dispatch of `service` at `values`, net for bidirectional energy.
    pub fn unit_value(&self, unit: &UnitId, service: Service, values: &[f64]) -> f64 {
        self.unit_terms(unit, service)
            .iter()
            .map(|&(id, c)| c * values[id.0])
            .sum()
    }

    pub fn is_bidirectional(&self, unit: &UnitId) -> bool {
        self.bidirectional.contains(unit)
    }

    /// Every (unit, service) pair that has at least one variable.
    pub fn bid_keys(&self) -> impl Iterator<Item = &(UnitId, Service)> {
        self.bids.keys()
    }

    pub fn flow(&self, link: &LinkKey) -> Option<VarId> {
        self.flows.get(link).copied()
    }

    pub fn loss(&self, link: &LinkKey) -> Option<VarId> {
        self.losses.get(link).copied()
    }

    pub fn loss_weights(&self, link: &LinkKey) -> &[VarId] {
        self.weights.get(link).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn segment_selectors(&self, link: &LinkKey) -> &[VarId] {
        self.selectors.get(link).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn link_selector(&self, link: &LinkKey) -> Option<VarId> {
        self.link_selectors.get(link).copied()
    }

    pub fn has_integers(&self) -> bool {
        self.vars.iter().any(|v| v.integer)
    }

    /// Fix a variable at `value` and make it continuous.
    pub fn fix(&mut self, id: VarId, value: f64) {
        let var = &mut self.vars[id.0];
        var.lower = value;
        var.upper = value;
        var.integer = false;
    }

    /// Sum of `values` over the given variables.
    pub fn sum(ids: &[VarId], values: &[f64]) -> f64 {
        ids.iter().map(|id| values[id.0]).sum()
    }
}
