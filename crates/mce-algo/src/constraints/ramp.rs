//! Ramp rate rows.
//!
//! Bid ramp rates are capped by SCADA telemetry rates. Rates are in MW/h and
//! are scaled to the dispatch interval length.
//!
//! A bidirectional unit ramps on net output. Moving up from charging first
//! unwinds the load at its ramp-down rate and only then ramps generation, so
//! its net rates are a time-weighted blend of the two sides.

use mce_core::{DispatchType, MarketInputs, RampRates, Sense, Service, UnitId, UnitInfo};

use super::{ConstraintSet, RowSpec};
use crate::registry::VariableRegistry;

/// Ramp envelope of one unit over the interval.
#[derive(Debug, Clone, PartialEq)]
pub struct RampLimit {
    pub unit: UnitId,
    pub dispatch_type: DispatchType,
    pub initial_output_mw: f64,
    pub up_mw_per_h: f64,
    pub down_mw_per_h: f64,
}

impl RampLimit {
    pub fn max_output(&self, interval_minutes: f64) -> f64 {
        self.initial_output_mw + self.up_mw_per_h * interval_minutes / 60.0
    }

    pub fn min_output(&self, interval_minutes: f64) -> f64 {
        self.initial_output_mw - self.down_mw_per_h * interval_minutes / 60.0
    }

    fn new(unit: &UnitInfo, dispatch_type: DispatchType, rates: RampRates) -> Self {
        Self {
            unit: unit.id.clone(),
            dispatch_type,
            initial_output_mw: unit.initial_output_mw,
            up_mw_per_h: rates.up_mw_per_h,
            down_mw_per_h: rates.down_mw_per_h,
        }
    }
}

/// Limits from bid rates capped by SCADA rates.
///
/// Bidirectional units get one net limit built from both sides' bid rates
/// and capped by the generator side's SCADA rates.
pub fn bid_ramp_limits(inputs: &MarketInputs, interval_minutes: f64) -> Vec<RampLimit> {
    let bidirectional = inputs.bidirectional_units();
    let mut limits = Vec::new();
    for unit in &inputs.units {
        if !bidirectional.contains(&unit.id) {
            if let Some(rates) = unit.effective_ramp_rates() {
                limits.push(RampLimit::new(unit, unit.dispatch_type, rates));
            }
            continue;
        }
        if unit.dispatch_type == DispatchType::Load {
            continue;
        }
        let load = inputs
            .unit_side(&unit.id, Some(DispatchType::Load))
            .and_then(|l| l.ramp_rates);
        let rates = match (unit.ramp_rates, load) {
            (None, None) => unit.scada_ramp_rates,
            (generation, load) => {
                let net = net_ramp_rates(generation, load, unit.initial_output_mw, interval_minutes);
                Some(unit.scada_ramp_rates.map_or(net, |scada| net.min(scada)))
            }
        };
        if let Some(rates) = rates {
            limits.push(RampLimit::new(unit, DispatchType::Generator, rates));
        }
    }
    limits
}

/// Limits from SCADA rates only, used by joint ramping.
///
/// Bidirectional units use their generator side's telemetry on net output.
pub fn scada_ramp_limits(inputs: &MarketInputs) -> Vec<RampLimit> {
    let bidirectional = inputs.bidirectional_units();
    inputs
        .units
        .iter()
        .filter(|unit| !(bidirectional.contains(&unit.id) && unit.dispatch_type == DispatchType::Load))
        .filter_map(|unit| {
            unit.scada_ramp_rates
                .map(|rates| RampLimit::new(unit, unit.dispatch_type, rates))
        })
        .collect()
}

/// Net ramp rates of a bidirectional unit starting at `initial_mw` (negative
/// while charging). A side without bid rates ramps without limit.
pub fn net_ramp_rates(
    generation: Option<RampRates>,
    load: Option<RampRates>,
    initial_mw: f64,
    interval_minutes: f64,
) -> RampRates {
    let unlimited = RampRates::new(f64::INFINITY, f64::INFINITY);
    let generation = generation.unwrap_or(unlimited);
    let load = load.unwrap_or(unlimited);
    let hours = interval_minutes / 60.0;

    let up = if initial_mw >= 0.0 {
        generation.up_mw_per_h
    } else if load.down_mw_per_h == 0.0 {
        0.0
    } else if (initial_mw / load.down_mw_per_h).abs() >= hours {
        load.down_mw_per_h
    } else {
        let remaining = hours - (initial_mw / load.down_mw_per_h).abs();
        (remaining * generation.up_mw_per_h - initial_mw) / hours
    };

    let down = if initial_mw <= 0.0 {
        load.up_mw_per_h
    } else if generation.down_mw_per_h == 0.0 {
        0.0
    } else if (initial_mw / generation.down_mw_per_h).abs() >= hours {
        generation.down_mw_per_h
    } else {
        let remaining = hours - (initial_mw / generation.down_mw_per_h).abs();
        (remaining * load.up_mw_per_h + initial_mw) / hours
    };

    RampRates::new(up, down)
}

/// `Σ energy ≤ initial + up·I/60`, on net energy for bidirectional units.
pub fn ramp_up(limits: &[RampLimit], registry: &VariableRegistry, interval_minutes: f64) -> Vec<RowSpec> {
    limits
        .iter()
        .filter_map(|limit| {
            let terms = registry.unit_terms(&limit.unit, Service::Energy);
            let rhs = limit.max_output(interval_minutes);
            (!terms.is_empty() && rhs.is_finite()).then(|| {
                RowSpec::new(ConstraintSet::RampUp, limit.unit.as_str(), Sense::LessEqual, rhs).scaled(&terms, 1.0)
            })
        })
        .collect()
}

/// `Σ energy ≥ initial − down·I/60`
pub fn ramp_down(limits: &[RampLimit], registry: &VariableRegistry, interval_minutes: f64) -> Vec<RowSpec> {
    limits
        .iter()
        .filter_map(|limit| {
            let terms = registry.unit_terms(&limit.unit, Service::Energy);
            let rhs = limit.min_output(interval_minutes);
            (!terms.is_empty() && rhs.is_finite()).then(|| {
                RowSpec::new(ConstraintSet::RampDown, limit.unit.as_str(), Sense::GreaterEqual, rhs)
                    .scaled(&terms, 1.0)
            })
        })
        .collect()
}
