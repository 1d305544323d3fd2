//! Tie-break rows.
//!
//! Energy bands offered at the same referred price, in the same region and
//! with the same dispatch type, are dispatched pro rata to their volume:
//! `x / ub_x − y / ub_y = 0`. The rows are always made elastic at a small
//! cost so they never bind against physical limits.

use mce_core::{MarketInputs, Sense, Service};

use super::{ConstraintSet, RowSpec};
use crate::registry::{VarId, VariableKind, VariableRegistry};

const PRICE_TOLERANCE: f64 = 1e-9;

pub fn tie_break(inputs: &MarketInputs, registry: &VariableRegistry) -> Vec<RowSpec> {
    struct Band<'a> {
        id: VarId,
        upper: f64,
        cost: f64,
        key: (&'a str, &'a str),
        unit: &'a str,
        band: usize,
    }

    let mut bands: Vec<Band> = registry
        .iter()
        .filter_map(|def| match &def.kind {
            VariableKind::Bid {
                unit,
                service: Service::Energy,
                band,
                dispatch_type,
                region,
                price,
            } if def.upper > 0.0 => {
                let loss_factor = inputs.unit(unit).map(|u| u.loss_factor).unwrap_or(1.0);
                Some(Band {
                    id: def.id,
                    upper: def.upper,
                    cost: price / loss_factor,
                    key: (region.as_str(), dispatch_type.as_str()),
                    unit: unit.as_str(),
                    band: *band,
                })
            }
            _ => None,
        })
        .collect();
    bands.sort_by(|a, b| {
        a.key
            .cmp(&b.key)
            .then(a.cost.total_cmp(&b.cost))
            .then(a.unit.cmp(b.unit))
            .then(a.band.cmp(&b.band))
    });

    let mut rows = Vec::new();
    let mut start = 0;
    while start < bands.len() {
        let mut end = start + 1;
        while end < bands.len()
            && bands[end].key == bands[start].key
            && (bands[end].cost - bands[start].cost).abs() <= PRICE_TOLERANCE
        {
            end += 1;
        }
        let group = &bands[start..end];
        for (i, x) in group.iter().enumerate() {
            for y in &group[i + 1..] {
                if x.unit == y.unit {
                    continue;
                }
                rows.push(
                    RowSpec::new(
                        ConstraintSet::TieBreak,
                        format!("{}:{}|{}:{}", x.unit, x.band, y.unit, y.band),
                        Sense::Equal,
                        0.0,
                    )
                    .term(x.id, 1.0 / x.upper)
                    .term(y.id, -1.0 / y.upper),
                );
            }
        }
        start = end;
    }
    rows
}
