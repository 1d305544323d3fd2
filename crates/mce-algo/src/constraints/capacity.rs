//! Unit capacity rows: bid availability and UIGF.

use mce_core::{Sense, Service, UnitLimit};

use super::{ConstraintSet, RowSpec};
use crate::registry::VariableRegistry;

/// `Σ energy tranches ≤ capacity` per unit in `limits`.
///
/// Units without energy variables produce no row. Bidirectional units are
/// capped on net dispatch.
pub fn unit_bid_capacity(limits: &[UnitLimit], registry: &VariableRegistry) -> Vec<RowSpec> {
    capacity_rows(ConstraintSet::UnitBidCapacity, limits, registry)
}

/// `Σ energy tranches ≤ forecast` for semi-scheduled units.
pub fn uigf_capacity(limits: &[UnitLimit], registry: &VariableRegistry) -> Vec<RowSpec> {
    capacity_rows(ConstraintSet::UigfCapacity, limits, registry)
}

fn capacity_rows(set: ConstraintSet, limits: &[UnitLimit], registry: &VariableRegistry) -> Vec<RowSpec> {
    limits
        .iter()
        .filter_map(|limit| {
            let terms = registry.unit_terms(&limit.unit, Service::Energy);
            if terms.is_empty() {
                return None;
            }
            Some(
                RowSpec::new(set, limit.unit.as_str(), Sense::LessEqual, limit.capacity_mw)
                    .scaled(&terms, 1.0),
            )
        })
        .collect()
}
