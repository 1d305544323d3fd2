//! Generic network constraints.
//!
//! Each constraint's left-hand side is assembled from its linking tables:
//! unit terms apply to every band of the unit's offer for the service,
//! region terms to every unit in the region offering the service, and
//! interconnector terms to the flow of every link of the interconnector,
//! signed by the link's generic constraint factor. Unit energy terms of a
//! bidirectional unit act on its net dispatch.

use std::collections::HashMap;

use mce_core::MarketInputs;

use super::{ConstraintSet, RowSpec};
use crate::registry::{VariableKind, VariableRegistry};

pub fn generic_constraints(inputs: &MarketInputs, registry: &VariableRegistry) -> Vec<RowSpec> {
    let mut rows: Vec<RowSpec> = inputs
        .generic_constraints
        .iter()
        .map(|c| RowSpec::new(ConstraintSet::Generic, c.name.as_str(), c.sense, c.rhs))
        .collect();
    let index: HashMap<&str, usize> = inputs
        .generic_constraints
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    for link in &inputs.unit_coefficients {
        if let Some(&i) = index.get(link.constraint.as_str()) {
            let terms = registry.unit_terms(&link.unit, link.service);
            rows[i].terms.extend(terms.iter().map(|&(v, c)| (v, c * link.coefficient)));
        }
    }

    for link in &inputs.region_coefficients {
        let Some(&i) = index.get(link.constraint.as_str()) else {
            continue;
        };
        for def in registry.iter() {
            if let VariableKind::Bid { service, region, .. } = &def.kind {
                if *service == link.service && *region == link.region {
                    rows[i].terms.push((def.id, link.coefficient));
                }
            }
        }
    }

    for link in &inputs.interconnector_coefficients {
        let Some(&i) = index.get(link.constraint.as_str()) else {
            continue;
        };
        for ic in inputs.links_of(&link.interconnector) {
            if let Some(flow) = registry.flow(&ic.key()) {
                rows[i].terms.push((flow, link.coefficient * ic.generic_constraint_factor));
            }
        }
    }

    rows
}
