//! Fast-start profile bounds on energy dispatch.

use mce_core::{Sense, Service};

use super::{ConstraintSet, RowSpec};
use crate::fast_start::FastStartTarget;
use crate::registry::VariableRegistry;

pub fn fast_start_profiles(targets: &[FastStartTarget], registry: &VariableRegistry) -> Vec<RowSpec> {
    let mut rows = Vec::new();
    for target in targets {
        let energy = registry.unit_terms(&target.unit, Service::Energy);
        if energy.is_empty() {
            continue;
        }
        if let Some(min) = target.min_output() {
            rows.push(
                RowSpec::new(
                    ConstraintSet::FastStart,
                    format!("{}/min", target.unit),
                    Sense::GreaterEqual,
                    min,
                )
                .scaled(&energy, 1.0),
            );
        }
        if let Some(max) = target.max_output() {
            rows.push(
                RowSpec::new(
                    ConstraintSet::FastStart,
                    format!("{}/max", target.unit),
                    Sense::LessEqual,
                    max,
                )
                .scaled(&energy, 1.0),
            );
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast_start::advance_profile;
    use mce_core::{FastStartProfile, MarketInputsBuilder, Offer, RegionalDemand, UnitInfo};

    #[test]
    fn test_rows_per_end_mode() {
        let inputs = MarketInputsBuilder::new()
            .region("NSW")
            .unit(UnitInfo::generator("F", "NSW"))
            .unit(UnitInfo::generator("G", "NSW"))
            .offer(Offer::energy("F", vec![10.0], vec![100.0]))
            .offer(Offer::energy("G", vec![10.0], vec![100.0]))
            .demand(RegionalDemand::new("NSW", 10.0))
            .build()
            .unwrap();
        let mut registry = VariableRegistry::new();
        registry.register_bid_tranches(&inputs).unwrap();

        let lengths = |p: FastStartProfile| p.with_mode_lengths(3.0, 5.0, 10.0, 5.0);
        let off = advance_profile(&lengths(FastStartProfile::new("F", 0, 40.0)), false, 5.0);
        let running = advance_profile(&lengths(FastStartProfile::new("G", 3, 40.0)), false, 5.0);

        let rows = fast_start_profiles(&[off, running], &registry);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "F/max");
        assert_eq!(rows[0].rhs, 0.0);
        assert_eq!(rows[1].name, "G/min");
        assert_eq!(rows[1].sense, Sense::GreaterEqual);
        assert_eq!(rows[1].rhs, 40.0);
    }
}
