//! Elasticity transformer.
//!
//! Turns hard rows into soft ones by attaching non-negative slack variables
//! whose cost is added to the objective:
//!
//! | Sense | LHS becomes |
//! |-------|-------------|
//! | `>=` | `lhs + s` |
//! | `<=` | `lhs − s` |
//! | `=`  | `lhs − s_up + s_down` |

use std::collections::{BTreeMap, HashMap};

use mce_core::Sense;
use serde::Serialize;

use crate::constraints::{ConstraintSet, ConstraintStore, RowId};
use crate::error::DispatchError;
use crate::objective::Objective;
use crate::registry::{SlackSign, VariableKind, VariableRegistry};

/// Violation cost for a set of rows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationCost {
    /// Same cost for every row in the set.
    Uniform(f64),
    /// Cost per row name. Rows not named stay hard.
    PerConstraint(HashMap<String, f64>),
}

impl ViolationCost {
    fn for_row(&self, name: &str) -> Option<f64> {
        match self {
            ViolationCost::Uniform(cost) => Some(*cost),
            ViolationCost::PerConstraint(costs) => costs.get(name).copied(),
        }
    }
}

/// Attach slacks to the rows of `set`. Returns the number of rows made elastic.
///
/// Fails if the set has no rows or a row is already elastic.
pub fn make_elastic(
    constraints: &mut ConstraintStore,
    registry: &mut VariableRegistry,
    objective: &mut Objective,
    set: ConstraintSet,
    cost: &ViolationCost,
) -> Result<usize, DispatchError> {
    let ids = constraints.ids_in_set(set);
    if ids.is_empty() {
        return Err(DispatchError::InternalFormulation(format!(
            "cannot make unknown constraint set '{set}' elastic"
        )));
    }

    let mut count = 0;
    for id in ids {
        let row = constraints.get(id);
        let Some(c) = cost.for_row(&row.name) else {
            continue;
        };
        if row.elastic {
            return Err(DispatchError::InternalFormulation(format!(
                "row '{}' in set '{set}' is already elastic",
                row.name
            )));
        }
        let signs: &[SlackSign] = match row.sense {
            Sense::GreaterEqual => &[SlackSign::Plus],
            Sense::LessEqual => &[SlackSign::Minus],
            Sense::Equal => &[SlackSign::Minus, SlackSign::Plus],
        };
        let mut slacks = Vec::with_capacity(signs.len());
        for &sign in signs {
            let slack = registry.add(0.0, f64::INFINITY, false, VariableKind::Slack { set, row: id, sign });
            objective.add(slack, c);
            slacks.push((slack, sign.coefficient()));
        }
        let row = constraints.get_mut(id);
        row.terms.extend(slacks);
        row.elastic = true;
        count += 1;
    }
    Ok(count)
}

/// Violation of one elastic row after a solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowViolation {
    pub set: ConstraintSet,
    pub name: String,
    pub violation: f64,
}

/// Rows whose slack sum exceeds `tolerance`, in row order.
pub fn row_violations(
    constraints: &ConstraintStore,
    registry: &VariableRegistry,
    values: &[f64],
    tolerance: f64,
) -> Vec<RowViolation> {
    let mut totals: BTreeMap<RowId, f64> = BTreeMap::new();
    for def in registry.iter() {
        if let VariableKind::Slack { row, .. } = def.kind {
            *totals.entry(row).or_insert(0.0) += values[def.id.value()];
        }
    }
    totals
        .into_iter()
        .filter(|&(_, v)| v > tolerance)
        .map(|(id, violation)| {
            let row = constraints.get(id);
            RowViolation {
                set: row.set,
                name: row.name.clone(),
                violation,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::RowSpec;
    use crate::registry::VarId;

    fn store() -> (ConstraintStore, VariableRegistry) {
        let mut registry = VariableRegistry::new();
        let x = registry.add(
            0.0,
            10.0,
            false,
            VariableKind::InterconnectorFlow {
                link: "X".into(),
            },
        );
        let mut constraints = ConstraintStore::new();
        constraints.push(RowSpec::new(ConstraintSet::Generic, "GE", Sense::GreaterEqual, 5.0).term(x, 1.0));
        constraints.push(RowSpec::new(ConstraintSet::Generic, "LE", Sense::LessEqual, 5.0).term(x, 1.0));
        constraints.push(RowSpec::new(ConstraintSet::Generic, "EQ", Sense::Equal, 5.0).term(x, 1.0));
        (constraints, registry)
    }

    #[test]
    fn test_slack_signs_by_sense() {
        let (mut constraints, mut registry) = store();
        let mut objective = Objective::new();
        let n = make_elastic(
            &mut constraints,
            &mut registry,
            &mut objective,
            ConstraintSet::Generic,
            &ViolationCost::Uniform(100.0),
        )
        .unwrap();
        assert_eq!(n, 3);
        // 1 + 1 + 2 slacks
        assert_eq!(registry.len(), 5);

        let ge = constraints.find(ConstraintSet::Generic, "GE").unwrap();
        assert_eq!(ge.terms[1], (VarId::new(1), 1.0));
        let le = constraints.find(ConstraintSet::Generic, "LE").unwrap();
        assert_eq!(le.terms[1], (VarId::new(2), -1.0));
        let eq = constraints.find(ConstraintSet::Generic, "EQ").unwrap();
        assert_eq!(&eq.terms[1..], &[(VarId::new(3), -1.0), (VarId::new(4), 1.0)]);
        assert!(eq.elastic);
        assert_eq!(objective.cost(VarId::new(4)), 100.0);
        assert_eq!(registry.get(VarId::new(4)).upper, f64::INFINITY);
    }

    #[test]
    fn test_per_constraint_costs_leave_others_hard() {
        let (mut constraints, mut registry) = store();
        let mut objective = Objective::new();
        let costs = ViolationCost::PerConstraint([("LE".to_string(), 7.0)].into_iter().collect());
        let n = make_elastic(&mut constraints, &mut registry, &mut objective, ConstraintSet::Generic, &costs).unwrap();
        assert_eq!(n, 1);
        assert!(!constraints.find(ConstraintSet::Generic, "GE").unwrap().elastic);
    }

    #[test]
    fn test_unknown_set_and_double_elastic() {
        let (mut constraints, mut registry) = store();
        let mut objective = Objective::new();
        let err = make_elastic(
            &mut constraints,
            &mut registry,
            &mut objective,
            ConstraintSet::RampUp,
            &ViolationCost::Uniform(1.0),
        )
        .unwrap_err();
        assert!(matches!(err, DispatchError::InternalFormulation(_)));

        let cost = ViolationCost::Uniform(1.0);
        make_elastic(&mut constraints, &mut registry, &mut objective, ConstraintSet::Generic, &cost).unwrap();
        assert!(make_elastic(&mut constraints, &mut registry, &mut objective, ConstraintSet::Generic, &cost).is_err());
    }

    #[test]
    fn test_row_violations() {
        let (mut constraints, mut registry) = store();
        let mut objective = Objective::new();
        make_elastic(
            &mut constraints,
            &mut registry,
            &mut objective,
            ConstraintSet::Generic,
            &ViolationCost::Uniform(1.0),
        )
        .unwrap();
        let values = [0.0, 5.0, 0.0, 2.0, 0.5];
        let violations = row_violations(&constraints, &registry, &values, 1e-6);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].name, "GE");
        assert_eq!(violations[1].violation, 2.5);
    }
}
