//! Constraint builders.
//!
//! Each builder is a pure function from market tables and the variable
//! registry to a list of [`RowSpec`]s belonging to one [`ConstraintSet`].
//! The model builder pushes the specs into a [`ConstraintStore`], which
//! assigns row ids and keeps the set membership used for pricing,
//! elasticity and diagnostics.

pub mod capacity;
pub mod fast_start;
pub mod fcas;
pub mod generic;
pub mod interconnector;
pub mod ramp;
pub mod regional;
pub mod tie_break;

use std::collections::BTreeSet;
use std::fmt;

use mce_core::Sense;
use serde::{Deserialize, Serialize};

use crate::registry::VarId;

/// Named family of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSet {
    UnitBidCapacity,
    UigfCapacity,
    RampUp,
    RampDown,
    FcasMaxAvailability,
    JointCapacity,
    EnergyAndRegulationCapacity,
    JointRampingRaiseReg,
    JointRampingLowerReg,
    InterconnectorLosses,
    InterconnectorLinks,
    Generic,
    Demand,
    Fcas,
    TieBreak,
    FastStart,
}

impl ConstraintSet {
    pub const ALL: [ConstraintSet; 16] = [
        ConstraintSet::UnitBidCapacity,
        ConstraintSet::UigfCapacity,
        ConstraintSet::RampUp,
        ConstraintSet::RampDown,
        ConstraintSet::FcasMaxAvailability,
        ConstraintSet::JointCapacity,
        ConstraintSet::EnergyAndRegulationCapacity,
        ConstraintSet::JointRampingRaiseReg,
        ConstraintSet::JointRampingLowerReg,
        ConstraintSet::InterconnectorLosses,
        ConstraintSet::InterconnectorLinks,
        ConstraintSet::Generic,
        ConstraintSet::Demand,
        ConstraintSet::Fcas,
        ConstraintSet::TieBreak,
        ConstraintSet::FastStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintSet::UnitBidCapacity => "unit_bid_capacity",
            ConstraintSet::UigfCapacity => "uigf_capacity",
            ConstraintSet::RampUp => "ramp_up",
            ConstraintSet::RampDown => "ramp_down",
            ConstraintSet::FcasMaxAvailability => "fcas_max_availability",
            ConstraintSet::JointCapacity => "joint_capacity",
            ConstraintSet::EnergyAndRegulationCapacity => "energy_and_regulation_capacity",
            ConstraintSet::JointRampingRaiseReg => "joint_ramping_raise_reg",
            ConstraintSet::JointRampingLowerReg => "joint_ramping_lower_reg",
            ConstraintSet::InterconnectorLosses => "interconnector_losses",
            ConstraintSet::InterconnectorLinks => "interconnector_links",
            ConstraintSet::Generic => "generic",
            ConstraintSet::Demand => "demand",
            ConstraintSet::Fcas => "fcas",
            ConstraintSet::TieBreak => "tie_break",
            ConstraintSet::FastStart => "fast_start",
        }
    }

    /// Sets whose row duals are reported as prices.
    pub fn is_market(&self) -> bool {
        matches!(self, ConstraintSet::Demand | ConstraintSet::Fcas)
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConstraintSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintSet::ALL
            .iter()
            .copied()
            .find(|set| set.as_str() == s)
            .ok_or_else(|| format!("unknown constraint set '{s}'"))
    }
}

/// Index of a row within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(usize);

impl RowId {
    pub fn value(&self) -> usize {
        self.0
    }
}

/// A row as produced by a builder, before it is assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSpec {
    pub set: ConstraintSet,
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl RowSpec {
    pub fn new(set: ConstraintSet, name: impl Into<String>, sense: Sense, rhs: f64) -> Self {
        Self {
            set,
            name: name.into(),
            terms: Vec::new(),
            sense,
            rhs,
        }
    }

    pub fn term(mut self, var: VarId, coefficient: f64) -> Self {
        self.terms.push((var, coefficient));
        self
    }

    /// Add every variable with the same coefficient.
    pub fn terms(mut self, vars: &[VarId], coefficient: f64) -> Self {
        self.terms.extend(vars.iter().map(|&v| (v, coefficient)));
        self
    }

    /// Add `(variable, coefficient)` pairs, each coefficient multiplied by `scale`.
    pub fn scaled(mut self, terms: &[(VarId, f64)], scale: f64) -> Self {
        self.terms.extend(terms.iter().map(|&(v, c)| (v, c * scale)));
        self
    }
}

/// A row of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub set: ConstraintSet,
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
    /// Set once slack variables have been attached.
    pub elastic: bool,
}

impl Row {
    /// Left-hand side evaluated at `values`.
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values[var.value()])
            .sum()
    }
}

/// All rows of a model, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ConstraintStore {
    rows: Vec<Row>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, spec: RowSpec) -> RowId {
        let id = RowId(self.rows.len());
        self.rows.push(Row {
            id,
            set: spec.set,
            name: spec.name,
            terms: spec.terms,
            sense: spec.sense,
            rhs: spec.rhs,
            elastic: false,
        });
        id
    }

    pub fn extend(&mut self, specs: Vec<RowSpec>) -> usize {
        let count = specs.len();
        for spec in specs {
            self.push(spec);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: RowId) -> &Row {
        &self.rows[id.0]
    }

    pub fn get_mut(&mut self, id: RowId) -> &mut Row {
        &mut self.rows[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn in_set(&self, set: ConstraintSet) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(move |row| row.set == set)
    }

    pub fn ids_in_set(&self, set: ConstraintSet) -> Vec<RowId> {
        self.in_set(set).map(|row| row.id).collect()
    }

    /// Sets with at least one row.
    pub fn sets(&self) -> BTreeSet<ConstraintSet> {
        self.rows.iter().map(|row| row.set).collect()
    }

    pub fn find(&self, set: ConstraintSet, name: &str) -> Option<&Row> {
        self.in_set(set).find(|row| row.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_names_round_trip() {
        for set in ConstraintSet::ALL {
            assert_eq!(set.as_str().parse::<ConstraintSet>().unwrap(), set);
        }
        assert!("nonsense".parse::<ConstraintSet>().is_err());
        assert_eq!(
            serde_json::to_string(&ConstraintSet::JointRampingRaiseReg).unwrap(),
            "\"joint_ramping_raise_reg\""
        );
    }

    #[test]
    fn test_store_tracks_sets() {
        let mut store = ConstraintStore::new();
        let a = store.push(
            RowSpec::new(ConstraintSet::Demand, "NSW", Sense::Equal, 10.0).term(VarId::new(0), 1.0),
        );
        store.push(RowSpec::new(ConstraintSet::RampUp, "A", Sense::LessEqual, 5.0).term(VarId::new(0), 1.0));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a).name, "NSW");
        assert_eq!(store.ids_in_set(ConstraintSet::Demand), vec![a]);
        assert!(store.sets().contains(&ConstraintSet::RampUp));
        assert!(!store.sets().contains(&ConstraintSet::Fcas));
        assert_eq!(store.get(a).lhs(&[4.0]), 4.0);
    }
}
