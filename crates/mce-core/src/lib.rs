//! # mce-core: Market Data Model
//!
//! Typed records describing one dispatch interval of an energy-only plus
//! frequency-control (FCAS) co-optimised market.
//!
//! ## Design Philosophy
//!
//! Every table the clearing engine consumes is an explicit record keyed by
//! string identifiers:
//! - **Units**: generators or loads with a region, loss factor and ramp rates
//! - **Offers**: per (unit, service) price and volume bands
//! - **Interconnectors**: directed links between regions with a loss model,
//!   optionally split into parallel paths of which at most one carries flow
//! - **Constraints**: generic constraints, regional demand, FCAS requirements
//!
//! Column-level invariants (monotonic price bands, unique keys, increasing loss
//! break points) are checked once by [`MarketInputs::validate`], before any
//! optimisation model is built.
//!
//! ## Quick Start
//!
//! ```rust
//! use mce_core::*;
//!
//! let inputs = MarketInputsBuilder::new()
//!     .region("NSW")
//!     .unit(UnitInfo::generator("A", "NSW"))
//!     .offer(Offer::energy("A", vec![50.0, 60.0], vec![20.0, 20.0]))
//!     .demand(RegionalDemand::new("NSW", 30.0))
//!     .build()
//!     .expect("valid inputs");
//!
//! assert_eq!(inputs.units.len(), 1);
//! ```
//!
//! ## ID System
//!
//! Identifiers are newtypes around `String` so a region can't be passed where
//! a unit is expected. They serialize transparently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod constraints;
pub mod error;
pub mod inputs;
pub mod network;
pub mod units;

pub use constraints::{
    FcasRequirement, GenericConstraint, InterconnectorCoefficient, RegionCoefficient,
    RegionalDemand, UnitCoefficient, ViolationCosts,
};
pub use error::{ValidationError, ValidationResult};
pub use inputs::{MarketInputs, MarketInputsBuilder};
pub use network::{Interconnector, LinkKey, LossBreakpoint, LossCurve, LossModel};
pub use units::{
    FastStartProfile, FcasTrapezium, Offer, RampRates, UnitInfo, UnitLimit,
};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[inline]
            pub fn new(value: impl Into<String>) -> Self {
                $name(value.into())
            }
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                $name(value)
            }
        }
    };
}

string_id!(
    /// Market region (price node), e.g. `NSW1`.
    RegionId
);
string_id!(
    /// Dispatchable unit (generator or scheduled load).
    UnitId
);
string_id!(
    /// Interconnector between two regions.
    InterconnectorId
);
string_id!(
    /// One of several parallel paths of an interconnector.
    LinkId
);

/// Market services a unit can be dispatched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Energy,
    RaiseReg,
    LowerReg,
    #[serde(rename = "raise_1s")]
    Raise1s,
    #[serde(rename = "raise_6s")]
    Raise6s,
    #[serde(rename = "raise_60s")]
    Raise60s,
    #[serde(rename = "raise_5min")]
    Raise5min,
    #[serde(rename = "lower_1s")]
    Lower1s,
    #[serde(rename = "lower_6s")]
    Lower6s,
    #[serde(rename = "lower_60s")]
    Lower60s,
    #[serde(rename = "lower_5min")]
    Lower5min,
}

impl Service {
    pub const ALL: [Service; 11] = [
        Service::Energy,
        Service::RaiseReg,
        Service::LowerReg,
        Service::Raise1s,
        Service::Raise6s,
        Service::Raise60s,
        Service::Raise5min,
        Service::Lower1s,
        Service::Lower6s,
        Service::Lower60s,
        Service::Lower5min,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Energy => "energy",
            Service::RaiseReg => "raise_reg",
            Service::LowerReg => "lower_reg",
            Service::Raise1s => "raise_1s",
            Service::Raise6s => "raise_6s",
            Service::Raise60s => "raise_60s",
            Service::Raise5min => "raise_5min",
            Service::Lower1s => "lower_1s",
            Service::Lower6s => "lower_6s",
            Service::Lower60s => "lower_60s",
            Service::Lower5min => "lower_5min",
        }
    }

    /// Any frequency control service.
    pub fn is_fcas(&self) -> bool {
        !matches!(self, Service::Energy)
    }

    pub fn is_regulation(&self) -> bool {
        matches!(self, Service::RaiseReg | Service::LowerReg)
    }

    /// Contingency services are the FCAS services that aren't regulation.
    pub fn is_contingency(&self) -> bool {
        self.is_fcas() && !self.is_regulation()
    }

    pub fn is_raise(&self) -> bool {
        matches!(
            self,
            Service::RaiseReg
                | Service::Raise1s
                | Service::Raise6s
                | Service::Raise60s
                | Service::Raise5min
        )
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .iter()
            .copied()
            .find(|service| service.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown service '{}'", s))
    }
}

/// Whether a unit injects (generator) or withdraws (load) energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchType {
    Generator,
    Load,
}

impl DispatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchType::Generator => "generator",
            DispatchType::Load => "load",
        }
    }

    /// Sign of the unit's energy dispatch in a regional balance.
    pub fn balance_sign(&self) -> f64 {
        match self {
            DispatchType::Generator => 1.0,
            DispatchType::Load => -1.0,
        }
    }
}

impl fmt::Display for DispatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sense {
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "=")]
    Equal,
}

impl Sense {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sense::LessEqual => "<=",
            Sense::GreaterEqual => ">=",
            Sense::Equal => "=",
        }
    }

    /// Signed amount by which `lhs` breaks a row with this sense and `rhs`.
    ///
    /// Zero when satisfied; positive when `lhs` sits on the wrong side.
    pub fn violation(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Sense::LessEqual => (lhs - rhs).max(0.0),
            Sense::GreaterEqual => (rhs - lhs).max(0.0),
            Sense::Equal => (lhs - rhs).abs(),
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sense {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<=" => Ok(Sense::LessEqual),
            ">=" => Ok(Sense::GreaterEqual),
            "=" | "==" => Ok(Sense::Equal),
            other => Err(format!("unknown constraint sense '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_roundtrips_through_str() {
        for service in Service::ALL {
            let parsed: Service = service.as_str().parse().unwrap();
            assert_eq!(parsed, service);
        }
        assert!("raise_7s".parse::<Service>().is_err());
    }

    #[test]
    fn service_classification() {
        assert!(!Service::Energy.is_fcas());
        assert!(Service::RaiseReg.is_regulation());
        assert!(Service::Lower60s.is_contingency());
        assert!(!Service::Lower60s.is_raise());
        assert!(Service::Raise5min.is_raise());
    }

    #[test]
    fn service_serializes_snake_case() {
        let json = serde_json::to_string(&Service::Raise6s).unwrap();
        assert_eq!(json, "\"raise_6s\"");
        let json = serde_json::to_string(&Service::LowerReg).unwrap();
        assert_eq!(json, "\"lower_reg\"");
    }

    #[test]
    fn sense_violation() {
        assert_eq!(Sense::LessEqual.violation(5.0, 10.0), 0.0);
        assert_eq!(Sense::LessEqual.violation(12.0, 10.0), 2.0);
        assert_eq!(Sense::GreaterEqual.violation(7.0, 10.0), 3.0);
        assert_eq!(Sense::Equal.violation(9.0, 10.0), 1.0);
        assert_eq!(">=".parse::<Sense>().unwrap(), Sense::GreaterEqual);
    }

    #[test]
    fn ids_display_and_serialize_transparently() {
        let unit = UnitId::new("BW01");
        assert_eq!(unit.to_string(), "BW01");
        assert_eq!(serde_json::to_string(&unit).unwrap(), "\"BW01\"");
        assert_eq!(RegionId::from("NSW1").as_str(), "NSW1");
    }
}
