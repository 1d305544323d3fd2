//! Validation errors for market inputs.
//!
//! Every variant is raised before an optimisation model is constructed and is
//! never retried; the caller has to fix the offending table.

use thiserror::Error;

use crate::{InterconnectorId, RegionId, Service, UnitId};

/// Malformed or inconsistent market input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Band prices must not decrease with band index.
    #[error("offer {unit}/{service}: price band {band} ({price}) is below the previous band ({previous})")]
    NonMonotonicPrices {
        unit: UnitId,
        service: Service,
        band: usize,
        price: f64,
        previous: f64,
    },

    /// Price and volume vectors of an offer differ in length.
    #[error("offer {unit}/{service}: {prices} price bands but {volumes} volume bands")]
    BandCountMismatch {
        unit: UnitId,
        service: Service,
        prices: usize,
        volumes: usize,
    },

    #[error("offer {unit}/{service}: band {band} has negative volume {volume}")]
    NegativeVolume {
        unit: UnitId,
        service: Service,
        band: usize,
        volume: f64,
    },

    /// NaN or infinite value where a finite number is required.
    #[error("{context}: value {value} is not finite")]
    NonFinite { context: String, value: f64 },

    #[error("loss model for {interconnector}: break points must be strictly increasing ({previous} then {next})")]
    NonIncreasingBreakpoints {
        interconnector: InterconnectorId,
        previous: f64,
        next: f64,
    },

    #[error("loss model for {interconnector}: needs at least two break points, got {count}")]
    TooFewBreakpoints {
        interconnector: InterconnectorId,
        count: usize,
    },

    #[error("unit {unit}: loss factor {value} must be positive")]
    InvalidLossFactor { unit: UnitId, value: f64 },

    #[error("loss model for {interconnector}: from-region loss share {value} must lie in [0, 1]")]
    InvalidLossShare {
        interconnector: InterconnectorId,
        value: f64,
    },

    #[error("interconnector {interconnector}: {reason}")]
    InvalidInterconnector {
        interconnector: InterconnectorId,
        reason: String,
    },

    #[error("FCAS trapezium {unit}/{service}: {reason}")]
    InvalidTrapezium {
        unit: UnitId,
        service: Service,
        reason: String,
    },

    #[error("fast-start profile {unit}: {reason}")]
    InvalidFastStartProfile { unit: UnitId, reason: String },

    #[error("{table} references unknown unit {unit}")]
    UnknownUnit { table: &'static str, unit: UnitId },

    #[error("{table} references unknown region {region}")]
    UnknownRegion {
        table: &'static str,
        region: RegionId,
    },

    #[error("{table} references unknown interconnector {interconnector}")]
    UnknownInterconnector {
        table: &'static str,
        interconnector: InterconnectorId,
    },

    #[error("{table} references unknown constraint '{name}'")]
    UnknownConstraint { table: &'static str, name: String },

    #[error("{table}: duplicate key {key}")]
    DuplicateKey { table: &'static str, key: String },

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Reject NaN and infinite values.
pub(crate) fn ensure_finite(context: impl FnOnce() -> String, value: f64) -> ValidationResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            context: context(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::NonMonotonicPrices {
            unit: UnitId::new("A"),
            service: Service::Energy,
            band: 2,
            price: 40.0,
            previous: 60.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("A/energy"));
        assert!(msg.contains("band 2"));
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite(|| "x".into(), 1.0).is_ok());
        let err = ensure_finite(|| "demand NSW".into(), f64::NAN).unwrap_err();
        assert!(matches!(err, ValidationError::NonFinite { .. }));
        assert!(err.to_string().starts_with("demand NSW"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ValidationResult<()> {
            Err(ValidationError::Other("test".into()))
        }

        fn outer() -> ValidationResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
