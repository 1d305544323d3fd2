//! Unit-level records: reference data, offers, limits, FCAS envelopes and
//! fast-start inflexibility profiles.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ValidationError, ValidationResult};
use crate::{DispatchType, RegionId, Service, UnitId};

/// Ramp rates in MW per hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RampRates {
    pub up_mw_per_h: f64,
    pub down_mw_per_h: f64,
}

impl RampRates {
    pub fn new(up_mw_per_h: f64, down_mw_per_h: f64) -> Self {
        Self {
            up_mw_per_h,
            down_mw_per_h,
        }
    }

    /// Element-wise minimum, used to combine bid and telemetered rates.
    pub fn min(self, other: RampRates) -> RampRates {
        RampRates {
            up_mw_per_h: self.up_mw_per_h.min(other.up_mw_per_h),
            down_mw_per_h: self.down_mw_per_h.min(other.down_mw_per_h),
        }
    }
}

/// Reference data for a dispatchable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: UnitId,
    pub region: RegionId,
    pub dispatch_type: DispatchType,
    /// Combined marginal and distribution loss factor, conventionally near 1.0.
    #[serde(default = "default_loss_factor")]
    pub loss_factor: f64,
    /// Energy output at the start of the interval (MW).
    #[serde(default)]
    pub initial_output_mw: f64,
    /// Ramp rates offered in the unit's bid.
    #[serde(default)]
    pub ramp_rates: Option<RampRates>,
    /// Telemetered ramp rates; the binding rate is the lower of bid and SCADA.
    #[serde(default)]
    pub scada_ramp_rates: Option<RampRates>,
}

fn default_loss_factor() -> f64 {
    1.0
}

impl UnitInfo {
    pub fn new(id: impl Into<UnitId>, region: impl Into<RegionId>, dispatch_type: DispatchType) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            dispatch_type,
            loss_factor: default_loss_factor(),
            initial_output_mw: 0.0,
            ramp_rates: None,
            scada_ramp_rates: None,
        }
    }

    pub fn generator(id: impl Into<UnitId>, region: impl Into<RegionId>) -> Self {
        Self::new(id, region, DispatchType::Generator)
    }

    pub fn load(id: impl Into<UnitId>, region: impl Into<RegionId>) -> Self {
        Self::new(id, region, DispatchType::Load)
    }

    pub fn with_loss_factor(mut self, loss_factor: f64) -> Self {
        self.loss_factor = loss_factor;
        self
    }

    pub fn with_initial_output(mut self, mw: f64) -> Self {
        self.initial_output_mw = mw;
        self
    }

    pub fn with_ramp_rates(mut self, up_mw_per_h: f64, down_mw_per_h: f64) -> Self {
        self.ramp_rates = Some(RampRates::new(up_mw_per_h, down_mw_per_h));
        self
    }

    pub fn with_scada_ramp_rates(mut self, up_mw_per_h: f64, down_mw_per_h: f64) -> Self {
        self.scada_ramp_rates = Some(RampRates::new(up_mw_per_h, down_mw_per_h));
        self
    }

    /// Binding ramp rates: bid rates capped by SCADA rates when both exist.
    pub fn effective_ramp_rates(&self) -> Option<RampRates> {
        match (self.ramp_rates, self.scada_ramp_rates) {
            (Some(bid), Some(scada)) => Some(bid.min(scada)),
            (Some(bid), None) => Some(bid),
            (None, Some(scada)) => Some(scada),
            (None, None) => None,
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if !(self.loss_factor.is_finite() && self.loss_factor > 0.0) {
            return Err(ValidationError::InvalidLossFactor {
                unit: self.id.clone(),
                value: self.loss_factor,
            });
        }
        ensure_finite(|| format!("unit {} initial output", self.id), self.initial_output_mw)?;
        for rates in [self.ramp_rates, self.scada_ramp_rates].into_iter().flatten() {
            for value in [rates.up_mw_per_h, rates.down_mw_per_h] {
                ensure_finite(|| format!("unit {} ramp rate", self.id), value)?;
                if value < 0.0 {
                    return Err(ValidationError::Other(format!(
                        "unit {}: ramp rate {} must be non-negative",
                        self.id, value
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Price and volume bands offered by one unit for one service.
///
/// Band `i` offers `volumes[i]` MW at `prices[i]` $/MWh.
///
/// A bidirectional unit offers each side separately; `dispatch_type` picks
/// the side and defaults to the generator side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub unit: UnitId,
    #[serde(default)]
    pub dispatch_type: Option<DispatchType>,
    pub service: Service,
    pub prices: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl Offer {
    pub fn new(unit: impl Into<UnitId>, service: Service, prices: Vec<f64>, volumes: Vec<f64>) -> Self {
        Self {
            unit: unit.into(),
            dispatch_type: None,
            service,
            prices,
            volumes,
        }
    }

    pub fn with_dispatch_type(mut self, dispatch_type: DispatchType) -> Self {
        self.dispatch_type = Some(dispatch_type);
        self
    }

    pub fn energy(unit: impl Into<UnitId>, prices: Vec<f64>, volumes: Vec<f64>) -> Self {
        Self::new(unit, Service::Energy, prices, volumes)
    }

    pub fn band_count(&self) -> usize {
        self.prices.len()
    }

    /// Iterate `(band, price, volume)` tranches.
    pub fn tranches(&self) -> impl Iterator<Item = (usize, f64, f64)> + '_ {
        self.prices
            .iter()
            .zip(&self.volumes)
            .enumerate()
            .map(|(band, (&price, &volume))| (band, price, volume))
    }

    pub fn total_volume(&self) -> f64 {
        self.volumes.iter().sum()
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.prices.len() != self.volumes.len() {
            return Err(ValidationError::BandCountMismatch {
                unit: self.unit.clone(),
                service: self.service,
                prices: self.prices.len(),
                volumes: self.volumes.len(),
            });
        }
        let mut previous: Option<f64> = None;
        for (band, price, volume) in self.tranches() {
            ensure_finite(|| format!("offer {}/{} price band {}", self.unit, self.service, band), price)?;
            ensure_finite(|| format!("offer {}/{} volume band {}", self.unit, self.service, band), volume)?;
            if volume < 0.0 {
                return Err(ValidationError::NegativeVolume {
                    unit: self.unit.clone(),
                    service: self.service,
                    band,
                    volume,
                });
            }
            if let Some(prev) = previous {
                if price < prev {
                    return Err(ValidationError::NonMonotonicPrices {
                        unit: self.unit.clone(),
                        service: self.service,
                        band,
                        price,
                        previous: prev,
                    });
                }
            }
            previous = Some(price);
        }
        Ok(())
    }
}

/// Upper limit on a unit's energy dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitLimit {
    pub unit: UnitId,
    pub capacity_mw: f64,
}

impl UnitLimit {
    pub fn new(unit: impl Into<UnitId>, capacity_mw: f64) -> Self {
        Self {
            unit: unit.into(),
            capacity_mw,
        }
    }
}

/// Envelope of deliverable FCAS as a function of energy output.
///
/// ```text
///   fcas
///    ^       low_break_point   high_break_point
///    |             ______________
///    |            /              \
///    |           /                \
///    +----------+------------------+-------> energy
///        enablement_min      enablement_max
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcasTrapezium {
    pub unit: UnitId,
    pub service: Service,
    pub max_availability: f64,
    pub enablement_min: f64,
    pub low_break_point: f64,
    pub high_break_point: f64,
    pub enablement_max: f64,
}

impl FcasTrapezium {
    pub fn new(
        unit: impl Into<UnitId>,
        service: Service,
        max_availability: f64,
        enablement_min: f64,
        low_break_point: f64,
        high_break_point: f64,
        enablement_max: f64,
    ) -> Self {
        Self {
            unit: unit.into(),
            service,
            max_availability,
            enablement_min,
            low_break_point,
            high_break_point,
            enablement_max,
        }
    }

    /// Coefficient of the FCAS variable on the upper slope.
    pub fn upper_slope_coefficient(&self) -> f64 {
        if self.max_availability > 0.0 {
            (self.enablement_max - self.high_break_point) / self.max_availability
        } else {
            0.0
        }
    }

    /// Coefficient of the FCAS variable on the lower slope.
    pub fn lower_slope_coefficient(&self) -> f64 {
        if self.max_availability > 0.0 {
            (self.low_break_point - self.enablement_min) / self.max_availability
        } else {
            0.0
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let invalid = |reason: String| ValidationError::InvalidTrapezium {
            unit: self.unit.clone(),
            service: self.service,
            reason,
        };
        if !self.service.is_fcas() {
            return Err(invalid("trapezium must describe an FCAS service".into()));
        }
        for value in [
            self.max_availability,
            self.enablement_min,
            self.low_break_point,
            self.high_break_point,
            self.enablement_max,
        ] {
            ensure_finite(|| format!("FCAS trapezium {}/{}", self.unit, self.service), value)?;
        }
        if self.max_availability < 0.0 {
            return Err(invalid(format!(
                "max availability {} is negative",
                self.max_availability
            )));
        }
        let ordered = self.enablement_min <= self.low_break_point
            && self.low_break_point <= self.high_break_point
            && self.high_break_point <= self.enablement_max;
        if !ordered {
            return Err(invalid(format!(
                "corner points out of order ({}, {}, {}, {})",
                self.enablement_min, self.low_break_point, self.high_break_point, self.enablement_max
            )));
        }
        Ok(())
    }
}

/// Fast-start inflexibility state at the start of the interval.
///
/// Modes: 0 uncommitted, 1 synchronising, 2 ramping to minimum loading,
/// 3 at or above minimum loading, 4 ramping down to shutdown. Lengths and
/// times are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastStartProfile {
    pub unit: UnitId,
    pub current_mode: u8,
    #[serde(default)]
    pub time_in_current_mode: f64,
    pub mode_one_length: f64,
    pub mode_two_length: f64,
    pub mode_three_length: f64,
    pub mode_four_length: f64,
    pub min_loading_mw: f64,
    /// Minutes since the unit left mode two, when that happened recently.
    #[serde(default)]
    pub time_since_end_of_mode_two: Option<f64>,
}

impl FastStartProfile {
    pub fn new(unit: impl Into<UnitId>, current_mode: u8, min_loading_mw: f64) -> Self {
        Self {
            unit: unit.into(),
            current_mode,
            time_in_current_mode: 0.0,
            mode_one_length: 0.0,
            mode_two_length: 0.0,
            mode_three_length: 0.0,
            mode_four_length: 0.0,
            min_loading_mw,
            time_since_end_of_mode_two: None,
        }
    }

    pub fn with_time_in_current_mode(mut self, minutes: f64) -> Self {
        self.time_in_current_mode = minutes;
        self
    }

    pub fn with_mode_lengths(mut self, one: f64, two: f64, three: f64, four: f64) -> Self {
        self.mode_one_length = one;
        self.mode_two_length = two;
        self.mode_three_length = three;
        self.mode_four_length = four;
        self
    }

    pub fn validate(&self) -> ValidationResult<()> {
        let invalid = |reason: String| ValidationError::InvalidFastStartProfile {
            unit: self.unit.clone(),
            reason,
        };
        if self.current_mode > 4 {
            return Err(invalid(format!("mode {} is outside 0..=4", self.current_mode)));
        }
        for value in [
            self.time_in_current_mode,
            self.mode_one_length,
            self.mode_two_length,
            self.mode_three_length,
            self.mode_four_length,
            self.min_loading_mw,
        ] {
            ensure_finite(|| format!("fast-start profile {}", self.unit), value)?;
            if value < 0.0 {
                return Err(invalid(format!("negative value {}", value)));
            }
        }
        Ok(())
    }
}
