//! Fast-start inflexibility profiles.
//!
//! A fast-start unit follows a fixed trajectory once committed:
//!
//! | Mode | Meaning | Output at end of interval |
//! |------|---------|---------------------------|
//! | 0 | uncommitted | 0 |
//! | 1 | synchronising | 0 |
//! | 2 | ramping to minimum loading | `t / T2 · min_loading` |
//! | 3 | free to dispatch | `≥ min_loading` |
//! | 4 | ramping to shutdown | `min_loading · (1 − t / T4)` |
//!
//! The first MIP is solved without profile rows. Mode-0 units it dispatches
//! are committed and every profile is advanced through the interval to the
//! mode it ends in; the model is then rebuilt with the resulting bounds.

use std::collections::{BTreeSet, HashMap};

use mce_core::{FastStartProfile, UnitId};
use serde::{Deserialize, Serialize};

use crate::constraints::ramp::RampLimit;

/// Where a profile ends up at the end of the interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastStartTarget {
    pub unit: UnitId,
    pub end_mode: u8,
    pub time_in_end_mode: f64,
    pub mode_two_length: f64,
    pub mode_four_length: f64,
    pub min_loading_mw: f64,
    /// Minutes spent out of mode two before the end of the interval, when
    /// the unit left mode two inside it (or the caller supplied one).
    pub time_since_end_of_mode_two: Option<f64>,
}

impl FastStartTarget {
    /// Lower bound on energy dispatch, if any.
    pub fn min_output(&self) -> Option<f64> {
        match self.end_mode {
            0 | 1 => None,
            2 => Some(self.mode_two_target()),
            3 => Some(self.min_loading_mw),
            _ => Some(self.mode_four_target()),
        }
    }

    /// Upper bound on energy dispatch, if any.
    pub fn max_output(&self) -> Option<f64> {
        match self.end_mode {
            0 | 1 => Some(0.0),
            2 => Some(self.mode_two_target()),
            3 => None,
            _ => Some(self.mode_four_target()),
        }
    }

    /// Ramp rows are replaced by the profile while it is still starting up.
    pub fn suppresses_ramp_rows(&self) -> bool {
        self.end_mode <= 2
    }

    fn mode_two_target(&self) -> f64 {
        if self.mode_two_length > 0.0 {
            self.time_in_end_mode / self.mode_two_length * self.min_loading_mw
        } else {
            self.min_loading_mw
        }
    }

    fn mode_four_target(&self) -> f64 {
        if self.mode_four_length > 0.0 {
            self.min_loading_mw * (1.0 - self.time_in_end_mode / self.mode_four_length)
        } else {
            0.0
        }
    }
}

/// Progress of the fast-start loop, which decides the ramp and profile rows
/// a model gets.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FastStartStage {
    /// No fast-start units.
    #[default]
    Inactive,
    /// First solve: no profile rows, ramp rows dropped for units starting
    /// in modes 0 to 2.
    CommitmentFree,
    /// Profile rows from the advanced profiles.
    Constrained(Vec<FastStartTarget>),
}

impl FastStartStage {
    pub fn initial(profiles: &[FastStartProfile]) -> Self {
        if profiles.is_empty() {
            FastStartStage::Inactive
        } else {
            FastStartStage::CommitmentFree
        }
    }

    pub fn targets(&self) -> &[FastStartTarget] {
        match self {
            FastStartStage::Constrained(targets) => targets,
            _ => &[],
        }
    }
}

/// Loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastStartConfig {
    /// Constrained re-solves before the loop gives up and keeps the last result.
    pub max_iterations: usize,
}

impl Default for FastStartConfig {
    fn default() -> Self {
        Self { max_iterations: 5 }
    }
}

/// Advance a profile through an interval of `interval_minutes`.
///
/// A mode-0 unit only starts synchronising when `committed`; its time in
/// mode restarts at zero.
pub fn advance_profile(profile: &FastStartProfile, committed: bool, interval_minutes: f64) -> FastStartTarget {
    let mut mode = profile.current_mode;
    let mut time_in_mode = profile.time_in_current_mode;
    let mut time_left = interval_minutes;
    let mut time_since_end_of_mode_two = profile.time_since_end_of_mode_two;

    if mode == 0 && committed {
        mode = 1;
        time_in_mode = 0.0;
    }
    if mode == 1 && profile.mode_one_length - time_in_mode < time_left {
        time_left -= profile.mode_one_length - time_in_mode;
        time_in_mode = 0.0;
        mode = 2;
    }
    if mode == 2 && profile.mode_two_length - time_in_mode < time_left {
        time_left -= profile.mode_two_length - time_in_mode;
        time_in_mode = 0.0;
        mode = 3;
        time_since_end_of_mode_two = Some(time_left);
    }
    if mode == 3 && profile.mode_three_length - time_in_mode < time_left {
        time_left -= profile.mode_three_length - time_in_mode;
        time_in_mode = 0.0;
        mode = 4;
    }

    let time_in_end_mode = match mode {
        0 => 0.0,
        4 => (time_in_mode + time_left).min(profile.mode_four_length),
        _ => time_in_mode + time_left,
    };

    FastStartTarget {
        unit: profile.unit.clone(),
        end_mode: mode,
        time_in_end_mode,
        mode_two_length: profile.mode_two_length,
        mode_four_length: profile.mode_four_length,
        min_loading_mw: profile.min_loading_mw,
        time_since_end_of_mode_two,
    }
}

/// Units committed after a solve: everything in `previous` plus every mode-0
/// unit with positive energy dispatch. The set never shrinks.
pub fn commitment_set(
    profiles: &[FastStartProfile],
    energy_dispatch: &HashMap<UnitId, f64>,
    previous: &BTreeSet<UnitId>,
) -> BTreeSet<UnitId> {
    let mut committed = previous.clone();
    for profile in profiles.iter().filter(|p| p.current_mode == 0) {
        let dispatch = energy_dispatch.get(&profile.unit).copied().unwrap_or(0.0);
        if dispatch > 1e-6 {
            committed.insert(profile.unit.clone());
        }
    }
    committed
}

/// Advance every profile given the committed set.
pub fn targets_for(
    profiles: &[FastStartProfile],
    committed: &BTreeSet<UnitId>,
    interval_minutes: f64,
) -> Vec<FastStartTarget> {
    profiles
        .iter()
        .map(|p| advance_profile(p, committed.contains(&p.unit), interval_minutes))
        .collect()
}

/// Apply the fast-start stage to a set of ramp limits.
///
/// Units still on their start-up trajectory lose their ramp rows. Units that
/// left mode two inside the interval get an up rate that lets them reach
/// `min_loading + time_since_mode_two · rate / 60` from their initial output.
pub fn adjust_ramp_limits(
    limits: Vec<RampLimit>,
    stage: &FastStartStage,
    profiles: &[FastStartProfile],
    interval_minutes: f64,
) -> Vec<RampLimit> {
    match stage {
        FastStartStage::Inactive => limits,
        FastStartStage::CommitmentFree => {
            let starting: BTreeSet<&UnitId> = profiles
                .iter()
                .filter(|p| p.current_mode <= 2)
                .map(|p| &p.unit)
                .collect();
            limits.into_iter().filter(|l| !starting.contains(&l.unit)).collect()
        }
        FastStartStage::Constrained(targets) => limits
            .into_iter()
            .filter_map(|mut limit| {
                let Some(target) = targets.iter().find(|t| t.unit == limit.unit) else {
                    return Some(limit);
                };
                if target.suppresses_ramp_rows() {
                    return None;
                }
                if let Some(since) = target.time_since_end_of_mode_two {
                    let ramp_max = target.min_loading_mw + since * limit.up_mw_per_h / 60.0;
                    limit.up_mw_per_h = (ramp_max - limit.initial_output_mw) * 60.0 / interval_minutes;
                }
                Some(limit)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mce_core::DispatchType;

    fn profile(mode: u8, time_in_mode: f64) -> FastStartProfile {
        FastStartProfile::new("F", mode, 40.0)
            .with_time_in_current_mode(time_in_mode)
            .with_mode_lengths(3.0, 5.0, 10.0, 5.0)
    }

    #[test]
    fn test_uncommitted_unit_stays_off() {
        let target = advance_profile(&profile(0, 7.0), false, 5.0);
        assert_eq!(target.end_mode, 0);
        assert_eq!(target.time_in_end_mode, 0.0);
        assert_eq!(target.max_output(), Some(0.0));
        assert_eq!(target.min_output(), None);
    }

    #[test]
    fn test_committed_unit_reaches_mode_two() {
        // 3 min synchronising, 2 min into the 5 min ramp
        let target = advance_profile(&profile(0, 0.0), true, 5.0);
        assert_eq!(target.end_mode, 2);
        assert!((target.time_in_end_mode - 2.0).abs() < 1e-9);
        assert!((target.min_output().unwrap() - 16.0).abs() < 1e-9);
        assert_eq!(target.min_output(), target.max_output());
    }

    #[test]
    fn test_mode_two_to_three_records_time_since() {
        let target = advance_profile(&profile(2, 4.0), false, 5.0);
        assert_eq!(target.end_mode, 3);
        assert!((target.time_since_end_of_mode_two.unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(target.min_output(), Some(40.0));
        assert_eq!(target.max_output(), None);
    }

    #[test]
    fn test_mode_four_is_clipped() {
        let target = advance_profile(&profile(4, 3.0), false, 5.0);
        assert_eq!(target.end_mode, 4);
        assert_eq!(target.time_in_end_mode, 5.0);
        assert!((target.max_output().unwrap() - 0.0).abs() < 1e-9);

        let target = advance_profile(&profile(3, 8.0), false, 5.0);
        assert_eq!(target.end_mode, 4);
        assert!((target.time_in_end_mode - 3.0).abs() < 1e-9);
        assert!((target.min_output().unwrap() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_commitment_set_is_monotonic() {
        let profiles = vec![profile(0, 0.0), FastStartProfile::new("G", 0, 10.0)];
        let previous: BTreeSet<UnitId> = [UnitId::new("G")].into_iter().collect();
        let dispatch: HashMap<UnitId, f64> = [(UnitId::new("F"), 12.0), (UnitId::new("G"), 0.0)]
            .into_iter()
            .collect();
        let committed = commitment_set(&profiles, &dispatch, &previous);
        assert_eq!(committed.len(), 2);
    }

    #[test]
    fn test_ramp_adjustment() {
        let limit = RampLimit {
            unit: UnitId::new("F"),
            dispatch_type: DispatchType::Generator,
            initial_output_mw: 30.0,
            up_mw_per_h: 120.0,
            down_mw_per_h: 120.0,
        };
        let profiles = vec![profile(2, 0.0)];

        let first = adjust_ramp_limits(vec![limit.clone()], &FastStartStage::CommitmentFree, &profiles, 5.0);
        assert!(first.is_empty());

        let target = advance_profile(&profile(2, 4.0), false, 5.0);
        let stage = FastStartStage::Constrained(vec![target]);
        let adjusted = adjust_ramp_limits(vec![limit], &stage, &profiles, 5.0);
        // reach 40 + 4 * 2 = 48 from 30 in 5 minutes
        assert!((adjusted[0].up_mw_per_h - 216.0).abs() < 1e-9);
    }
}
