//! CAN controller descriptions and per-device timing queries.
//!
//! A [`Device`] carries the register constraints of each phase it supports. The query
//! methods run a [`TimingSearch`] against the matching constraint using the device clock.

pub mod catalog;

use std::borrow::Cow;
use std::collections::HashSet;

use strum::IntoEnumIterator;
use tracing::debug;

use crate::error::Error;
use crate::timing::{BitTimingSolution, CanPhase, TimingConstraint, TimingSearch};
use crate::Result;

pub use catalog::{devices, find_device, CAN_BITRATES_BPS, CAN_FD_BITRATES_BPS, DEVICES};

/// Search window around a sample point target used by [`Device::timing`], in percent.
pub const DEFAULT_SEARCH_WINDOW_PERCENT: f64 = 1.0;

/// Timing constraints per phase. A device has at most one entry per phase.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseConstraints {
    pub arbitration: Option<TimingConstraint>,
    pub data: Option<TimingConstraint>,
}

impl PhaseConstraints {
    pub fn get(&self, phase: CanPhase) -> Option<&TimingConstraint> {
        match phase {
            CanPhase::Arbitration => self.arbitration.as_ref(),
            CanPhase::Data => self.data.as_ref(),
        }
    }
}

/// Offsets between a timing value and what has to be written into the register,
/// e.g. `-1` for controllers storing `TSEG1 - 1`. Only used for presentation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterOffsets {
    pub tseg1: i32,
    pub tseg2: i32,
    pub sjw: i32,
    pub prescaler: i32,
}

/// Raw register values for a [`BitTimingSolution`] after applying [`RegisterOffsets`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterValues {
    pub tseg1: i64,
    pub tseg2: i64,
    pub sjw: i64,
    pub prescaler: i64,
}

/// A CAN protocol controller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Device {
    pub name: Cow<'static, str>,
    pub comment: Cow<'static, str>,
    /// Input clock frequency in Hz, before the prescaler
    pub input_clock_hz: u32,
    /// Maximal arbitration phase bit rate in bits per second
    pub max_bitrate_bps: u32,
    /// Maximal data phase bit rate in bits per second, 0 without CAN-FD support
    pub max_fd_bitrate_bps: u32,
    pub constraints: PhaseConstraints,
    pub register_offsets: RegisterOffsets,
}

impl Device {
    pub fn constraint(&self, phase: CanPhase) -> Option<&TimingConstraint> {
        self.constraints.get(phase)
    }

    /// Phases this device has timing constraints for.
    pub fn phases(&self) -> impl Iterator<Item = CanPhase> + '_ {
        CanPhase::iter().filter(|phase| self.constraint(*phase).is_some())
    }

    pub fn supports_fd(&self) -> bool {
        self.max_fd_bitrate_bps > 0 && self.constraints.data.is_some()
    }

    pub fn max_bitrate(&self, phase: CanPhase) -> u32 {
        match phase {
            CanPhase::Arbitration => self.max_bitrate_bps,
            CanPhase::Data => self.max_fd_bitrate_bps,
        }
    }

    /// Standard bit rates the device can run in `phase`.
    pub fn supported_bitrates(&self, phase: CanPhase) -> Vec<u32> {
        if self.constraint(phase).is_none() {
            return vec![];
        }

        let rates = match phase {
            CanPhase::Arbitration => CAN_BITRATES_BPS,
            CanPhase::Data => CAN_FD_BITRATES_BPS,
        };
        let max = self.max_bitrate(phase);
        rates.iter().copied().filter(|rate| *rate <= max).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_clock_hz == 0 {
            return Err(Error::InvalidArgument(format!(
                "{}: input clock must be greater than 0",
                self.name
            )));
        }

        for phase in CanPhase::iter() {
            let Some(constraint) = self.constraint(phase) else {
                continue;
            };
            if constraint.phase != phase {
                return Err(Error::InvalidArgument(format!(
                    "{}: {} constraint stored as {} phase",
                    self.name, constraint.phase, phase
                )));
            }
            constraint.validate()?;
        }
        Ok(())
    }

    /// Search builder for `phase`, preset with the device clock.
    ///
    /// The clock can be overridden, e.g. when the controller is fed by a different oscillator.
    pub fn timing_search(&self, phase: CanPhase) -> Result<TimingSearch> {
        let constraint = self
            .constraint(phase)
            .ok_or_else(|| Error::UnsupportedPhase {
                device: self.name.to_string(),
                phase,
            })?;

        Ok(TimingSearch::new(*constraint).clock_hz(self.input_clock_hz))
    }

    /// All register configurations for `bitrate` in `phase`.
    ///
    /// With `unique` set, configurations sharing the sample point and actual SJW are
    /// collapsed into the first one, see [`dedup_solutions`].
    pub fn timings(
        &self,
        bitrate: u32,
        target_sjw: u32,
        phase: CanPhase,
        unique: bool,
    ) -> Result<Vec<BitTimingSolution>> {
        let timings = self
            .timing_search(phase)?
            .bitrate(bitrate)
            .sjw(target_sjw)
            .run()?;

        if !unique {
            return Ok(timings);
        }

        let total = timings.len();
        let timings = dedup_solutions(timings);
        debug!("{}: {} of {} timings unique", self.name, timings.len(), total);
        Ok(timings)
    }

    /// First unique configuration whose sample point lies strictly within
    /// `search_window_percent` of `sample_point_target`.
    ///
    /// This is the first match in sample point order, not necessarily the closest one.
    pub fn timing(
        &self,
        bitrate: u32,
        sample_point_target: f64,
        phase: CanPhase,
        search_window_percent: f64,
        target_sjw: u32,
    ) -> Result<Option<BitTimingSolution>> {
        if !(50.0..=100.0).contains(&sample_point_target) {
            return Err(Error::InvalidArgument(format!(
                "sample point target {} must be in range [50, 100]",
                sample_point_target
            )));
        }
        if !search_window_percent.is_finite() || search_window_percent < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "search window {} must be a non-negative number",
                search_window_percent
            )));
        }

        let min = sample_point_target - search_window_percent;
        let max = sample_point_target + search_window_percent;

        let timing = self
            .timings(bitrate, target_sjw, phase, true)?
            .into_iter()
            .find(|t| min < t.sample_point && t.sample_point < max);

        match &timing {
            Some(t) => debug!(
                "{}: {:.3} % matches target {} % for {} bps",
                self.name, t.sample_point, sample_point_target, bitrate
            ),
            None => debug!(
                "{}: no timing within {} % of {} % for {} bps",
                self.name, search_window_percent, sample_point_target, bitrate
            ),
        }
        Ok(timing)
    }

    /// Values to write into the device registers for `solution`.
    pub fn register_values(&self, solution: &BitTimingSolution) -> RegisterValues {
        let offsets = &self.register_offsets;
        RegisterValues {
            tseg1: register_value(solution.tseg1, offsets.tseg1),
            tseg2: register_value(solution.tseg2, offsets.tseg2),
            sjw: register_value(solution.sjw_actual, offsets.sjw),
            prescaler: register_value(solution.prescaler, offsets.prescaler),
        }
    }
}

/// Removes solutions equal to an earlier one by sample point and actual SJW.
///
/// The first occurrence is kept, so a sorted input stays sorted.
pub fn dedup_solutions(solutions: Vec<BitTimingSolution>) -> Vec<BitTimingSolution> {
    let mut seen = HashSet::new();
    solutions
        .into_iter()
        .filter(|solution| seen.insert(*solution))
        .collect()
}

fn register_value(raw: u32, offset: i32) -> i64 {
    if offset != 0 && raw > 0 {
        raw as i64 + offset as i64
    } else {
        raw as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{sort_solutions, ClosedRange};

    fn test_device(tseg1: ClosedRange, tseg2: ClosedRange) -> Device {
        Device {
            name: Cow::Borrowed("TEST"),
            comment: Cow::Borrowed("10 MHz test controller"),
            input_clock_hz: 10_000_000,
            max_bitrate_bps: 1_000_000,
            max_fd_bitrate_bps: 0,
            constraints: PhaseConstraints {
                arbitration: Some(TimingConstraint {
                    phase: CanPhase::Arbitration,
                    tseg1,
                    tseg2,
                    sjw: ClosedRange::new(1, 4),
                    prescaler: ClosedRange::new(1, 64),
                }),
                data: None,
            },
            register_offsets: RegisterOffsets::default(),
        }
    }

    #[test]
    fn timing_none_between_70_and_80() {
        // Only 1 + 6 + 3 and 1 + 7 + 2 divide 10 MHz into 1 Mbps
        let device = test_device(ClosedRange::new(6, 7), ClosedRange::new(2, 3));

        let timings = device.timings(1_000_000, 3, CanPhase::Arbitration, true).unwrap();
        let sample_points: Vec<_> = timings.iter().map(|t| t.sample_point.round() as u32).collect();
        assert_eq!(sample_points, vec![70, 80]);

        let timing = device
            .timing(1_000_000, 75.0, CanPhase::Arbitration, DEFAULT_SEARCH_WINDOW_PERCENT, 3)
            .unwrap();
        assert_eq!(timing, None);

        let timing = device
            .timing(1_000_000, 80.5, CanPhase::Arbitration, DEFAULT_SEARCH_WINDOW_PERCENT, 3)
            .unwrap()
            .unwrap();
        assert_eq!((timing.tseg1, timing.tseg2), (7, 2));
    }

    #[test]
    fn timing_window_is_exclusive() {
        let device = test_device(ClosedRange::new(6, 7), ClosedRange::new(2, 3));

        let timing = device
            .timing(1_000_000, 71.0, CanPhase::Arbitration, 1.0, 3)
            .unwrap();
        assert_eq!(timing, None);

        let timing = device
            .timing(1_000_000, 71.0, CanPhase::Arbitration, 1.5, 3)
            .unwrap()
            .unwrap();
        assert_eq!(timing.tseg1, 6);
    }

    #[test]
    fn timing_returns_first_match_not_closest() {
        let device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));

        // 60 % and 70 % are both within 10 % of 68 %, the lower one comes first
        let timing = device
            .timing(1_000_000, 68.0, CanPhase::Arbitration, 10.0, 3)
            .unwrap()
            .unwrap();
        assert!((timing.sample_point - 60.0).abs() < 1e-9);
    }

    #[test]
    fn timing_rejects_invalid_target() {
        let device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));

        for target in [49.9, 100.1, f64::NAN] {
            let err = device
                .timing(1_000_000, target, CanPhase::Arbitration, 1.0, 3)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }

        let err = device
            .timing(1_000_000, 80.0, CanPhase::Arbitration, -1.0, 3)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn unsupported_phase() {
        let device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));

        let err = device.timings(1_000_000, 3, CanPhase::Data, true).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedPhase {
                device: "TEST".to_string(),
                phase: CanPhase::Data,
            }
        );

        let err = device
            .timing(1_000_000, 80.0, CanPhase::Data, 1.0, 3)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedPhase { .. }));
    }

    #[test]
    fn unique_collapses_by_sample_point_and_sjw() {
        let device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));

        let all = device.timings(1_000_000, 1, CanPhase::Arbitration, false).unwrap();
        assert_eq!(all.len(), 7);

        // With SJW 1 the 60 % and 80 % rows only differ by prescaler
        let unique = device.timings(1_000_000, 1, CanPhase::Arbitration, true).unwrap();
        assert_eq!(unique.len(), 5);
        let prescalers: Vec<_> = unique.iter().map(|t| t.prescaler).collect();
        assert_eq!(prescalers, vec![1, 2, 1, 2, 1]);

        // Different actual SJW keeps both rows
        let unique = device.timings(1_000_000, 3, CanPhase::Arbitration, true).unwrap();
        assert_eq!(unique.len(), 7);
    }

    #[test]
    fn dedup_is_idempotent() {
        let device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));
        let once = device.timings(1_000_000, 1, CanPhase::Arbitration, true).unwrap();

        let mut twice = dedup_solutions(once.clone());
        assert_eq!(once, twice);

        sort_solutions(&mut twice);
        let keys = |v: &[BitTimingSolution]| v.iter().map(|t| (t.tseg1, t.tseg2, t.prescaler)).collect::<Vec<_>>();
        assert_eq!(keys(&once), keys(&twice));
    }

    #[test]
    fn empty_segment_range_is_not_an_error() {
        let device = test_device(ClosedRange { min: 1, max: 0 }, ClosedRange::new(1, 8));
        assert!(device.validate().is_err());

        let timings = device.timings(1_000_000, 3, CanPhase::Arbitration, true).unwrap();
        assert!(timings.is_empty());
    }

    #[test]
    fn clock_override() {
        let device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));

        // 20 MHz allows 4, 5 and 10 quanta per bit
        let timings = device
            .timing_search(CanPhase::Arbitration)
            .unwrap()
            .clock_hz(20_000_000)
            .bitrate(1_000_000)
            .run()
            .unwrap();
        assert_eq!(timings.len(), 9);
        assert_eq!(timings[0].prescaler, 5);
        assert!(timings.iter().all(|t| (t.bitrate_for_clock(20_000_000) - 1e6).abs() < 1e-6));
    }

    #[test]
    fn register_values_apply_offsets() {
        let mut device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));
        let solution = device.timings(1_000_000, 3, CanPhase::Arbitration, true).unwrap()[0];

        let values = device.register_values(&solution);
        assert_eq!(values.tseg1, solution.tseg1 as i64);
        assert_eq!(values.prescaler, solution.prescaler as i64);

        device.register_offsets = RegisterOffsets {
            tseg1: -1,
            tseg2: -1,
            sjw: -1,
            prescaler: -1,
        };
        let values = device.register_values(&solution);
        assert_eq!(values.tseg1, solution.tseg1 as i64 - 1);
        assert_eq!(values.tseg2, solution.tseg2 as i64 - 1);
        assert_eq!(values.sjw, solution.sjw_actual as i64 - 1);
        assert_eq!(values.prescaler, solution.prescaler as i64 - 1);

        // Zero stays zero
        assert_eq!(register_value(0, -1), 0);
    }

    #[test]
    fn supported_bitrates_follow_phase_constraints() {
        let device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));

        assert_eq!(
            device.supported_bitrates(CanPhase::Arbitration),
            vec![250_000, 500_000, 800_000, 1_000_000]
        );
        assert!(device.supported_bitrates(CanPhase::Data).is_empty());
        assert!(!device.supports_fd());
        assert_eq!(device.phases().collect::<Vec<_>>(), vec![CanPhase::Arbitration]);
    }

    #[test]
    fn validate_rejects_misplaced_constraint() {
        let mut device = test_device(ClosedRange::new(1, 8), ClosedRange::new(1, 8));
        assert!(device.validate().is_ok());

        device.constraints.data = device.constraints.arbitration;
        assert!(device.validate().is_err());
    }
}
