//! Exhaustive search for CAN bit timing register configurations.
//!
//! Every TSEG1/TSEG2 pair allowed by a [`TimingConstraint`] is tried. A pair is kept when
//! the input clock divides into the target bit rate with an integer prescaler inside the
//! prescaler range and the resulting sample point falls inside the [`SamplePointWindow`].
//!
//! ```rust
//! use can_timing::timing::{CanPhase, ClosedRange, TimingConstraint, TimingSearch};
//!
//! let constraint = TimingConstraint {
//!     phase: CanPhase::Arbitration,
//!     tseg1: ClosedRange::new(1, 15),
//!     tseg2: ClosedRange::new(1, 4),
//!     sjw: ClosedRange::new(1, 4),
//!     prescaler: ClosedRange::new(1, 256),
//! };
//!
//! let solutions = TimingSearch::new(constraint)
//!     .clock_hz(80_000_000)
//!     .bitrate(500_000)
//!     .run()
//!     .unwrap();
//!
//! let s = solutions.iter().find(|s| s.quanta_per_bit_time == 20).unwrap();
//! assert_eq!((s.tseg1, s.tseg2, s.prescaler), (15, 4, 8));
//! assert!((s.sample_point - 80.0).abs() < 1e-9);
//! ```

use tracing::{debug, trace};

use crate::error::Error;
use crate::timing::{BitTimingSolution, TimingConstraint, SYNC_SEGMENT};
use crate::Result;

/// SJW aimed for when the caller does not ask for a specific one.
pub const DEFAULT_TARGET_SJW: u32 = 3;

/// Inclusive sample point bounds in percent of the bit time.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplePointWindow {
    pub min: f64,
    pub max: f64,
}

impl Default for SamplePointWindow {
    fn default() -> Self {
        SamplePointWindow {
            min: 50.0,
            max: 100.0,
        }
    }
}

impl SamplePointWindow {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let window = Self { min, max };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(Error::InvalidArgument(
                "sample point window must be finite".to_string(),
            ));
        }
        if self.min < 0.0 || self.max > 100.0 || self.min > self.max {
            return Err(Error::InvalidArgument(format!(
                "sample point window [{}, {}] must lie within [0, 100]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn contains(&self, sample_point: f64) -> bool {
        self.min <= sample_point && sample_point <= self.max
    }
}

/// Builder for a bit timing search against one [`TimingConstraint`].
#[derive(Debug, Clone, Copy)]
pub struct TimingSearch {
    constraint: TimingConstraint,
    clock_hz: Option<u32>,
    bitrate: Option<u32>,
    sjw: u32,
    window: SamplePointWindow,
}

impl TimingSearch {
    pub fn new(constraint: TimingConstraint) -> Self {
        Self {
            constraint,
            clock_hz: None,
            bitrate: None,
            sjw: DEFAULT_TARGET_SJW,
            window: SamplePointWindow::default(),
        }
    }

    /// Undivided clock feeding the prescaler, in Hz.
    pub fn clock_hz(mut self, clock_hz: u32) -> Self {
        self.clock_hz = Some(clock_hz);
        self
    }

    /// Target bit rate in bits per second.
    pub fn bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Target SJW. The actual SJW of each solution may be lower.
    ///
    /// Default is `3`
    pub fn sjw(mut self, sjw: u32) -> Self {
        self.sjw = sjw;
        self
    }

    /// Accepted sample points.
    ///
    /// Default is `[50 %, 100 %]`
    pub fn sample_point_window(mut self, window: SamplePointWindow) -> Self {
        self.window = window;
        self
    }

    pub fn constraint(&self) -> &TimingConstraint {
        &self.constraint
    }

    pub fn run(self) -> Result<Vec<BitTimingSolution>> {
        let clock_hz = self
            .clock_hz
            .ok_or_else(|| Error::InvalidArgument("clock_hz is required".to_string()))?;
        let bitrate = self
            .bitrate
            .ok_or_else(|| Error::InvalidArgument("bitrate is required".to_string()))?;

        search(clock_hz, bitrate, self.sjw, &self.constraint, self.window)
    }
}

/// Enumerates all register configurations for `bitrate` bits per second, sorted by
/// [`sort_solutions`]. An empty list means the constraint allows no configuration.
pub fn search(
    clock_hz: u32,
    bitrate: u32,
    target_sjw: u32,
    constraint: &TimingConstraint,
    window: SamplePointWindow,
) -> Result<Vec<BitTimingSolution>> {
    if clock_hz == 0 {
        return Err(Error::InvalidArgument(
            "clock_hz must be greater than 0".to_string(),
        ));
    }
    if bitrate == 0 {
        return Err(Error::InvalidArgument(
            "bitrate must be greater than 0".to_string(),
        ));
    }
    if target_sjw == 0 {
        return Err(Error::InvalidArgument(
            "target sjw must be greater than 0".to_string(),
        ));
    }
    window.validate()?;

    // Empty ranges are allowed and yield no solutions, ranges starting at 0 are not
    for (name, range) in [
        ("tseg1", &constraint.tseg1),
        ("tseg2", &constraint.tseg2),
        ("sjw", &constraint.sjw),
        ("prescaler", &constraint.prescaler),
    ] {
        if range.min == 0 {
            return Err(Error::InvalidArgument(format!(
                "{name} range [{}, {}] starts below 1",
                range.min, range.max
            )));
        }
    }

    let mut solutions = vec![];
    let mut candidates = 0;

    for tseg1 in constraint.tseg1.iter() {
        for tseg2 in constraint.tseg2.iter() {
            candidates += 1;
            let Some(quanta_per_bit_time) = SYNC_SEGMENT
                .checked_add(tseg1)
                .and_then(|tq| tq.checked_add(tseg2))
            else {
                trace!("tseg1 {tseg1} tseg2 {tseg2}: bit time overflows");
                continue;
            };

            let Some(prescaler) = exact_prescaler(clock_hz, bitrate, quanta_per_bit_time) else {
                continue;
            };
            if !constraint.prescaler.contains(prescaler) {
                trace!("tseg1 {tseg1} tseg2 {tseg2}: prescaler {prescaler} out of range");
                continue;
            }

            let sample_point =
                (SYNC_SEGMENT + tseg1) as f64 / quanta_per_bit_time as f64 * 100.0;
            if !window.contains(sample_point) {
                trace!("tseg1 {tseg1} tseg2 {tseg2}: sample point {sample_point:.3} outside window");
                continue;
            }

            let sjw_actual = target_sjw
                .min(tseg1)
                .min(tseg2)
                .min(constraint.sjw.max);

            solutions.push(BitTimingSolution {
                sample_point,
                time_quantum_sec: (1.0 / clock_hz as f64) * prescaler as f64,
                quanta_per_bit_time,
                tseg1,
                tseg2,
                prescaler,
                sjw_actual,
            });
        }
    }

    sort_solutions(&mut solutions);

    debug!(
        "{:?} phase: {} of {} segment pairs give {} bps at {} Hz",
        constraint.phase,
        solutions.len(),
        candidates,
        bitrate,
        clock_hz
    );

    Ok(solutions)
}

/// Sorts by sample point ascending, then by prescaler descending.
pub fn sort_solutions(solutions: &mut [BitTimingSolution]) {
    solutions.sort_by(|a, b| {
        a.sample_point
            .total_cmp(&b.sample_point)
            .then(b.prescaler.cmp(&a.prescaler))
    });
}

/// Prescaler dividing `clock_hz` into exactly `bitrate * quanta_per_bit_time`, if any.
fn exact_prescaler(clock_hz: u32, bitrate: u32, quanta_per_bit_time: u32) -> Option<u32> {
    let denom = (bitrate as u64) * (quanta_per_bit_time as u64);
    if (clock_hz as u64) % denom != 0 {
        return None;
    }
    Some(((clock_hz as u64) / denom) as u32)
}
