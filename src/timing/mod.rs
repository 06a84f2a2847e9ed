//! Bit timing data model: controller phases, register constraints and computed solutions.
//!
//! A bit is divided into a synchronization segment of one time quantum followed by
//! time segment 1 (propagation + phase segment 1) and time segment 2 (phase segment 2).
//! The bus level is sampled at the end of time segment 1.
//!
//! ```text
//! <---------------- T_bit ------------------->
//! |  SYNC   |  PROP   |  PHASE1   !  PHASE2  |
//!           <-------TSEG1---------><--TSEG2-->
//! ```

pub mod search;

use std::hash::{Hash, Hasher};

use strum_macros::{Display, EnumIter};

use crate::error::Error;
use crate::Result;

pub use search::{search, sort_solutions, SamplePointWindow, TimingSearch, DEFAULT_TARGET_SJW};

/// Length of the synchronization segment in time quanta.
pub const SYNC_SEGMENT: u32 = 1;

/// Phase of a CAN frame a set of timing registers applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumIter, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CanPhase {
    /// Arbitration phase (ID, DLC, etc.)
    Arbitration,
    /// Data phase. For CAN-FD frames with bit rate switch the second bit rate is active here.
    Data,
}

/// Closed integer interval `[min, max]` of values a timing register accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClosedRange {
    pub min: u32,
    pub max: u32,
}

impl ClosedRange {
    /// Creates a range, panicking if it is empty or starts below 1.
    ///
    /// Intended for constant catalog entries, where the check happens at compile time.
    /// Use [`ClosedRange::try_new`] for values only known at runtime.
    pub const fn new(min: u32, max: u32) -> Self {
        assert!(min >= 1, "range must start at 1 or above");
        assert!(min <= max, "range must not be empty");
        Self { min, max }
    }

    pub fn try_new(min: u32, max: u32) -> Result<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min < 1 {
            return Err(Error::InvalidArgument(format!(
                "range [{}, {}] starts below 1",
                self.min, self.max
            )));
        }
        if self.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "range [{}, {}] is empty",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.min..=self.max
    }
}

/// Register ranges a controller accepts for one timing phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingConstraint {
    /// Phase these ranges refer to
    pub phase: CanPhase,
    /// Time segment 1 (propagation segment + phase segment 1)
    pub tseg1: ClosedRange,
    /// Time segment 2 (phase segment 2)
    pub tseg2: ClosedRange,
    /// Synchronization jump width. Only the upper bound limits a search.
    pub sjw: ClosedRange,
    /// Bit rate prescaler
    pub prescaler: ClosedRange,
}

impl TimingConstraint {
    pub fn validate(&self) -> Result<()> {
        self.tseg1.validate()?;
        self.tseg2.validate()?;
        self.sjw.validate()?;
        self.prescaler.validate()?;
        Ok(())
    }
}

/// One valid register configuration produced by a search.
///
/// Two solutions compare equal when they share the sample point and the actual SJW,
/// even if their segments or prescaler differ. Distinct register sets therefore
/// collapse into one row on de-duplication, which may hide alternatives a user
/// would have wanted to see.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitTimingSolution {
    /// Sample point location inside the bit time in percent
    pub sample_point: f64,
    /// Length of a time quantum in seconds
    pub time_quantum_sec: f64,
    /// Number of time quanta per bit time
    pub quanta_per_bit_time: u32,
    pub tseg1: u32,
    pub tseg2: u32,
    pub prescaler: u32,
    /// SJW usable with this configuration
    pub sjw_actual: u32,
}

impl BitTimingSolution {
    /// Time quantum in nanoseconds.
    pub fn time_quantum_ns(&self) -> f64 {
        self.time_quantum_sec * 1e9
    }

    /// Bit rate this configuration produces when fed with `clock_hz`.
    pub fn bitrate_for_clock(&self, clock_hz: u32) -> f64 {
        clock_hz as f64 / (self.prescaler as f64 * self.quanta_per_bit_time as f64)
    }

    fn key(&self) -> (u64, u32) {
        (self.sample_point.to_bits(), self.sjw_actual)
    }
}

impl PartialEq for BitTimingSolution {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for BitTimingSolution {}

impl Hash for BitTimingSolution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
