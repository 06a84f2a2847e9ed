//! # The CAN Timing Crate
//! The purpose of this crate is to find CAN and CAN-FD bit timing register configurations for a CAN protocol controller. Given the input clock of the controller, a target bit rate and the register ranges of the controller, it enumerates every combination of time segments and prescaler that produces the bit rate exactly with the sample point inside an allowed window.
//!
//! ## Device Example
//!
//! The built-in catalog contains a few common controllers. The following looks up an SJA1000 and picks the first configuration with a sample point around 87.5 %:
//!
//! ```rust
//! use can_timing::device::find_device;
//! use can_timing::timing::CanPhase;
//!
//! let sja1000 = find_device("SJA1000").unwrap();
//! let timing = sja1000
//!     .timing(500_000, 87.5, CanPhase::Arbitration, 1.0, 3)
//!     .unwrap()
//!     .unwrap();
//!
//! assert!((timing.sample_point - 87.5).abs() < 1e-9);
//!
//! // The SJA1000 stores every value minus one
//! let registers = sja1000.register_values(&timing);
//! assert_eq!(registers.tseg1, timing.tseg1 as i64 - 1);
//! ```
//!
//! ## Search Example
//!
//! Controllers outside the catalog are described by a [`timing::TimingConstraint`] and searched directly:
//!
//! ```rust
//! use can_timing::timing::{search, CanPhase, ClosedRange, SamplePointWindow, TimingConstraint};
//!
//! let constraint = TimingConstraint {
//!     phase: CanPhase::Data,
//!     tseg1: ClosedRange::new(1, 32),
//!     tseg2: ClosedRange::new(1, 16),
//!     sjw: ClosedRange::new(1, 16),
//!     prescaler: ClosedRange::new(1, 256),
//! };
//!
//! let window = SamplePointWindow::new(70.0, 80.0).unwrap();
//! let solutions = search(80_000_000, 2_000_000, 4, &constraint, window).unwrap();
//!
//! for s in &solutions {
//!     println!("{:.2} %\t{} tq\tbrp {}", s.sample_point, s.quanta_per_bit_time, s.prescaler);
//! }
//! ```
//!

pub mod device;
mod error;
pub mod timing;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
