//! Contains the main error type for the library.
use thiserror::Error;

use crate::timing::CanPhase;

/// The main error type for the library.
///
/// An empty search result is not an error, a device simply may have no
/// register configuration for a given clock and bit rate.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum Error {
    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),
    #[error("Unsupported Phase: {device} has no timing constraint for the {phase} phase")]
    UnsupportedPhase { device: String, phase: CanPhase },
}
