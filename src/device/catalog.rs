//! Built-in CAN controller definitions.

use std::borrow::Cow;

use crate::device::{Device, PhaseConstraints, RegisterOffsets};
use crate::timing::{CanPhase, ClosedRange, TimingConstraint};

/// Standard arbitration phase bit rates.
pub static CAN_BITRATES_BPS: &[u32] = &[250_000, 500_000, 800_000, 1_000_000];
/// Standard data phase bit rates, a superset of [`CAN_BITRATES_BPS`].
pub static CAN_FD_BITRATES_BPS: &[u32] = &[
    250_000, 500_000, 800_000, 1_000_000, 2_000_000, 4_000_000, 6_000_000,
];

/// The built-in controllers store each timing value minus one.
const MINUS_ONE: RegisterOffsets = RegisterOffsets {
    tseg1: -1,
    tseg2: -1,
    sjw: -1,
    prescaler: -1,
};

/// Classic CAN timing registers as found on SJA1000 style controllers.
const SJA1000_TIMING: TimingConstraint = TimingConstraint {
    phase: CanPhase::Arbitration,
    tseg1: ClosedRange::new(1, 16),
    tseg2: ClosedRange::new(1, 8),
    sjw: ClosedRange::new(1, 4),
    prescaler: ClosedRange::new(1, 64),
};

pub const SJA1000: Device = Device {
    name: Cow::Borrowed("SJA1000"),
    comment: Cow::Borrowed("SJA1000 compatible Opencores IP"),
    input_clock_hz: 24_000_000,
    max_bitrate_bps: 1_000_000,
    max_fd_bitrate_bps: 0,
    constraints: PhaseConstraints {
        arbitration: Some(SJA1000_TIMING),
        data: None,
    },
    register_offsets: MINUS_ONE,
};

pub const XCANFD: Device = Device {
    name: Cow::Borrowed("XCANFD"),
    comment: Cow::Borrowed("Xilinx CANFD IP"),
    input_clock_hz: 36_000_000,
    max_bitrate_bps: 1_000_000,
    max_fd_bitrate_bps: 2_000_000,
    constraints: PhaseConstraints {
        arbitration: Some(TimingConstraint {
            phase: CanPhase::Arbitration,
            tseg1: ClosedRange::new(1, 0x100),
            tseg2: ClosedRange::new(1, 0x80),
            sjw: ClosedRange::new(1, 0x80),
            prescaler: ClosedRange::new(1, 256),
        }),
        data: Some(TimingConstraint {
            phase: CanPhase::Data,
            tseg1: ClosedRange::new(1, 0x20),
            tseg2: ClosedRange::new(1, 0x10),
            sjw: ClosedRange::new(1, 0x10),
            prescaler: ClosedRange::new(1, 256),
        }),
    },
    register_offsets: MINUS_ONE,
};

pub const XCANPS: Device = Device {
    name: Cow::Borrowed("XCANPS"),
    comment: Cow::Borrowed("Xilinx Zynq CAN periphery"),
    input_clock_hz: 80_000_000,
    max_bitrate_bps: 1_000_000,
    max_fd_bitrate_bps: 0,
    constraints: PhaseConstraints {
        arbitration: Some(TimingConstraint {
            prescaler: ClosedRange::new(1, 256),
            ..SJA1000_TIMING
        }),
        data: None,
    },
    register_offsets: MINUS_ONE,
};

pub static DEVICES: [Device; 3] = [SJA1000, XCANFD, XCANPS];

pub fn devices() -> &'static [Device] {
    &DEVICES
}

/// Looks up a built-in device by name, ignoring case.
pub fn find_device(name: &str) -> Option<&'static Device> {
    DEVICES
        .iter()
        .find(|device| device.name.eq_ignore_ascii_case(name))
}
