//! Stall comparator and driver status supervision.
//!
//! `StallFlag = load >= Gamma`, recomputed every tick, no hysteresis. The
//! `Beta` comparison drives the `STALL_WARNING` bit; every other bit of
//! [`DriverFlags`] is the driver's own status byte.

use tracing::warn;

use rocker_common::axis::AxisId;
use rocker_common::config::ClosedLoopConfig;
use rocker_common::error::DriverFlags;

/// Stall detector state of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StallDetector {
    stalled: bool,
    level: u16,
    flags: DriverFlags,
}

impl StallDetector {
    #[inline]
    pub fn stalled(&self) -> bool {
        self.stalled
    }

    /// Last load sample.
    #[inline]
    pub fn level(&self) -> u16 {
        self.level
    }

    #[inline]
    pub fn flags(&self) -> DriverFlags {
        self.flags
    }

    /// Run one tick; returns the stall flag.
    pub fn update(
        &mut self,
        axis: AxisId,
        cfg: &ClosedLoopConfig,
        load: u16,
        driver: DriverFlags,
    ) -> bool {
        let mut flags = driver - DriverFlags::STALL_WARNING;
        flags.set(DriverFlags::STALL_WARNING, load >= cfg.beta);

        let rising = (flags & DriverFlags::FAULT_MASK) - self.flags;
        if !rising.is_empty() {
            warn!(%axis, flags = ?rising, "driver fault");
        }

        self.level = load;
        self.flags = flags;
        self.stalled = load >= cfg.gamma;
        self.stalled
    }
}

/// Whether the axis must be stopped because of a stall.
///
/// Only active when `stall_v_min > 0` and the axis runs at least that fast.
#[inline]
pub fn stop_on_stall(stalled: bool, stall_v_min: i32, commanded_velocity: i32) -> bool {
    stalled && stall_v_min > 0 && commanded_velocity.unsigned_abs() >= stall_v_min as u32
}
