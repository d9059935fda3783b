//! Narrow hardware capabilities the control unit depends on.
//!
//! The control unit never touches registers. Per tick it takes one
//! [`AxisSample`] from the [`MotorDriver`], computes an [`AxisOutput`] and
//! hands it back. Time comes from a [`MonotonicClock`] so tests can drive
//! the scheduler deterministically.

use crate::axis::AxisId;
use crate::config::AxisConfig;
use crate::error::DriverFlags;

/// Motion request forwarded to the ramp generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionCommand {
    /// Decelerate and hold the current position.
    #[default]
    Stop,
    /// Run at a signed velocity [microsteps/s].
    Rotate(i32),
    /// Travel to an absolute position [microsteps].
    MoveTo(i32),
}

/// One driver/encoder reading, taken at the start of the axis update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisSample {
    /// Ramp generator position [microsteps].
    pub commanded_position: i32,
    /// Ramp generator velocity [microsteps/s].
    pub commanded_velocity: i32,
    /// Raw encoder counts.
    pub encoder_position: i32,
    /// Raw encoder velocity [counts/s].
    pub encoder_velocity: i32,
    /// Load measurement (0..=1023, higher = more load).
    pub load: u16,
    /// Driver status byte.
    pub driver_flags: DriverFlags,
}

/// Per-tick output applied to one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisOutput {
    pub motion: MotionCommand,
    /// Corrected velocity (commanded + correction).
    pub velocity: i32,
    pub velocity_correction: i32,
    pub position_correction: i32,
    /// Coil current (0..255).
    pub current: u8,
    /// `false` switches the driver stage off.
    pub enabled: bool,
}

/// Motor driver and encoder interface.
pub trait MotorDriver {
    /// Read the current state of `axis`. `cfg` is the configuration in
    /// force for this tick, so encoder scaling follows parameter writes.
    fn sample(&mut self, axis: AxisId, cfg: &AxisConfig) -> AxisSample;

    /// Apply the tick output to `axis`.
    fn apply(&mut self, axis: AxisId, output: &AxisOutput, cfg: &AxisConfig);
}

/// Free-running timer, 1 unit = 1 ms. Wraps at `u32::MAX`.
pub trait MonotonicClock {
    fn now(&self) -> u32;
}

/// Liveness indicator (status LED on hardware).
pub trait Heartbeat {
    fn toggle(&mut self);
}

/// Heartbeat that only counts toggles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingHeartbeat {
    pub toggles: u32,
    pub lit: bool,
}

impl Heartbeat for CountingHeartbeat {
    fn toggle(&mut self) {
        self.toggles = self.toggles.wrapping_add(1);
        self.lit = !self.lit;
    }
}
