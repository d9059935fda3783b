//! Encoder to microstep conversion.
//!
//! ```text
//! microsteps = (counts + encoder_offset) × motor_resolution × 2^microstep_resolution
//!              × gear_ratio / encoder_resolution + closed_loop_position_offset
//! ```
//!
//! Velocity uses the same scale without the offsets.

use rocker_common::config::AxisConfig;

/// Scale factors of one axis, extracted from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderScale {
    /// Microsteps per revolution × gear ratio.
    numerator: i64,
    /// Encoder counts per revolution.
    denominator: i64,
    encoder_offset: i32,
    position_offset: i32,
}

impl EncoderScale {
    pub fn from_config(cfg: &AxisConfig) -> Self {
        Self {
            numerator: cfg.motor.microsteps_per_rev() * cfg.cool_step.gear_ratio.max(1) as i64,
            denominator: cfg.motor.encoder_resolution.max(1) as i64,
            encoder_offset: cfg.cool_step.encoder_offset,
            position_offset: cfg.cool_step.closed_loop_position_offset,
        }
    }

    /// Raw counts including the encoder offset.
    #[inline]
    pub fn counts(&self, raw: i32) -> i32 {
        raw.wrapping_add(self.encoder_offset)
    }

    /// Measured position [microsteps].
    #[inline]
    pub fn position(&self, raw: i32) -> i32 {
        let scaled = self.counts(raw) as i64 * self.numerator / self.denominator;
        saturate(scaled + self.position_offset as i64)
    }

    /// Measured velocity [microsteps/s] from counts/s.
    #[inline]
    pub fn velocity(&self, counts_per_s: i32) -> i32 {
        saturate(counts_per_s as i64 * self.numerator / self.denominator)
    }

    /// Inverse of [`EncoderScale::position`] for a plant model; rounds toward zero.
    #[inline]
    pub fn counts_for_position(&self, microsteps: i32) -> i32 {
        let unscaled = (microsteps as i64 - self.position_offset as i64) * self.denominator
            / self.numerator.max(1);
        saturate(unscaled - self.encoder_offset as i64)
    }

    /// Inverse of [`EncoderScale::velocity`].
    #[inline]
    pub fn counts_for_velocity(&self, velocity: i32) -> i32 {
        saturate(velocity as i64 * self.denominator / self.numerator.max(1))
    }
}

#[inline]
fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
