//! Position/velocity deviation monitoring.
//!
//! Compares measured against commanded values with a strict `>`; a limit of
//! zero or less disables the check. Runs in `OpenLoop` and `Tracking`.

use rocker_common::config::MotorConfig;

/// Result of a single deviation comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationResult {
    /// Absolute deviation.
    pub deviation: u32,
    /// Whether the deviation exceeds the limit.
    pub exceeded: bool,
}

/// Evaluate one deviation.
pub fn evaluate_deviation(commanded: i32, measured: i32, limit: i32) -> DeviationResult {
    let deviation = (commanded as i64 - measured as i64).unsigned_abs().min(u32::MAX as u64) as u32;
    let exceeded = limit > 0 && deviation > limit as u32;
    DeviationResult { deviation, exceeded }
}

/// Position and velocity deviation of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationCheck {
    pub position: DeviationResult,
    pub velocity: DeviationResult,
}

impl DeviationCheck {
    pub fn evaluate(
        motor: &MotorConfig,
        commanded_position: i32,
        measured_position: i32,
        commanded_velocity: i32,
        measured_velocity: i32,
    ) -> Self {
        Self {
            position: evaluate_deviation(
                commanded_position,
                measured_position,
                motor.max_position_deviation,
            ),
            velocity: evaluate_deviation(
                commanded_velocity,
                measured_velocity,
                motor.max_velocity_deviation,
            ),
        }
    }

    #[inline]
    pub fn exceeded(&self) -> bool {
        self.position.exceeded || self.velocity.exceeded
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
