//! Integer velocity PI controller with optional clocked D term.
//!
//! Gains are Q16 (65536 = 1.0). The integral accumulator is kept in Q16 and
//! clamped so the I term never leaves `±i_clip`. The D term is recomputed
//! every `d_clk` ticks and held in between; `d_clk == 0` disables it.

use rocker_common::config::ClosedLoopConfig;

/// Internal state of the PI controller.
///
/// Must be reset (via [`PiState::reset`]) whenever the corrector leaves
/// `Tracking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PiState {
    /// Integral accumulator (Q16).
    integral: i64,
    /// Error at the last D update.
    prev_error: i32,
    /// Held D term.
    d_term: i32,
    /// Ticks since the last D update.
    d_counter: u16,
}

impl PiState {
    /// Reset all internal state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current I term.
    #[inline]
    pub fn i_term(&self) -> i32 {
        (self.integral >> 16) as i32
    }
}

/// PI gains, extracted from `ClosedLoopConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiGains {
    /// Proportional gain (Q16).
    pub p: i32,
    /// Integral gain (Q16, 0 = disabled).
    pub i: i32,
    /// I term limit.
    pub i_clip: i32,
    /// D update divider [ticks] (0 = disabled).
    pub d_clk: u16,
    /// D term limit.
    pub d_clip: i32,
}

impl PiGains {
    pub fn from_config(cfg: &ClosedLoopConfig) -> Self {
        Self {
            p: cfg.correction_velocity_p,
            i: cfg.correction_velocity_i,
            i_clip: cfg.correction_velocity_i_clip,
            d_clk: cfg.correction_velocity_d_clk,
            d_clip: cfg.correction_velocity_d_clip,
        }
    }
}

/// Compute one PI cycle for a velocity error [microsteps/s].
///
/// Returns the velocity correction, saturated to `i32`.
#[inline]
pub fn pi_compute(state: &mut PiState, gains: &PiGains, error: i32) -> i32 {
    let e = error as i64;

    // ── P term ──────────────────────────────────────────────
    let p_term = (e * gains.p as i64) >> 16;

    // ── I term (Q16 accumulator) ────────────────────────────
    let i_term = if gains.i != 0 {
        let clip = (gains.i_clip.max(0) as i64) << 16;
        state.integral = (state.integral + e * gains.i as i64).clamp(-clip, clip);
        state.integral >> 16
    } else {
        state.integral = 0;
        0
    };

    // ── D term (clocked) ────────────────────────────────────
    let d_term = if gains.d_clk > 0 {
        state.d_counter += 1;
        if state.d_counter >= gains.d_clk {
            state.d_counter = 0;
            let clip = gains.d_clip.max(0);
            state.d_term = error.saturating_sub(state.prev_error).clamp(-clip, clip);
            state.prev_error = error;
        }
        state.d_term as i64
    } else {
        state.d_term = 0;
        state.d_counter = 0;
        0
    };

    (p_term + i_term + d_term).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

// ─── Tests ──────────────────────────────────────────────────────────
