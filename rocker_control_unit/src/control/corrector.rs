//! Per-axis closed-loop corrector.
//!
//! Reconciles the ramp generator's commanded trajectory with encoder feedback.
//!
//! ## State Machine
//!
//! ```text
//! Disabled ⇄ OpenLoop ⇄ Tracking      (MotorDisable, closed_loop_mode)
//! OpenLoop/Tracking → Fault            (deviation > limit, latched)
//! Fault → OpenLoop/Tracking            (reenable() only)
//! ```
//!
//! ## Correction Law (Tracking)
//!
//! - velocity: PI(D) on `commanded − mean(measured)`, weighted by the
//!   GammaVMin/GammaVAdd activation ramp
//! - position: once the axis is inside `PositionWindow` of its target for more
//!   than `EncVMeanWait` ticks and the error exceeds the tolerance,
//!   `error × PositionCorrectionP >> 16`

use tracing::{info, warn};

use rocker_common::axis::AxisId;
use rocker_common::config::{AxisConfig, ClosedLoopConfig};
use rocker_common::state::ClosedLoopState;

use super::deviation::DeviationCheck;
use super::filters::VelocityMean;
use super::pid::{PiGains, PiState, pi_compute};

/// Q16 unity for the activation weight.
const WEIGHT_ONE: i64 = 1 << 16;

/// Per-tick corrector input, already scaled to microsteps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectorInput {
    pub commanded_position: i32,
    pub commanded_velocity: i32,
    pub measured_position: i32,
    /// Unfiltered measured velocity.
    pub measured_velocity: i32,
    /// Position the axis is settling on, if any.
    pub target: Option<i32>,
    pub motor_disabled: bool,
}

/// Per-tick corrector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectorOutput {
    /// Commanded velocity plus correction.
    pub velocity: i32,
    pub velocity_correction: i32,
    pub position_correction: i32,
    /// Fault latched during this tick.
    pub fault_raised: bool,
}

impl CorrectorOutput {
    fn passthrough(velocity: i32) -> Self {
        Self {
            velocity,
            ..Default::default()
        }
    }
}

/// Activation weight of the velocity correction (Q16).
///
/// 0 below `v_min`, full at `v_min + v_add` and above, linear in between.
#[inline]
pub fn gamma_weight(speed: u32, v_min: i32, v_add: i32) -> i64 {
    let speed = speed as i64;
    let v_min = v_min.max(0) as i64;
    let v_add = v_add.max(0) as i64;
    if speed < v_min {
        0
    } else if v_add == 0 || speed >= v_min + v_add {
        WEIGHT_ONE
    } else {
        (speed - v_min) * WEIGHT_ONE / v_add
    }
}

/// Closed-loop corrector of one axis.
///
/// The deviation flag is private: it is set by [`ClosedLoopCorrector::update`]
/// and cleared only by [`ClosedLoopCorrector::reenable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedLoopCorrector {
    state: ClosedLoopState,
    deviation_flag: bool,
    pi: PiState,
    vmean: VelocityMean,
    mean_velocity: i32,
    /// Consecutive ticks inside the position window.
    window_ticks: u32,
}

impl ClosedLoopCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> ClosedLoopState {
        self.state
    }

    #[inline]
    pub fn deviation_flag(&self) -> bool {
        self.deviation_flag
    }

    #[inline]
    pub fn is_faulted(&self) -> bool {
        self.state == ClosedLoopState::Fault
    }

    /// Filtered encoder velocity [microsteps/s].
    #[inline]
    pub fn mean_velocity(&self) -> i32 {
        self.mean_velocity
    }

    /// Leave `Fault`. Returns `false` when the axis was not faulted.
    pub fn reenable(&mut self, axis: AxisId, cfg: &ClosedLoopConfig) -> bool {
        if !self.is_faulted() {
            return false;
        }
        self.deviation_flag = false;
        self.reset_correction();
        self.state = Self::enabled_state(cfg);
        info!(%axis, state = ?self.state, "closed-loop re-enabled");
        true
    }

    fn enabled_state(cfg: &ClosedLoopConfig) -> ClosedLoopState {
        if cfg.closed_loop_mode {
            ClosedLoopState::Tracking
        } else {
            ClosedLoopState::OpenLoop
        }
    }

    fn reset_correction(&mut self) {
        self.pi.reset();
        self.window_ticks = 0;
    }

    /// Run one tick.
    pub fn update(&mut self, axis: AxisId, cfg: &AxisConfig, input: &CorrectorInput) -> CorrectorOutput {
        let cl = &cfg.closed_loop;
        self.mean_velocity = self.vmean.update(
            input.measured_velocity,
            cl.enc_v_mean_filter,
            cl.enc_v_mean_int,
        );
        let passthrough = CorrectorOutput::passthrough(input.commanded_velocity);

        if self.is_faulted() {
            return passthrough;
        }
        if input.motor_disabled {
            if self.state != ClosedLoopState::Disabled {
                self.reset_correction();
                self.state = ClosedLoopState::Disabled;
            }
            return passthrough;
        }

        let next = Self::enabled_state(cl);
        if next != self.state {
            self.reset_correction();
            self.state = next;
        }

        let check = DeviationCheck::evaluate(
            &cfg.motor,
            input.commanded_position,
            input.measured_position,
            input.commanded_velocity,
            self.mean_velocity,
        );
        if check.exceeded() {
            self.state = ClosedLoopState::Fault;
            self.deviation_flag = true;
            self.reset_correction();
            warn!(
                %axis,
                position_deviation = check.position.deviation,
                velocity_deviation = check.velocity.deviation,
                "deviation limit exceeded, axis stopped"
            );
            return CorrectorOutput {
                fault_raised: true,
                ..passthrough
            };
        }

        if !self.state.is_correcting() {
            return passthrough;
        }

        // ── Velocity correction ─────────────────────────────────
        let error = input.commanded_velocity.saturating_sub(self.mean_velocity);
        let raw = pi_compute(&mut self.pi, &PiGains::from_config(cl), error);
        let weight = gamma_weight(
            input.commanded_velocity.unsigned_abs(),
            cl.gamma_v_min,
            cl.gamma_v_add,
        );
        let velocity_correction = ((raw as i64 * weight) >> 16) as i32;

        // ── Position correction ─────────────────────────────────
        let in_window = input.target.is_some_and(|t| {
            (t as i64 - input.commanded_position as i64).abs() <= cl.position_window as i64
        });
        self.window_ticks = if in_window {
            self.window_ticks.saturating_add(1)
        } else {
            0
        };
        let position_error = input.commanded_position as i64 - input.measured_position as i64;
        // At least one in-window tick, even with a wait of 0.
        let settled = self.window_ticks >= (cl.enc_v_mean_wait as u32).max(1);
        let position_correction = if settled
            && position_error.abs() > cl.position_correction_tolerance as i64
        {
            let corr = (position_error * cl.position_correction_p as i64) >> 16;
            corr.clamp(i32::MIN as i64, i32::MAX as i64) as i32
        } else {
            0
        };

        CorrectorOutput {
            velocity: input.commanded_velocity.saturating_add(velocity_correction),
            velocity_correction,
            position_correction,
            fault_raised: false,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> AxisId {
        AxisId::new(0, 1).unwrap()
    }

    fn closed_loop_cfg() -> AxisConfig {
        let mut cfg = AxisConfig::default();
        cfg.closed_loop.closed_loop_mode = true;
        cfg
    }

    fn at_rest(position: i32) -> CorrectorInput {
        CorrectorInput {
            commanded_position: position,
            commanded_velocity: 0,
            measured_position: position,
            measured_velocity: 0,
            target: Some(position),
            motor_disabled: false,
        }
    }

    #[test]
    fn gamma_weight_ramp() {
        assert_eq!(gamma_weight(99, 100, 100), 0);
        assert_eq!(gamma_weight(100, 100, 100), 0);
        assert_eq!(gamma_weight(150, 100, 100), WEIGHT_ONE / 2);
        assert_eq!(gamma_weight(200, 100, 100), WEIGHT_ONE);
        assert_eq!(gamma_weight(100, 100, 0), WEIGHT_ONE);
        assert_eq!(gamma_weight(0, 0, 0), WEIGHT_ONE);
    }

    #[test]
    fn tracking_without_error_produces_no_correction() {
        let mut c = ClosedLoopCorrector::new();
        let cfg = closed_loop_cfg();
        for _ in 0..10 {
            let out = c.update(axis(), &cfg, &at_rest(1000));
            assert_eq!(out, CorrectorOutput::default());
        }
        assert_eq!(c.state(), ClosedLoopState::Tracking);
        assert!(!c.deviation_flag());
    }

    #[test]
    fn open_loop_passes_through() {
        let mut c = ClosedLoopCorrector::new();
        let cfg = AxisConfig::default();
        let input = CorrectorInput {
            commanded_velocity: 5000,
            measured_position: 300,
            ..at_rest(0)
        };
        let out = c.update(axis(), &cfg, &input);
        assert_eq!(c.state(), ClosedLoopState::OpenLoop);
        assert_eq!(out, CorrectorOutput::passthrough(5000));
    }

    #[test]
    fn motor_disable_wins_over_mode() {
        let mut c = ClosedLoopCorrector::new();
        let cfg = closed_loop_cfg();
        let input = CorrectorInput {
            motor_disabled: true,
            ..at_rest(0)
        };
        c.update(axis(), &cfg, &input);
        assert_eq!(c.state(), ClosedLoopState::Disabled);
        c.update(axis(), &cfg, &at_rest(0));
        assert_eq!(c.state(), ClosedLoopState::Tracking);
    }

    #[test]
    fn fault_needs_strictly_greater_deviation() {
        let mut cfg = closed_loop_cfg();
        cfg.motor.max_position_deviation = 100;
        let mut c = ClosedLoopCorrector::new();

        let equal = CorrectorInput {
            measured_position: 1100,
            ..at_rest(1000)
        };
        c.update(axis(), &cfg, &equal);
        assert_eq!(c.state(), ClosedLoopState::Tracking);

        let beyond = CorrectorInput {
            measured_position: 1150,
            ..at_rest(1000)
        };
        let out = c.update(axis(), &cfg, &beyond);
        assert!(out.fault_raised);
        assert_eq!(c.state(), ClosedLoopState::Fault);
        assert!(c.deviation_flag());
    }

    #[test]
    fn fault_is_latched_until_reenable() {
        let mut cfg = closed_loop_cfg();
        cfg.motor.max_position_deviation = 100;
        let mut c = ClosedLoopCorrector::new();
        c.update(
            axis(),
            &cfg,
            &CorrectorInput {
                measured_position: 1150,
                ..at_rest(1000)
            },
        );
        for _ in 0..5 {
            let out = c.update(axis(), &cfg, &at_rest(1000));
            assert!(!out.fault_raised);
            assert_eq!(c.state(), ClosedLoopState::Fault);
            assert!(c.deviation_flag());
        }
        // Disabling the motor does not clear the latch either.
        c.update(
            axis(),
            &cfg,
            &CorrectorInput {
                motor_disabled: true,
                ..at_rest(1000)
            },
        );
        assert_eq!(c.state(), ClosedLoopState::Fault);

        assert!(c.reenable(axis(), &cfg.closed_loop));
        assert_eq!(c.state(), ClosedLoopState::Tracking);
        assert!(!c.deviation_flag());
        assert!(!c.reenable(axis(), &cfg.closed_loop));
    }

    #[test]
    fn open_loop_still_monitors_deviation() {
        let mut cfg = AxisConfig::default();
        cfg.motor.max_velocity_deviation = 1000;
        let mut c = ClosedLoopCorrector::new();
        let input = CorrectorInput {
            commanded_velocity: 5000,
            measured_velocity: 3000,
            ..at_rest(0)
        };
        let out = c.update(axis(), &cfg, &input);
        assert!(out.fault_raised);
        assert_eq!(c.state(), ClosedLoopState::Fault);
    }

    #[test]
    fn position_correction_after_window_wait() {
        let mut cfg = closed_loop_cfg();
        cfg.closed_loop.enc_v_mean_wait = 2;
        cfg.closed_loop.position_correction_tolerance = 10;
        let mut c = ClosedLoopCorrector::new();
        let input = CorrectorInput {
            measured_position: 950,
            ..at_rest(1000)
        };
        assert_eq!(c.update(axis(), &cfg, &input).position_correction, 0);
        // Unity gain: full error once the axis sat in the window for `wait` ticks.
        assert_eq!(c.update(axis(), &cfg, &input).position_correction, 50);
        assert_eq!(c.update(axis(), &cfg, &input).position_correction, 50);
    }

    #[test]
    fn zero_window_wait_corrects_on_first_in_window_tick() {
        let mut cfg = closed_loop_cfg();
        cfg.closed_loop.enc_v_mean_wait = 0;
        cfg.closed_loop.position_correction_tolerance = 10;
        let mut c = ClosedLoopCorrector::new();
        let input = CorrectorInput {
            measured_position: 950,
            ..at_rest(1000)
        };
        assert_eq!(c.update(axis(), &cfg, &input).position_correction, 50);
    }

    #[test]
    fn position_correction_respects_tolerance_and_window() {
        let cfg = closed_loop_cfg();
        let mut c = ClosedLoopCorrector::new();
        let small = CorrectorInput {
            measured_position: 900,
            ..at_rest(1000)
        };
        // |error| == tolerance (100) → no correction.
        assert_eq!(c.update(axis(), &cfg, &small).position_correction, 0);

        let far_from_target = CorrectorInput {
            measured_position: 500,
            target: Some(5000),
            ..at_rest(1000)
        };
        assert_eq!(c.update(axis(), &cfg, &far_from_target).position_correction, 0);

        let no_target = CorrectorInput {
            target: None,
            ..far_from_target
        };
        assert_eq!(c.update(axis(), &cfg, &no_target).position_correction, 0);
    }

    #[test]
    fn velocity_correction_above_gamma_band() {
        let mut cfg = closed_loop_cfg();
        cfg.closed_loop.gamma_v_min = 0;
        cfg.closed_loop.gamma_v_add = 0;
        cfg.closed_loop.correction_velocity_p = 65536;
        cfg.closed_loop.correction_velocity_i = 0;
        cfg.closed_loop.enc_v_mean_filter = 1;
        let mut c = ClosedLoopCorrector::new();
        let input = CorrectorInput {
            commanded_velocity: 10_000,
            measured_velocity: 9_000,
            target: None,
            ..at_rest(0)
        };
        let out = c.update(axis(), &cfg, &input);
        assert_eq!(out.velocity_correction, 1000);
        assert_eq!(out.velocity, 11_000);
    }

    #[test]
    fn velocity_correction_suppressed_below_gamma_v_min() {
        let mut cfg = closed_loop_cfg();
        cfg.closed_loop.correction_velocity_p = 65536;
        let mut c = ClosedLoopCorrector::new();
        let input = CorrectorInput {
            commanded_velocity: 10_000,
            measured_velocity: 9_000,
            target: None,
            ..at_rest(0)
        };
        let out = c.update(axis(), &cfg, &input);
        assert_eq!(out.velocity_correction, 0);
        assert_eq!(out.velocity, 10_000);
    }
}
