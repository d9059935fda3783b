//! Per-axis pipeline: sample → corrector → regulator → stall → output.
//!
//! [`AxisUnit`] is called once per tick by the scheduler and answers runtime
//! parameter reads for the dispatcher.
//!
//! Ownership of runtime values:
//! - [`AxisRuntime`] motion fields, `motor_disabled`, `vmax_modified`: dispatcher
//! - deviation flag, closed-loop state: corrector
//! - `SmartEnergy`, standby, freewheeling: regulator
//! - stall flag, load level, driver flags: stall detector

use serde::Serialize;
use tracing::warn;

use rocker_common::axis::AxisId;
use rocker_common::config::AxisConfig;
use rocker_common::hal::{AxisOutput, AxisSample, MotionCommand};
use rocker_common::params::AxisParam;
use rocker_common::state::ClosedLoopState;

use crate::control::corrector::{ClosedLoopCorrector, CorrectorInput};
use crate::control::encoder::EncoderScale;
use crate::regulation::coolstep::{CurrentRegulator, RegulatorInput};
use crate::regulation::stall::{StallDetector, stop_on_stall};

/// Motion state written by the dispatcher plus the last sampled positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisRuntime {
    pub motion: MotionCommand,
    pub target_position: i32,
    pub target_velocity: i32,
    pub motor_disabled: bool,
    /// Set by ROTATE, cleared by MOVE-TO.
    pub vmax_modified: bool,
    /// Encoder position [microsteps].
    pub actual_position: i32,
    /// Encoder counts including the encoder offset.
    pub encoder_position: i32,
    pub position_reached: bool,
}

impl AxisRuntime {
    /// Hold the current position.
    #[inline]
    pub fn stop(&mut self) {
        self.motion = MotionCommand::Stop;
        self.target_velocity = 0;
    }
}

/// Result of one axis update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisStep {
    pub output: AxisOutput,
    /// Deviation fault latched this tick.
    pub fault_raised: bool,
    /// Axis stopped because of a stall this tick.
    pub stall_stop: bool,
}

/// Runtime state and control components of one axis.
#[derive(Debug, Clone, Copy)]
pub struct AxisUnit {
    pub runtime: AxisRuntime,
    pub corrector: ClosedLoopCorrector,
    pub regulator: CurrentRegulator,
    pub stall: StallDetector,
    current: u8,
}

impl AxisUnit {
    pub fn new(cfg: &AxisConfig) -> Self {
        Self {
            runtime: AxisRuntime::default(),
            corrector: ClosedLoopCorrector::new(),
            regulator: CurrentRegulator::new(&cfg.closed_loop),
            stall: StallDetector::default(),
            current: 0,
        }
    }

    /// Coil current applied in the last tick.
    #[inline]
    pub fn current(&self) -> u8 {
        self.current
    }

    /// Run the axis pipeline for one tick.
    pub fn update(&mut self, axis: AxisId, cfg: &AxisConfig, sample: &AxisSample) -> AxisStep {
        let scale = EncoderScale::from_config(cfg);
        let rt = &mut self.runtime;
        rt.actual_position = scale.position(sample.encoder_position);
        rt.encoder_position = scale.counts(sample.encoder_position);

        let at_rest = sample.commanded_velocity == 0;
        rt.position_reached = at_rest
            && match rt.motion {
                MotionCommand::MoveTo(t) => sample.commanded_position == t,
                MotionCommand::Rotate(v) => v == 0,
                MotionCommand::Stop => true,
            };
        let target = match rt.motion {
            MotionCommand::MoveTo(t) => Some(t),
            _ if at_rest => Some(sample.commanded_position),
            _ => None,
        };

        // ── Corrector ───────────────────────────────────────────
        let corr = self.corrector.update(
            axis,
            cfg,
            &CorrectorInput {
                commanded_position: sample.commanded_position,
                commanded_velocity: sample.commanded_velocity,
                measured_position: rt.actual_position,
                measured_velocity: scale.velocity(sample.encoder_velocity),
                target,
                motor_disabled: rt.motor_disabled,
            },
        );
        if self.corrector.is_faulted() && rt.motion != MotionCommand::Stop {
            rt.stop();
        }

        // ── Regulator ───────────────────────────────────────────
        self.current = self.regulator.update(
            cfg,
            &RegulatorInput {
                commanded_velocity: sample.commanded_velocity,
                load: sample.load,
                motor_disabled: rt.motor_disabled,
            },
        );

        // ── Stall detector ──────────────────────────────────────
        let stalled = self
            .stall
            .update(axis, &cfg.closed_loop, sample.load, sample.driver_flags);
        let stall_stop = rt.motion != MotionCommand::Stop
            && stop_on_stall(stalled, cfg.motor.stall_v_min, sample.commanded_velocity);
        if stall_stop {
            warn!(%axis, load = sample.load, velocity = sample.commanded_velocity, "stall, axis stopped");
            rt.stop();
        }

        AxisStep {
            output: AxisOutput {
                motion: rt.motion,
                velocity: corr.velocity,
                velocity_correction: corr.velocity_correction,
                position_correction: corr.position_correction,
                current: self.current,
                enabled: !rt.motor_disabled && !self.regulator.freewheeling(),
            },
            fault_raised: corr.fault_raised,
            stall_stop,
        }
    }

    /// Read a runtime parameter. `None` for configuration parameters.
    pub fn param(&self, param: AxisParam) -> Option<i32> {
        use AxisParam as P;
        let rt = &self.runtime;
        let value = match param {
            P::TargetPosition => rt.target_position,
            P::ActualPosition => rt.actual_position,
            P::TargetVelocity => rt.target_velocity,
            P::ActualVelocity => self.corrector.mean_velocity(),
            P::PositionReached => rt.position_reached as i32,
            P::SmartEnergy => self.regulator.smart_energy() as i32,
            P::MotorDisable => rt.motor_disabled as i32,
            P::StandbyFlag => self.regulator.standby() as i32,
            P::StallLevel => self.stall.level() as i32,
            P::DriverFlags => self.stall.flags().bits() as i32,
            P::StallFlag => self.stall.stalled() as i32,
            P::EncoderPosition => rt.encoder_position,
            P::DeviationFlag => self.corrector.deviation_flag() as i32,
            P::FreewheelingActive => self.regulator.freewheeling() as i32,
            P::VMaxModified => rt.vmax_modified as i32,
            P::ClosedLoopState => self.corrector.state() as i32,
            _ => return None,
        };
        Some(value)
    }

    /// Diagnostic snapshot for the status report.
    pub fn snapshot(&self, axis: AxisId) -> AxisSnapshot {
        AxisSnapshot {
            axis: axis.raw(),
            state: self.corrector.state(),
            target_position: self.runtime.target_position,
            actual_position: self.runtime.actual_position,
            actual_velocity: self.corrector.mean_velocity(),
            smart_energy: self.regulator.smart_energy(),
            current: self.current,
            stall: self.stall.stalled(),
            deviation: self.corrector.deviation_flag(),
            driver_flags: self.stall.flags().bits(),
            motor_disabled: self.runtime.motor_disabled,
        }
    }
}

/// Serializable per-axis summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisSnapshot {
    pub axis: u8,
    pub state: ClosedLoopState,
    pub target_position: i32,
    pub actual_position: i32,
    pub actual_velocity: i32,
    pub smart_energy: u8,
    pub current: u8,
    pub stall: bool,
    pub deviation: bool,
    pub driver_flags: u8,
    pub motor_disabled: bool,
}

// ─── Tests ──────────────────────────────────────────────────────────
