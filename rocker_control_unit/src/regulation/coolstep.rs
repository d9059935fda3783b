//! coolStep current regulator.
//!
//! Adapts the current scaler (`SmartEnergy`) to the measured load with
//! hysteresis delays, and picks the coil current for the tick.
//!
//! ## Current Selection (first match wins)
//!
//! | condition | current |
//! |-----------|---------|
//! | motor disabled | 0 |
//! | freewheeling | 0 |
//! | standby | `standby_current` |
//! | `0 < abs(v) < threshold_speed` | `slow_run_current` |
//! | regulation inactive | `run_current` |
//! | regulating | `run_current × SmartEnergy / 255` |
//!
//! Regulation is active when closed-loop mode or coolStep is enabled. Both
//! delay counters reset whenever regulation is skipped.

use rocker_common::config::{AxisConfig, ClosedLoopConfig};

/// Per-tick regulator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegulatorInput {
    pub commanded_velocity: i32,
    pub load: u16,
    pub motor_disabled: bool,
}

/// Regulator state of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentRegulator {
    smart_energy: u8,
    up_count: u32,
    down_count: u32,
    /// Consecutive ticks with zero commanded velocity.
    rest_ticks: u32,
    standby: bool,
    freewheeling: bool,
}

impl CurrentRegulator {
    /// Regulator at power-on: scaler starts at `CurrentScalerStartUp`, or the
    /// maximum when that is 0.
    pub fn new(cfg: &ClosedLoopConfig) -> Self {
        let start = if cfg.current_scaler_start_up != 0 {
            cfg.current_scaler_start_up
        } else {
            cfg.current_scaler_maximum
        };
        let mut reg = Self {
            smart_energy: start,
            up_count: 0,
            down_count: 0,
            rest_ticks: 0,
            standby: false,
            freewheeling: false,
        };
        reg.clamp(cfg);
        reg
    }

    #[inline]
    pub fn smart_energy(&self) -> u8 {
        self.smart_energy
    }

    #[inline]
    pub fn standby(&self) -> bool {
        self.standby
    }

    #[inline]
    pub fn freewheeling(&self) -> bool {
        self.freewheeling
    }

    /// Pull the scaler back inside the configured bounds.
    #[inline]
    pub fn clamp(&mut self, cfg: &ClosedLoopConfig) {
        let lo = cfg.current_scaler_minimum.min(cfg.current_scaler_maximum);
        self.smart_energy = self.smart_energy.clamp(lo, cfg.current_scaler_maximum);
    }

    fn skip(&mut self, current: u8) -> u8 {
        self.up_count = 0;
        self.down_count = 0;
        current
    }

    fn track_rest(&mut self, cfg: &AxisConfig, velocity: i32) {
        if velocity != 0 {
            self.rest_ticks = 0;
            self.standby = false;
            self.freewheeling = false;
            return;
        }
        self.rest_ticks = self.rest_ticks.saturating_add(1);
        let setting = cfg.motor.setting_delay as u32;
        let freewheel = cfg.motor.freewheeling_delay as u32;
        self.standby = self.rest_ticks > setting;
        self.freewheeling = freewheel > 0 && self.rest_ticks > setting + freewheel;
    }

    /// Run one tick; returns the coil current.
    pub fn update(&mut self, cfg: &AxisConfig, input: &RegulatorInput) -> u8 {
        let cl = &cfg.closed_loop;
        let cs = &cfg.cool_step;
        self.clamp(cl);
        self.track_rest(cfg, input.commanded_velocity);

        if input.motor_disabled || self.freewheeling {
            return self.skip(0);
        }
        if self.standby {
            return self.skip(cfg.motor.standby_current);
        }
        let speed = input.commanded_velocity.unsigned_abs();
        if cs.threshold_speed > 0 && speed > 0 && speed < cs.threshold_speed as u32 {
            return self.skip(cs.slow_run_current);
        }
        if !(cl.closed_loop_mode || cs.enabled) {
            return self.skip(cfg.motor.run_current);
        }

        if input.load < cs.lower_threshold {
            self.down_count = 0;
            self.up_count += 1;
            if self.up_count >= cl.upscale_delay {
                self.up_count = 0;
                self.smart_energy = self.smart_energy.saturating_add(1);
            }
        } else if input.load > cs.upper_threshold {
            self.up_count = 0;
            self.down_count += 1;
            if self.down_count >= cl.downscale_delay {
                self.down_count = 0;
                self.smart_energy = self.smart_energy.saturating_sub(1);
            }
        } else {
            self.up_count = 0;
            self.down_count = 0;
        }
        self.clamp(cl);

        (cfg.motor.run_current as u32 * self.smart_energy as u32 / 255) as u8
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
