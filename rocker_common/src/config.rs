//! Configuration records, compiled-in defaults and TOML loading.
//!
//! Every record implements `Default` with the power-on values of the module.
//! All config types derive `serde` with `#[serde(default)]`, so a TOML file
//! only needs the fields it overrides.
//!
//! Field access by parameter id ([`AxisConfig::field`],
//! [`AxisConfig::set_field`], [`ModuleConfig::set_global`]) goes through the
//! bounds in [`crate::params`], the same table the command dispatcher uses.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::{DEFAULT_AXIS_COUNT, DEFAULT_TICK_PERIOD, MAX_AXES};
use crate::params::{AxisParam, GlobalParam, ParamGroup};

/// Error type for configuration access and loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Value violates the field's bounds.
    #[error("value {value} out of range for field {field}")]
    OutOfRange { field: u8, value: i32 },

    /// Field id is not part of the configuration tables.
    #[error("unknown field {0}")]
    UnknownField(u8),

    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for the simulation runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

fn check(field: u8, value: i32, bounds: Option<core::ops::RangeInclusive<i32>>) -> Result<i32, ConfigError> {
    match bounds {
        Some(range) if range.contains(&value) => Ok(value),
        Some(_) => Err(ConfigError::OutOfRange { field, value }),
        None => Err(ConfigError::UnknownField(field)),
    }
}

// ─── Module Config ──────────────────────────────────────────────────

/// Module-wide bus configuration (global parameters, bank 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Serial bitrate code (0 = 9600).
    pub serial_bitrate: u8,
    /// Address this module answers to.
    pub module_address: u8,
    /// CAN bitrate code (8 = 1000 kBit/s).
    pub can_bitrate: u8,
    /// CAN id used for replies.
    pub can_send_id: u16,
    /// CAN id this module listens on.
    pub can_receive_id: u16,
    /// Additional CAN id accepted as our address (0 = none).
    pub secondary_id: u16,
    /// Address written into replies.
    pub host_address: u8,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            serial_bitrate: 0,
            module_address: 1,
            can_bitrate: 8,
            can_send_id: 2,
            can_receive_id: 1,
            secondary_id: 0,
            host_address: 2,
        }
    }
}

impl ModuleConfig {
    /// Read a global parameter stored in this record.
    pub fn global(&self, param: GlobalParam) -> Option<i32> {
        let value = match param {
            GlobalParam::SerialBitrate => self.serial_bitrate as i32,
            GlobalParam::ModuleAddress => self.module_address as i32,
            GlobalParam::CanBitrate => self.can_bitrate as i32,
            GlobalParam::CanSendId => self.can_send_id as i32,
            GlobalParam::CanReceiveId => self.can_receive_id as i32,
            GlobalParam::SecondaryId => self.secondary_id as i32,
            GlobalParam::HostAddress => self.host_address as i32,
            GlobalParam::TickTimer => return None,
        };
        Some(value)
    }

    /// Write a global parameter. The record is untouched on error.
    pub fn set_global(&mut self, param: GlobalParam, value: i32) -> Result<(), ConfigError> {
        let v = check(param as u8, value, param.bounds())?;
        match param {
            GlobalParam::SerialBitrate => self.serial_bitrate = v as u8,
            GlobalParam::ModuleAddress => self.module_address = v as u8,
            GlobalParam::CanBitrate => self.can_bitrate = v as u8,
            GlobalParam::CanSendId => self.can_send_id = v as u16,
            GlobalParam::CanReceiveId => self.can_receive_id = v as u16,
            GlobalParam::SecondaryId => self.secondary_id = v as u16,
            GlobalParam::HostAddress => self.host_address = v as u8,
            GlobalParam::TickTimer => return Err(ConfigError::UnknownField(param as u8)),
        }
        Ok(())
    }

    /// Validate every field against the global parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &param in GlobalParam::ALL {
            if let (Some(value), Some(range)) = (self.global(param), param.bounds()) {
                if !range.contains(&value) {
                    return Err(ConfigError::OutOfRange {
                        field: param as u8,
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}

// ─── Motor Config ───────────────────────────────────────────────────

/// Per-axis motor and ramp limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub max_velocity: i32,
    pub a_max: i32,
    /// Run current (0..255 = 0..100 %).
    pub run_current: u8,
    /// Standby current applied at rest.
    pub standby_current: u8,
    pub switch_mode: u8,
    pub ramp_type: u8,
    pub a_start: i32,
    pub d_final: i32,
    pub d_max: i32,
    pub d_stop: i32,
    /// Microsteps per full step as a power of two.
    pub microstep_resolution: u8,
    /// Stop on stall above this velocity (0 = off).
    pub stall_v_min: i32,
    pub boost_current: u8,
    /// Full steps per revolution.
    pub motor_resolution: u16,
    /// Ticks in standby before the coils are switched off (0 = never).
    pub freewheeling_delay: u16,
    /// Encoder counts per revolution.
    pub encoder_resolution: u16,
    /// 0 disables position deviation monitoring.
    pub max_position_deviation: i32,
    /// 0 disables velocity deviation monitoring.
    pub max_velocity_deviation: i32,
    /// Ticks at rest before standby current applies.
    pub setting_delay: u16,
    pub step_dir_mode: u8,
    pub unit_mode: u8,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            max_velocity: 51200,
            a_max: 204_800,
            run_current: 128,
            standby_current: 32,
            switch_mode: 0,
            ramp_type: 0,
            a_start: 25600,
            d_final: 25600,
            d_max: 204_800,
            d_stop: 10000,
            microstep_resolution: 8,
            stall_v_min: 0,
            boost_current: 128,
            motor_resolution: 200,
            freewheeling_delay: 0,
            encoder_resolution: 4096,
            max_position_deviation: 0,
            max_velocity_deviation: 0,
            setting_delay: 0,
            step_dir_mode: 0,
            unit_mode: 1,
        }
    }
}

impl MotorConfig {
    /// Microsteps per motor revolution.
    #[inline]
    pub fn microsteps_per_rev(&self) -> i64 {
        self.motor_resolution as i64 * (1i64 << self.microstep_resolution.min(8))
    }
}

// ─── Closed-Loop Config ─────────────────────────────────────────────

/// Per-axis closed-loop correction and current scaler parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClosedLoopConfig {
    pub closed_loop_mode: bool,
    /// Velocity below which velocity correction is inactive.
    pub gamma_v_min: i32,
    /// Velocity span over which velocity correction fades in.
    pub gamma_v_add: i32,
    /// Primary stall threshold.
    pub gamma: u16,
    /// Secondary stall threshold (driver flag only).
    pub beta: u16,
    pub offset: i32,
    pub current_scaler_minimum: u8,
    pub current_scaler_maximum: u8,
    /// Scaler value at power-on (0 = start at maximum).
    pub current_scaler_start_up: u8,
    pub upscale_delay: u32,
    pub downscale_delay: u32,
    pub correction_velocity_p: i32,
    pub correction_velocity_i: i32,
    pub correction_velocity_i_clip: i32,
    /// Derivative update divider in ticks (0 = no D term).
    pub correction_velocity_d_clk: u16,
    pub correction_velocity_d_clip: i32,
    /// Q16 gain, 65536 = unity.
    pub position_correction_p: i32,
    pub position_correction_tolerance: i32,
    pub position_window: i32,
    pub enc_v_mean_wait: u8,
    pub enc_v_mean_filter: u8,
    pub enc_v_mean_int: u16,
    pub encoder_correction_y_offset: i32,
}

impl Default for ClosedLoopConfig {
    fn default() -> Self {
        Self {
            closed_loop_mode: false,
            gamma_v_min: 300_000,
            gamma_v_add: 600_000,
            gamma: 255,
            beta: 255,
            offset: 0,
            current_scaler_minimum: 100,
            current_scaler_maximum: 240,
            current_scaler_start_up: 0,
            upscale_delay: 1000,
            downscale_delay: 10000,
            correction_velocity_p: 10000,
            correction_velocity_i: 20,
            correction_velocity_i_clip: 10,
            correction_velocity_d_clk: 0,
            correction_velocity_d_clip: 1_073_741_823,
            position_correction_p: 65536,
            position_correction_tolerance: 100,
            position_window: 100,
            enc_v_mean_wait: 0,
            enc_v_mean_filter: 7,
            enc_v_mean_int: 500,
            encoder_correction_y_offset: 0,
        }
    }
}

// ─── CoolStep Config ────────────────────────────────────────────────

/// Per-axis coolStep thresholds and encoder mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolStepConfig {
    /// Scaler goes up while the load sample stays below this.
    pub lower_threshold: u16,
    /// Scaler goes down while the load sample stays above this.
    pub upper_threshold: u16,
    pub enabled: bool,
    /// Below this speed the slow-run current applies (0 = off).
    pub threshold_speed: i32,
    pub slow_run_current: u8,
    /// Added to the measured position [microsteps].
    pub closed_loop_position_offset: i32,
    /// Added to the raw encoder counts.
    pub encoder_offset: i32,
    pub gear_ratio: u16,
}

impl Default for CoolStepConfig {
    fn default() -> Self {
        Self {
            lower_threshold: 64,
            upper_threshold: 512,
            enabled: false,
            threshold_speed: 0,
            slow_run_current: 0,
            closed_loop_position_offset: 0,
            encoder_offset: 0,
            gear_ratio: 1,
        }
    }
}

// ─── Axis Config ────────────────────────────────────────────────────

/// All configuration of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub motor: MotorConfig,
    pub closed_loop: ClosedLoopConfig,
    pub cool_step: CoolStepConfig,
}

impl AxisConfig {
    /// Read a configuration parameter. `None` for runtime parameters.
    pub fn field(&self, param: AxisParam) -> Option<i32> {
        use AxisParam::*;
        let m = &self.motor;
        let c = &self.closed_loop;
        let s = &self.cool_step;
        let value = match param {
            MaxVelocity => m.max_velocity,
            AMax => m.a_max,
            RunCurrent => m.run_current as i32,
            StandbyCurrent => m.standby_current as i32,
            SwitchMode => m.switch_mode as i32,
            RampType => m.ramp_type as i32,
            AStart => m.a_start,
            DFinal => m.d_final,
            DMax => m.d_max,
            DStop => m.d_stop,
            MicrostepResolution => m.microstep_resolution as i32,
            StallVMin => m.stall_v_min,
            BoostCurrent => m.boost_current as i32,
            MotorResolution => m.motor_resolution as i32,
            FreewheelingDelay => m.freewheeling_delay as i32,
            EncoderResolution => m.encoder_resolution as i32,
            MaxPositionDeviation => m.max_position_deviation,
            MaxVelocityDeviation => m.max_velocity_deviation,
            SettingDelay => m.setting_delay as i32,
            StepDirMode => m.step_dir_mode as i32,
            UnitMode => m.unit_mode as i32,

            ClosedLoopMode => c.closed_loop_mode as i32,
            GammaVMin => c.gamma_v_min,
            GammaVAdd => c.gamma_v_add,
            Gamma => c.gamma as i32,
            Beta => c.beta as i32,
            Offset => c.offset,
            CurrentScalerMinimum => c.current_scaler_minimum as i32,
            CurrentScalerMaximum => c.current_scaler_maximum as i32,
            CurrentScalerStartUp => c.current_scaler_start_up as i32,
            UpscaleDelay => c.upscale_delay as i32,
            DownscaleDelay => c.downscale_delay as i32,
            CorrectionVelocityP => c.correction_velocity_p,
            CorrectionVelocityI => c.correction_velocity_i,
            CorrectionVelocityIClip => c.correction_velocity_i_clip,
            CorrectionVelocityDClk => c.correction_velocity_d_clk as i32,
            CorrectionVelocityDClip => c.correction_velocity_d_clip,
            PositionCorrectionP => c.position_correction_p,
            PositionCorrectionTolerance => c.position_correction_tolerance,
            PositionWindow => c.position_window,
            EncVMeanWait => c.enc_v_mean_wait as i32,
            EncVMeanFilter => c.enc_v_mean_filter as i32,
            EncVMeanInt => c.enc_v_mean_int as i32,
            EncoderCorrectionYOffset => c.encoder_correction_y_offset,

            CoolStepLowerThreshold => s.lower_threshold as i32,
            CoolStepUpperThreshold => s.upper_threshold as i32,
            CoolStepEnable => s.enabled as i32,
            ThresholdSpeed => s.threshold_speed,
            SlowRunCurrent => s.slow_run_current as i32,
            ClosedLoopPositionOffset => s.closed_loop_position_offset,
            EncoderOffset => s.encoder_offset,
            GearRatio => s.gear_ratio as i32,

            _ => return None,
        };
        Some(value)
    }

    /// Write a configuration parameter. The record is untouched on error.
    ///
    /// Besides the per-field bounds, the current scaler minimum may never
    /// exceed the maximum.
    pub fn set_field(&mut self, param: AxisParam, value: i32) -> Result<(), ConfigError> {
        use AxisParam::*;
        let id = param as u8;
        if matches!(param.group(), ParamGroup::Runtime) {
            return Err(ConfigError::UnknownField(id));
        }
        let v = check(id, value, param.bounds())?;
        let c = &self.closed_loop;
        let scaler_conflict = match param {
            CurrentScalerMinimum => v > c.current_scaler_maximum as i32,
            CurrentScalerMaximum => v < c.current_scaler_minimum as i32,
            _ => false,
        };
        if scaler_conflict {
            return Err(ConfigError::OutOfRange { field: id, value });
        }

        let m = &mut self.motor;
        let c = &mut self.closed_loop;
        let s = &mut self.cool_step;
        match param {
            MaxVelocity => m.max_velocity = v,
            AMax => m.a_max = v,
            RunCurrent => m.run_current = v as u8,
            StandbyCurrent => m.standby_current = v as u8,
            SwitchMode => m.switch_mode = v as u8,
            RampType => m.ramp_type = v as u8,
            AStart => m.a_start = v,
            DFinal => m.d_final = v,
            DMax => m.d_max = v,
            DStop => m.d_stop = v,
            MicrostepResolution => m.microstep_resolution = v as u8,
            StallVMin => m.stall_v_min = v,
            BoostCurrent => m.boost_current = v as u8,
            MotorResolution => m.motor_resolution = v as u16,
            FreewheelingDelay => m.freewheeling_delay = v as u16,
            EncoderResolution => m.encoder_resolution = v as u16,
            MaxPositionDeviation => m.max_position_deviation = v,
            MaxVelocityDeviation => m.max_velocity_deviation = v,
            SettingDelay => m.setting_delay = v as u16,
            StepDirMode => m.step_dir_mode = v as u8,
            UnitMode => m.unit_mode = v as u8,

            ClosedLoopMode => c.closed_loop_mode = v != 0,
            GammaVMin => c.gamma_v_min = v,
            GammaVAdd => c.gamma_v_add = v,
            Gamma => c.gamma = v as u16,
            Beta => c.beta = v as u16,
            Offset => c.offset = v,
            CurrentScalerMinimum => c.current_scaler_minimum = v as u8,
            CurrentScalerMaximum => c.current_scaler_maximum = v as u8,
            CurrentScalerStartUp => c.current_scaler_start_up = v as u8,
            UpscaleDelay => c.upscale_delay = v as u32,
            DownscaleDelay => c.downscale_delay = v as u32,
            CorrectionVelocityP => c.correction_velocity_p = v,
            CorrectionVelocityI => c.correction_velocity_i = v,
            CorrectionVelocityIClip => c.correction_velocity_i_clip = v,
            CorrectionVelocityDClk => c.correction_velocity_d_clk = v as u16,
            CorrectionVelocityDClip => c.correction_velocity_d_clip = v,
            PositionCorrectionP => c.position_correction_p = v,
            PositionCorrectionTolerance => c.position_correction_tolerance = v,
            PositionWindow => c.position_window = v,
            EncVMeanWait => c.enc_v_mean_wait = v as u8,
            EncVMeanFilter => c.enc_v_mean_filter = v as u8,
            EncVMeanInt => c.enc_v_mean_int = v as u16,
            EncoderCorrectionYOffset => c.encoder_correction_y_offset = v,

            CoolStepLowerThreshold => s.lower_threshold = v as u16,
            CoolStepUpperThreshold => s.upper_threshold = v as u16,
            CoolStepEnable => s.enabled = v != 0,
            ThresholdSpeed => s.threshold_speed = v,
            SlowRunCurrent => s.slow_run_current = v as u8,
            ClosedLoopPositionOffset => s.closed_loop_position_offset = v,
            EncoderOffset => s.encoder_offset = v,
            GearRatio => s.gear_ratio = v as u16,

            _ => return Err(ConfigError::UnknownField(id)),
        }
        Ok(())
    }

    /// Validate every field against the axis parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for &param in AxisParam::ALL {
            if let (Some(value), Some(range)) = (self.field(param), param.bounds()) {
                if !range.contains(&value) {
                    return Err(ConfigError::OutOfRange {
                        field: param as u8,
                        value,
                    });
                }
            }
        }
        let c = &self.closed_loop;
        if c.current_scaler_minimum > c.current_scaler_maximum {
            return Err(ConfigError::OutOfRange {
                field: AxisParam::CurrentScalerMinimum as u8,
                value: c.current_scaler_minimum as i32,
            });
        }
        Ok(())
    }
}

// ─── Machine Config (TOML) ──────────────────────────────────────────

/// Machine description loaded by the simulation runner.
///
/// # TOML Example
///
/// ```toml
/// axis_count = 2
/// tick_period = 1
///
/// [module]
/// module_address = 3
///
/// [[axes]]
/// [axes.closed_loop]
/// closed_loop_mode = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub log_level: LogLevel,
    /// Number of driven axes (1..=MAX_AXES).
    pub axis_count: u8,
    /// Scheduler tick period [timer units].
    pub tick_period: u32,
    pub module: ModuleConfig,
    /// Per-axis overrides; axes beyond the list keep compiled defaults.
    pub axes: Vec<AxisConfig>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            axis_count: DEFAULT_AXIS_COUNT,
            tick_period: DEFAULT_TICK_PERIOD,
            module: ModuleConfig::default(),
            axes: Vec::new(),
        }
    }
}

impl MachineConfig {
    /// Validate parameter bounds and axis list consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.axis_count == 0 || self.axis_count as usize > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "axis_count {} out of range [1, {}]",
                self.axis_count, MAX_AXES
            )));
        }
        if self.axes.len() > self.axis_count as usize {
            return Err(ConfigError::ValidationError(format!(
                "{} axis sections for {} axes",
                self.axes.len(),
                self.axis_count
            )));
        }
        if self.tick_period == 0 {
            return Err(ConfigError::ValidationError(
                "tick_period must be at least 1".to_string(),
            ));
        }
        self.module.validate()?;
        for (i, axis) in self.axes.iter().enumerate() {
            axis.validate().map_err(|e| {
                ConfigError::ValidationError(format!("axis {i}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Configuration of axis `index`, falling back to compiled defaults.
    pub fn axis(&self, index: usize) -> AxisConfig {
        self.axes.get(index).copied().unwrap_or_default()
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
