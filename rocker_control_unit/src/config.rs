//! Configuration store and machine file loading.
//!
//! [`ConfigStore`] owns every configuration record of the module: one
//! `ModuleConfig` and one `AxisConfig` per active axis. Readers get copies;
//! writes go through the parameter bounds and leave the record untouched on
//! error. [`load_config`] builds a store from a `rocker.toml` machine file.

use std::path::Path;

use heapless::Vec;
use tracing::info;

use rocker_common::axis::AxisId;
use rocker_common::config::{
    AxisConfig, ConfigError, ConfigLoader, LogLevel, MachineConfig, ModuleConfig,
};
use rocker_common::consts::MAX_AXES;
use rocker_common::params::{AxisParam, GlobalParam};

// ─── Config Store ───────────────────────────────────────────────────

/// Single owner of module and axis configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigStore {
    module: ModuleConfig,
    axes: Vec<AxisConfig, MAX_AXES>,
}

impl ConfigStore {
    /// Store with compiled defaults for `axis_count` axes.
    pub fn new(axis_count: u8) -> Result<Self, ConfigError> {
        Self::from_machine(&MachineConfig {
            axis_count,
            ..Default::default()
        })
    }

    /// Store built from a validated machine description.
    pub fn from_machine(machine: &MachineConfig) -> Result<Self, ConfigError> {
        machine.validate()?;
        let mut axes = Vec::new();
        for i in 0..machine.axis_count as usize {
            axes.push(machine.axis(i)).map_err(|_| {
                ConfigError::ValidationError(format!("more than {MAX_AXES} axes"))
            })?;
        }
        Ok(Self {
            module: machine.module,
            axes,
        })
    }

    /// Number of active axes.
    #[inline]
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Snapshot of one axis configuration.
    #[inline]
    pub fn get(&self, axis: AxisId) -> AxisConfig {
        self.axes[axis.index()]
    }

    /// Write one axis configuration field.
    pub fn set_field(&mut self, axis: AxisId, param: AxisParam, value: i32) -> Result<(), ConfigError> {
        self.axes[axis.index()].set_field(param, value)
    }

    /// Snapshot of the module configuration.
    #[inline]
    pub fn module(&self) -> ModuleConfig {
        self.module
    }

    /// Write one global parameter.
    pub fn set_global(&mut self, param: GlobalParam, value: i32) -> Result<(), ConfigError> {
        self.module.set_global(param, value)
    }

    /// Restore compiled defaults on every axis. Module settings are kept.
    pub fn reset_axes(&mut self) {
        for axis in self.axes.iter_mut() {
            *axis = AxisConfig::default();
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        let mut axes = Vec::new();
        let _ = axes.push(AxisConfig::default());
        Self {
            module: ModuleConfig::default(),
            axes,
        }
    }
}

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Validated configuration, ready for the scheduler.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub log_level: LogLevel,
    /// Scheduler tick period [timer units].
    pub tick_period: u32,
    pub store: ConfigStore,
}

impl Default for LoadedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            tick_period: MachineConfig::default().tick_period,
            store: ConfigStore::default(),
        }
    }
}

impl LoadedConfig {
    fn from_machine(machine: &MachineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: machine.log_level,
            tick_period: machine.tick_period,
            store: ConfigStore::from_machine(machine)?,
        })
    }
}

/// Load and validate a machine file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let machine = MachineConfig::load(path)?;
    let loaded = LoadedConfig::from_machine(&machine)?;
    info!(
        path = %path.display(),
        axes = loaded.store.axis_count(),
        tick_period = loaded.tick_period,
        "configuration loaded"
    );
    Ok(loaded)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(toml_str: &str) -> Result<LoadedConfig, ConfigError> {
    let machine: MachineConfig =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    LoadedConfig::from_machine(&machine)
}
