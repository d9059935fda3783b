//! Host-side stand-ins for the hardware: clock, driver/encoder plant and a
//! scripted command source.
//!
//! The plant follows the ramp generator ideally except for an injectable
//! encoder slip; position corrections from the corrector pull the slip back.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use heapless::Vec;
use thiserror::Error;
use tracing::info;

use rocker_common::axis::AxisId;
use rocker_common::config::{AxisConfig, MotorConfig};
use rocker_common::consts::{MAX_AXES, MAX_VELOCITY};
use rocker_common::error::DriverFlags;
use rocker_common::hal::{AxisOutput, AxisSample, MonotonicClock, MotionCommand, MotorDriver};
use rocker_common::protocol::{DATAGRAM_LEN, Datagram};

use crate::config::ConfigStore;
use crate::control::encoder::EncoderScale;

// ─── Clock ──────────────────────────────────────────────────────────

/// Hand-driven timer shared between a test and the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u32>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: u32) {
        self.0.set(now);
    }

    pub fn advance(&self, units: u32) {
        self.0.set(self.0.get().wrapping_add(units));
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> u32 {
        self.0.get()
    }
}

// ─── Driver / Plant ─────────────────────────────────────────────────

/// Simulated state of one axis.
#[derive(Debug, Clone, Copy)]
struct SimAxis {
    /// Ramp position [1/1000 microstep].
    position_milli: i64,
    /// Ramp velocity [microsteps/s].
    velocity: i32,
    /// Encoder minus ramp position [microsteps].
    slip: i32,
    load: u16,
    driver_flags: DriverFlags,
    scale: EncoderScale,
    last_output: AxisOutput,
}

impl SimAxis {
    fn position(&self) -> i32 {
        (self.position_milli / 1000) as i32
    }

    /// Advance the ramp by `dt_ms`.
    fn step(&mut self, output: &AxisOutput, motor: &MotorConfig, dt_ms: i64) {
        let accel = (motor.a_max as i64 * dt_ms / 1000).max(1);
        let decel = (motor.d_max as i64 * dt_ms / 1000).max(1);
        let v = self.velocity as i64;

        let wanted: i64 = if !output.enabled {
            0
        } else {
            match output.motion {
                MotionCommand::Stop => 0,
                MotionCommand::Rotate(v) => v as i64,
                MotionCommand::MoveTo(target) => {
                    let dist = target as i64 - self.position() as i64;
                    let braking = v * v / (2 * motor.d_max.max(1) as i64);
                    if dist == 0 || dist.abs() <= braking {
                        0
                    } else {
                        dist.signum() * motor.max_velocity.clamp(1, MAX_VELOCITY) as i64
                    }
                }
            }
        };

        let speeding_up = wanted.abs() > v.abs() && (v == 0 || wanted.signum() == v.signum());
        let rate = if speeding_up { accel } else { decel };
        let next = if wanted > v {
            (v + rate).min(wanted)
        } else {
            (v - rate).max(wanted)
        };

        let mut position = self.position_milli + next * dt_ms;
        let mut velocity = next;
        if let MotionCommand::MoveTo(target) = output.motion {
            let target_milli = target as i64 * 1000;
            let before = self.position_milli - target_milli;
            let after = position - target_milli;
            // Reached or crossed the target this step, or crawling into it.
            if before.signum() != after.signum() || (wanted == 0 && (after.abs() < 1000)) {
                position = target_milli;
                velocity = 0;
            }
        }
        self.position_milli = position;
        self.velocity = velocity as i32;
    }
}

/// Simulated driver stage, ramp generator and encoder for every axis.
#[derive(Debug, Clone)]
pub struct SimDriver {
    axes: Vec<SimAxis, MAX_AXES>,
    /// Simulated time per `apply` [ms].
    tick_ms: u32,
}

impl SimDriver {
    /// Plant matching the encoder scale of each configured axis.
    pub fn new(store: &ConfigStore) -> Self {
        let mut axes = Vec::new();
        for axis in AxisId::all(store.axis_count()) {
            let _ = axes.push(SimAxis {
                position_milli: 0,
                velocity: 0,
                slip: 0,
                load: 0,
                driver_flags: DriverFlags::empty(),
                scale: EncoderScale::from_config(&store.get(axis)),
                last_output: AxisOutput::default(),
            });
        }
        Self { axes, tick_ms: 1 }
    }

    /// Advance `ms` of simulated time per tick.
    pub fn with_tick_period(mut self, ms: u32) -> Self {
        self.tick_ms = ms.max(1);
        self
    }

    /// Ramp position [microsteps].
    pub fn position(&self, axis: AxisId) -> i32 {
        self.axes[axis.index()].position()
    }

    /// Ramp velocity [microsteps/s].
    pub fn velocity(&self, axis: AxisId) -> i32 {
        self.axes[axis.index()].velocity
    }

    /// Current encoder slip [microsteps].
    pub fn slip(&self, axis: AxisId) -> i32 {
        self.axes[axis.index()].slip
    }

    /// Output applied in the last tick.
    pub fn last_output(&self, axis: AxisId) -> AxisOutput {
        self.axes[axis.index()].last_output
    }

    /// Set the load sample reported from now on.
    pub fn set_load(&mut self, axis: AxisId, load: u16) {
        self.axes[axis.index()].load = load.min(1023);
    }

    /// Set the driver status byte reported from now on.
    pub fn set_driver_flags(&mut self, axis: AxisId, flags: DriverFlags) {
        self.axes[axis.index()].driver_flags = flags;
    }

    /// Shift the encoder against the ramp, as a lost step would.
    pub fn inject_slip(&mut self, axis: AxisId, microsteps: i32) {
        let a = &mut self.axes[axis.index()];
        a.slip = a.slip.saturating_add(microsteps);
    }
}

impl MotorDriver for SimDriver {
    fn sample(&mut self, axis: AxisId, cfg: &AxisConfig) -> AxisSample {
        let a = &mut self.axes[axis.index()];
        a.scale = EncoderScale::from_config(cfg);
        let position = a.position();
        AxisSample {
            commanded_position: position,
            commanded_velocity: a.velocity,
            encoder_position: a.scale.counts_for_position(position.saturating_add(a.slip)),
            encoder_velocity: a.scale.counts_for_velocity(a.velocity),
            load: a.load,
            driver_flags: a.driver_flags,
        }
    }

    fn apply(&mut self, axis: AxisId, output: &AxisOutput, cfg: &AxisConfig) {
        let dt = self.tick_ms as i64;
        let a = &mut self.axes[axis.index()];
        a.last_output = *output;
        a.slip = a.slip.saturating_add(output.position_correction);
        a.scale = EncoderScale::from_config(cfg);
        a.step(output, &cfg.motor, dt);
    }
}

// ─── Command Script ─────────────────────────────────────────────────

/// Script parsing failure.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
}

/// One scripted frame and the tick it is due at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptEntry {
    pub tick: u32,
    pub frame: Datagram,
}

/// Parse a command script.
///
/// One frame per line: `<tick> <bytes>`, bytes in hex, either separated or
/// as one run. Eight bytes get the checksum appended; nine are taken as is,
/// so broken checksums can be scripted. `#` starts a comment. Entries are
/// returned in tick order, file order within a tick.
pub fn parse_script(text: &str) -> Result<std::vec::Vec<ScriptEntry>, ScriptError> {
    let mut entries = std::vec::Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let syntax = |reason: String| ScriptError::Syntax { line: i + 1, reason };

        let mut tokens = line.split_whitespace();
        let tick = tokens
            .next()
            .and_then(|t| t.parse::<u32>().ok())
            .ok_or_else(|| syntax("expected tick number".into()))?;

        let hex: String = tokens.collect();
        if hex.len() % 2 != 0 {
            return Err(syntax(format!("odd number of hex digits in '{hex}'")));
        }
        let mut bytes = std::vec::Vec::with_capacity(DATAGRAM_LEN);
        for pair in hex.as_bytes().chunks(2) {
            let digits = std::str::from_utf8(pair).map_err(|e| syntax(e.to_string()))?;
            let byte = u8::from_str_radix(digits, 16)
                .map_err(|_| syntax(format!("invalid hex byte '{digits}'")))?;
            bytes.push(byte);
        }

        let frame = match bytes.len() {
            n if n == DATAGRAM_LEN - 1 => {
                let mut head = [0u8; DATAGRAM_LEN - 1];
                head.copy_from_slice(&bytes);
                Datagram::with_checksum(head)
            }
            DATAGRAM_LEN => {
                let mut full = [0u8; DATAGRAM_LEN];
                full.copy_from_slice(&bytes);
                Datagram(full)
            }
            n => return Err(syntax(format!("expected 8 or 9 bytes, got {n}"))),
        };
        entries.push(ScriptEntry { tick, frame });
    }
    entries.sort_by_key(|e| e.tick);
    Ok(entries)
}

/// Read and parse a script file.
pub fn load_script(path: &Path) -> Result<std::vec::Vec<ScriptEntry>, ScriptError> {
    let text = std::fs::read_to_string(path)?;
    let entries = parse_script(&text)?;
    info!(path = %path.display(), frames = entries.len(), "command script loaded");
    Ok(entries)
}

/// Hands out script entries as their tick comes due.
#[derive(Debug, Clone, Default)]
pub struct ScriptFeeder {
    entries: std::vec::Vec<ScriptEntry>,
    next: usize,
}

impl ScriptFeeder {
    pub fn new(entries: std::vec::Vec<ScriptEntry>) -> Self {
        Self { entries, next: 0 }
    }

    /// Entries due at or before `tick` that were not handed out yet.
    pub fn due(&mut self, tick: u32) -> &[ScriptEntry] {
        let start = self.next;
        while self.next < self.entries.len() && self.entries[self.next].tick <= tick {
            self.next += 1;
        }
        &self.entries[start..self.next]
    }

    pub fn is_done(&self) -> bool {
        self.next >= self.entries.len()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
