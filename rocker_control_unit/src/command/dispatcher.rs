//! Request dispatcher.
//!
//! Executes one decoded [`Request`] against [`RuntimeState`] and builds the
//! reply. Requests for another address are ignored without reply; every
//! other request gets exactly one reply. A rejected request never mutates
//! state, and writes are applied before the reply is built.
//!
//! | instr | name | notes |
//! |-------|------|-------|
//! | 1/2 | ROR/ROL | `abs(value) <= MAX_VELOCITY`, sets VMaxModified |
//! | 3 | MST | stop and hold |
//! | 4 | MVP | type 0 absolute, 1 relative; clears VMaxModified |
//! | 5/6 | SAP/GAP | axis parameters |
//! | 9/10 | SGP/GGP | global parameters, bank 0 |
//! | 136 | version | type 0 text, type 1 binary |
//! | 137 | restore defaults | value must be 1234 |

use tracing::{debug, info};

use rocker_common::axis::AxisId;
use rocker_common::config::ModuleConfig;
use rocker_common::consts::{MAX_VELOCITY, RESTORE_DEFAULTS_KEY, VERSION_BINARY, VERSION_STRING};
use rocker_common::error::DispatchError;
use rocker_common::hal::MotionCommand;
use rocker_common::params::{Access, AxisParam, GlobalParam};
use rocker_common::protocol::{Instruction, Reply, Request, Status};

use crate::cycle::RuntimeState;

/// MVP sub-modes.
const MOVE_ABSOLUTE: u8 = 0;
const MOVE_RELATIVE: u8 = 1;

/// GetVersion sub-modes.
const VERSION_TYPE_TEXT: u8 = 0;
const VERSION_TYPE_BINARY: u8 = 1;

/// Successful result of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Value(i32),
    /// Replaces the whole reply layout.
    Text([u8; 8]),
}

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Requests answered with `Ok`.
    pub accepted: u64,
    /// Requests answered with an error status.
    pub rejected: u64,
    /// Requests for another address.
    pub ignored: u64,
}

/// Whether a request address selects this module.
#[inline]
pub fn is_addressed(address: u8, module: &ModuleConfig) -> bool {
    address == module.module_address
        || (module.secondary_id != 0 && address as u16 == module.secondary_id)
}

/// Stateless executor plus counters.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Execute `req`. Returns `None` when the request is not for us.
    pub fn dispatch(&mut self, req: &Request, state: &mut RuntimeState) -> Option<Reply> {
        if !is_addressed(req.address, &state.config.module()) {
            self.stats.ignored += 1;
            debug!(address = req.address, "request for another module ignored");
            return None;
        }

        let (status, value, text) = match execute(req, state) {
            Ok(Answer::Value(value)) => {
                self.stats.accepted += 1;
                (Status::Ok, value, None)
            }
            Ok(Answer::Text(text)) => {
                self.stats.accepted += 1;
                (Status::Ok, 0, Some(text))
            }
            Err(err) => {
                self.stats.rejected += 1;
                debug!(instruction = req.instruction, kind = req.kind, axis = req.axis, %err, "request rejected");
                (Status::from(err), req.value, None)
            }
        };

        let module = state.config.module();
        Some(Reply {
            host_address: module.host_address,
            module_address: module.module_address,
            status,
            instruction: req.instruction,
            value,
            text,
        })
    }
}

fn axis_of(req: &Request, state: &RuntimeState) -> Result<AxisId, DispatchError> {
    state.axis_id(req.axis).ok_or(DispatchError::InvalidAxis(req.axis))
}

fn ensure_motion_allowed(state: &RuntimeState, axis: AxisId) -> Result<(), DispatchError> {
    let unit = state.axis(axis);
    if unit.runtime.motor_disabled || unit.corrector.is_faulted() {
        return Err(DispatchError::MotorDisabled);
    }
    Ok(())
}

fn global_param(req: &Request) -> Result<GlobalParam, DispatchError> {
    if req.axis != 0 {
        return Err(DispatchError::InvalidAxis(req.axis));
    }
    GlobalParam::from_u8(req.kind).ok_or(DispatchError::InvalidType(req.kind))
}

fn execute(req: &Request, state: &mut RuntimeState) -> Result<Answer, DispatchError> {
    let instruction =
        Instruction::from_u8(req.instruction).ok_or(DispatchError::InvalidInstruction(req.instruction))?;

    if instruction == Instruction::GetVersion {
        return match req.kind {
            VERSION_TYPE_TEXT => Ok(Answer::Text(VERSION_STRING)),
            VERSION_TYPE_BINARY => Ok(Answer::Value(VERSION_BINARY)),
            other => Err(DispatchError::InvalidType(other)),
        };
    }
    execute_value(instruction, req, state).map(Answer::Value)
}

fn execute_value(
    instruction: Instruction,
    req: &Request,
    state: &mut RuntimeState,
) -> Result<i32, DispatchError> {
    match instruction {
        Instruction::RotateRight | Instruction::RotateLeft => {
            let axis = axis_of(req, state)?;
            let speed = req.value.unsigned_abs();
            if speed > MAX_VELOCITY as u32 {
                return Err(DispatchError::InvalidValue);
            }
            ensure_motion_allowed(state, axis)?;
            let velocity = if instruction == Instruction::RotateRight {
                speed as i32
            } else {
                -(speed as i32)
            };
            let rt = &mut state.axis_mut(axis).runtime;
            rt.motion = MotionCommand::Rotate(velocity);
            rt.target_velocity = velocity;
            rt.vmax_modified = true;
            Ok(req.value)
        }

        Instruction::MotorStop => {
            let axis = axis_of(req, state)?;
            state.axis_mut(axis).runtime.stop();
            Ok(req.value)
        }

        Instruction::MoveTo => {
            let axis = axis_of(req, state)?;
            let base = match req.kind {
                MOVE_ABSOLUTE => 0,
                MOVE_RELATIVE => state.axis(axis).runtime.target_position,
                other => return Err(DispatchError::InvalidType(other)),
            };
            ensure_motion_allowed(state, axis)?;
            let target = base.saturating_add(req.value);
            let max_velocity = state.config.get(axis).motor.max_velocity;
            let rt = &mut state.axis_mut(axis).runtime;
            // Signed toward the target; zero when already there.
            let direction = (target as i64 - rt.actual_position as i64).signum() as i32;
            rt.motion = MotionCommand::MoveTo(target);
            rt.target_position = target;
            rt.target_velocity = max_velocity * direction;
            rt.vmax_modified = false;
            Ok(target)
        }

        Instruction::SetAxisParameter => {
            let axis = axis_of(req, state)?;
            let param = AxisParam::from_u8(req.kind).ok_or(DispatchError::InvalidType(req.kind))?;
            if param.access() == Access::ReadOnly {
                return Err(DispatchError::InvalidType(req.kind));
            }
            if param.is_config() {
                state.config.set_field(axis, param, req.value)?;
                if matches!(
                    param,
                    AxisParam::CurrentScalerMinimum | AxisParam::CurrentScalerMaximum
                ) {
                    let cl = state.config.get(axis).closed_loop;
                    state.axis_mut(axis).regulator.clamp(&cl);
                }
            } else {
                set_runtime(state, axis, param, req.value)?;
            }
            Ok(req.value)
        }

        Instruction::GetAxisParameter => {
            let axis = axis_of(req, state)?;
            let param = AxisParam::from_u8(req.kind).ok_or(DispatchError::InvalidType(req.kind))?;
            let value = if param.is_config() {
                state.config.get(axis).field(param)
            } else {
                state.axis(axis).param(param)
            };
            value.ok_or(DispatchError::InvalidType(req.kind))
        }

        Instruction::SetGlobalParameter => {
            let param = global_param(req)?;
            if param.access() == Access::ReadOnly {
                return Err(DispatchError::InvalidType(req.kind));
            }
            state.config.set_global(param, req.value)?;
            Ok(req.value)
        }

        Instruction::GetGlobalParameter => {
            let param = global_param(req)?;
            match param {
                GlobalParam::TickTimer => Ok(state.tick_count as i32),
                _ => state
                    .config
                    .module()
                    .global(param)
                    .ok_or(DispatchError::InvalidType(req.kind)),
            }
        }

        // Answered in `execute`.
        Instruction::GetVersion => Ok(VERSION_BINARY),

        Instruction::RestoreDefaults => {
            if req.value != RESTORE_DEFAULTS_KEY {
                return Err(DispatchError::InvalidValue);
            }
            state.config.reset_axes();
            for axis in AxisId::all(state.config.axis_count()) {
                let cl = state.config.get(axis).closed_loop;
                state.axis_mut(axis).regulator.clamp(&cl);
            }
            info!("axis configuration restored to defaults");
            Ok(req.value)
        }
    }
}

/// Write a runtime parameter.
fn set_runtime(
    state: &mut RuntimeState,
    axis: AxisId,
    param: AxisParam,
    value: i32,
) -> Result<(), DispatchError> {
    let in_bounds = param.bounds().is_some_and(|r| r.contains(&value));
    match param {
        AxisParam::MotorDisable if in_bounds => {
            let rt = &mut state.axis_mut(axis).runtime;
            rt.motor_disabled = value != 0;
            if rt.motor_disabled {
                rt.stop();
            }
            info!(%axis, disabled = rt.motor_disabled, "motor enable changed");
            Ok(())
        }
        AxisParam::DeviationFlag if in_bounds => {
            let cl = state.config.get(axis).closed_loop;
            state.axis_mut(axis).corrector.reenable(axis, &cl);
            Ok(())
        }
        AxisParam::MotorDisable | AxisParam::DeviationFlag => Err(DispatchError::InvalidValue),
        _ => Err(DispatchError::InvalidType(param as u8)),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
