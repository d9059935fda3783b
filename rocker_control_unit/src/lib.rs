//! # Rocker Control Unit Library
//!
//! Closed-loop motion core for stepper axes. A fixed-period scheduler drains
//! inbound command frames through the dispatcher, then runs the closed-loop
//! corrector, the coolStep current regulator and the stall detector for every
//! axis and hands the result to the motor driver.
//!
//! ## Tick Order
//!
//! 1. Drain at most `MAX_FRAMES_PER_TICK` frames: decode, dispatch, reply.
//! 2. Per axis in index order: sample → corrector → regulator → stall → apply.
//! 3. Toggle the heartbeat once `HEARTBEAT_PERIOD` timer units passed.
//!
//! ## Zero-Allocation Tick
//!
//! Per-axis state lives in fixed-capacity `heapless` collections allocated at
//! startup. Frames reach the tick through a bounded SPSC queue.

pub mod command;
pub mod config;
pub mod control;
pub mod cycle;
pub mod regulation;
pub mod sim;
pub mod state;
pub mod transport;
