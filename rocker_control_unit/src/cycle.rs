//! Fixed-period scheduler: frames → dispatcher, then axes, then heartbeat.
//!
//! ## Tick Body
//! 1. Drain at most `MAX_FRAMES_PER_TICK` inbound frames: decode, dispatch,
//!    send the reply. Undecodable frames are dropped silently.
//! 2. For each axis in index order: sample driver → corrector → regulator →
//!    stall detector → apply output.
//! 3. Toggle the heartbeat when more than `HEARTBEAT_PERIOD` timer units
//!    passed since the last toggle.
//!
//! ## Pacing
//! [`Scheduler::poll`] runs a tick once `tick_period` timer units elapsed.
//! [`Scheduler::run`] sleeps between polls: `std::thread::sleep` in
//! simulation, `clock_nanosleep(TIMER_ABSTIME)` under the `rt` feature.
//!
//! ## RT Setup
//! `mlockall`, stack prefault, `sched_setaffinity`, `SCHED_FIFO`. All no-ops
//! without the `rt` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use heapless::Vec;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use rocker_common::axis::AxisId;
use rocker_common::config::ConfigError;
use rocker_common::consts::{HEARTBEAT_PERIOD, MAX_AXES, MAX_FRAMES_PER_TICK};
use rocker_common::hal::{Heartbeat, MonotonicClock, MotorDriver};
use rocker_common::protocol::WireFrame;

use crate::command::dispatcher::{DispatchStats, Dispatcher};
use crate::config::ConfigStore;
use crate::state::axis::{AxisSnapshot, AxisUnit};
use crate::transport::Transport;

/// Nanoseconds per timer unit (1 ms).
const NS_PER_TIMER_UNIT: i64 = 1_000_000;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks measured.
    pub cycle_count: u64,
    /// Last tick duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Ticks that took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a tick duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average tick time [ns] (0 if nothing recorded).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }

    fn summary(&self) -> CycleSummary {
        CycleSummary {
            count: self.cycle_count,
            avg_ns: self.avg_cycle_ns(),
            min_ns: if self.cycle_count == 0 { 0 } else { self.min_cycle_ns },
            max_ns: self.max_cycle_ns,
            overruns: self.overruns,
            max_latency_ns: self.max_latency_ns,
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Runtime State ──────────────────────────────────────────────────

/// Everything the dispatcher and the axis pipeline mutate.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub config: ConfigStore,
    pub axes: Vec<AxisUnit, MAX_AXES>,
    /// Ticks executed since start (wraps).
    pub tick_count: u32,
}

impl RuntimeState {
    /// One axis unit per configured axis, initialised from its config.
    pub fn new(config: ConfigStore) -> Self {
        let mut axes = Vec::new();
        for axis in AxisId::all(config.axis_count()) {
            // Cannot fail: the store holds at most MAX_AXES axes.
            let _ = axes.push(AxisUnit::new(&config.get(axis)));
        }
        Self {
            config,
            axes,
            tick_count: 0,
        }
    }

    /// Validate a raw axis byte against the active axis count.
    #[inline]
    pub fn axis_id(&self, raw: u8) -> Option<AxisId> {
        AxisId::new(raw, self.axes.len())
    }

    #[inline]
    pub fn axis(&self, axis: AxisId) -> &AxisUnit {
        &self.axes[axis.index()]
    }

    #[inline]
    pub fn axis_mut(&mut self, axis: AxisId) -> &mut AxisUnit {
        &mut self.axes[axis.index()]
    }
}

// ─── Tick Report ────────────────────────────────────────────────────

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Frames taken from the transport.
    pub received: u32,
    /// Frames that failed to decode (checksum, CAN filter, length).
    pub rejected: u32,
    /// Requests for another module address.
    pub ignored: u32,
    pub replies: u32,
    pub send_failures: u32,
    /// Transport overflow counter (cumulative).
    pub queue_dropped: u32,
    pub heartbeat: bool,
    /// Deviation faults latched this tick.
    pub faults: u32,
    /// Axes stopped on stall this tick.
    pub stall_stops: u32,
}

/// Counters accumulated over all ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameTotals {
    pub received: u64,
    pub rejected: u64,
    pub ignored: u64,
    pub replies: u64,
    pub send_failures: u64,
    pub queue_dropped: u32,
    pub heartbeats: u64,
    pub faults: u64,
    pub stall_stops: u64,
}

impl FrameTotals {
    fn add(&mut self, tick: &TickReport) {
        self.received += tick.received as u64;
        self.rejected += tick.rejected as u64;
        self.ignored += tick.ignored as u64;
        self.replies += tick.replies as u64;
        self.send_failures += tick.send_failures as u64;
        self.queue_dropped = tick.queue_dropped;
        self.heartbeats += tick.heartbeat as u64;
        self.faults += tick.faults as u64;
        self.stall_stops += tick.stall_stops as u64;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub count: u64,
    pub avg_ns: i64,
    pub min_ns: i64,
    pub max_ns: i64,
    pub overruns: u64,
    pub max_latency_ns: i64,
}

/// Final status rendered by the runner (`--report`).
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub tick_count: u32,
    pub cycles: CycleSummary,
    pub frames: FrameTotals,
    pub accepted: u64,
    pub axes: std::vec::Vec<AxisSnapshot>,
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during RT setup or scheduler construction.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("RT setup error: {0}")]
    RtSetup(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop never faults on it.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the current thread to `cpu`.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

/// Switch to SCHED_FIFO at `priority`.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup sequence. Call once before [`Scheduler::run`].
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Clock ──────────────────────────────────────────────────────────

/// Wall clock in milliseconds since construction, wrapping at `u32::MAX`.
#[derive(Debug, Clone, Copy)]
pub struct InstantClock {
    origin: Instant,
}

impl InstantClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for InstantClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for InstantClock {
    fn now(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

/// Owns the runtime state and the hardware capabilities.
pub struct Scheduler<T, D, C, H> {
    state: RuntimeState,
    dispatcher: Dispatcher,
    transport: T,
    driver: D,
    clock: C,
    heartbeat: H,
    /// Tick period [timer units], at least 1.
    tick_period: u32,
    last_tick: u32,
    last_heartbeat: u32,
    stats: CycleStats,
    totals: FrameTotals,
}

impl<T, D, C, H> Scheduler<T, D, C, H>
where
    T: Transport,
    D: MotorDriver,
    C: MonotonicClock,
    H: Heartbeat,
{
    pub fn new(
        config: ConfigStore,
        tick_period: u32,
        transport: T,
        driver: D,
        clock: C,
        heartbeat: H,
    ) -> Self {
        let now = clock.now();
        info!(
            axes = config.axis_count(),
            tick_period, "scheduler initialised"
        );
        Self {
            state: RuntimeState::new(config),
            dispatcher: Dispatcher::new(),
            transport,
            driver,
            clock,
            heartbeat,
            tick_period: tick_period.max(1),
            last_tick: now,
            last_heartbeat: now,
            stats: CycleStats::new(),
            totals: FrameTotals::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut RuntimeState {
        &mut self.state
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    #[inline]
    pub fn heartbeat(&self) -> &H {
        &self.heartbeat
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    #[inline]
    pub fn totals(&self) -> FrameTotals {
        self.totals
    }

    #[inline]
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Run a tick if a full period elapsed since the last one.
    pub fn poll(&mut self) -> Option<TickReport> {
        let now = self.clock.now();
        if now.wrapping_sub(self.last_tick) < self.tick_period {
            return None;
        }
        self.last_tick = now;
        Some(self.tick(now))
    }

    /// Execute one tick at timer value `now`.
    pub fn tick(&mut self, now: u32) -> TickReport {
        let mut report = TickReport::default();
        self.state.tick_count = self.state.tick_count.wrapping_add(1);

        // ── Frames ──────────────────────────────────────────────
        for _ in 0..MAX_FRAMES_PER_TICK {
            let Some(frame) = self.transport.try_receive() else {
                break;
            };
            report.received += 1;
            self.handle_frame(&frame, &mut report);
        }
        report.queue_dropped = self.transport.dropped_frames();

        // ── Axes ────────────────────────────────────────────────
        for axis in AxisId::all(self.state.axes.len()) {
            let cfg = self.state.config.get(axis);
            let sample = self.driver.sample(axis, &cfg);
            let step = self.state.axes[axis.index()].update(axis, &cfg, &sample);
            self.driver.apply(axis, &step.output, &cfg);
            report.faults += step.fault_raised as u32;
            report.stall_stops += step.stall_stop as u32;
        }

        // ── Heartbeat ───────────────────────────────────────────
        if now.wrapping_sub(self.last_heartbeat) > HEARTBEAT_PERIOD {
            self.heartbeat.toggle();
            self.last_heartbeat = now;
            report.heartbeat = true;
        }

        self.totals.add(&report);
        report
    }

    fn handle_frame(&mut self, frame: &T::Frame, report: &mut TickReport) {
        let request = match frame.decode(&self.state.config.module()) {
            Ok(request) => request,
            Err(err) => {
                report.rejected += 1;
                debug!(%err, "frame dropped");
                return;
            }
        };
        let Some(reply) = self.dispatcher.dispatch(&request, &mut self.state) else {
            report.ignored += 1;
            return;
        };
        let out = T::Frame::encode_reply(&reply, &self.state.config.module());
        match self.transport.send(&out) {
            Ok(()) => report.replies += 1,
            Err(err) => {
                report.send_failures += 1;
                warn!(%err, instruction = reply.instruction, "reply not sent");
            }
        }
    }

    /// Serializable summary of the scheduler and every axis.
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            tick_count: self.state.tick_count,
            cycles: self.stats.summary(),
            frames: self.totals,
            accepted: self.dispatcher.stats().accepted,
            axes: AxisId::all(self.state.axes.len())
                .map(|axis| self.state.axis(axis).snapshot(axis))
                .collect(),
        }
    }

    fn finished(&self, running: &AtomicBool, max_ticks: Option<u64>) -> bool {
        !running.load(Ordering::SeqCst)
            || max_ticks.is_some_and(|max| self.stats.cycle_count >= max)
    }

    /// Tick until `running` clears or `max_ticks` ticks ran.
    ///
    /// `feed` is called before every poll with the number of the tick about
    /// to run; the runner uses it to push scripted frames into the queue.
    pub fn run<F>(&mut self, running: &AtomicBool, max_ticks: Option<u64>, feed: F) -> Result<(), CycleError>
    where
        F: FnMut(u32),
    {
        info!(?max_ticks, "entering scheduler loop");

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop(running, max_ticks, feed);

        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop(running, max_ticks, feed);

        info!(
            ticks = self.stats.cycle_count,
            overruns = self.stats.overruns,
            avg_ns = self.stats.avg_cycle_ns(),
            "scheduler loop finished"
        );
        result
    }

    fn timed_poll(&mut self, period_ns: i64, latency_ns: i64) {
        let start = Instant::now();
        if self.poll().is_none() {
            return;
        }
        let duration_ns = start.elapsed().as_nanos() as i64;
        self.stats.record(duration_ns, latency_ns);
        if duration_ns > period_ns {
            self.stats.overruns += 1;
            warn!(duration_ns, budget_ns = period_ns, "tick overrun");
        }
    }

    /// Simulation loop using `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop<F>(&mut self, running: &AtomicBool, max_ticks: Option<u64>, mut feed: F) -> Result<(), CycleError>
    where
        F: FnMut(u32),
    {
        let period_ns = self.tick_period as i64 * NS_PER_TIMER_UNIT;
        let period = std::time::Duration::from_nanos(period_ns as u64);
        let mut next_wake = Instant::now();

        while !self.finished(running, max_ticks) {
            next_wake += period;
            feed(self.state.tick_count.wrapping_add(1));
            self.timed_poll(period_ns, 0);

            if let Some(remaining) = next_wake.checked_duration_since(Instant::now()) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }

    /// RT loop using `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop<F>(&mut self, running: &AtomicBool, max_ticks: Option<u64>, mut feed: F) -> Result<(), CycleError>
    where
        F: FnMut(u32),
    {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let period_ns = self.tick_period as i64 * NS_PER_TIMER_UNIT;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while !self.finished(running, max_ticks) {
            next_wake = timespec_add_ns(next_wake, period_ns);
            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);

            let woke = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            let latency_ns = timespec_diff_ns(&woke, &next_wake).abs();

            feed(self.state.tick_count.wrapping_add(1));
            self.timed_poll(period_ns, latency_ns);
        }
        Ok(())
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let total = ts.tv_nsec() + ns;
    let secs = ts.tv_sec() + total.div_euclid(1_000_000_000);
    let nanos = total.rem_euclid(1_000_000_000);
    TimeSpec::new(secs, nanos)
}

/// `a - b` in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
