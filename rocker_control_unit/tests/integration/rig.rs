//! Test rig: scheduler + simulated plant + host-side queue producer.

use rocker_common::consts::FRAME_QUEUE_SLOTS;
use rocker_common::hal::CountingHeartbeat;
use rocker_common::prelude::*;

use rocker_control_unit::config::ConfigStore;
use rocker_control_unit::cycle::{Scheduler, TickReport};
use rocker_control_unit::sim::{ManualClock, SimDriver};
use rocker_control_unit::transport::{FrameProducer, FrameQueue, QueuedTransport};

pub type RigScheduler<F> =
    Scheduler<QueuedTransport<'static, F, Vec<F>>, SimDriver, ManualClock, CountingHeartbeat>;

/// Module address used by the default configuration.
pub const MODULE: u8 = 1;

pub struct Rig<F: 'static> {
    pub scheduler: RigScheduler<F>,
    pub host: FrameProducer<'static, F, FRAME_QUEUE_SLOTS>,
    pub clock: ManualClock,
}

impl<F: WireFrame + Copy + 'static> Rig<F> {
    pub fn new(store: ConfigStore) -> Self {
        Self::starting_at(store, 0)
    }

    /// Rig whose clock starts at `now`.
    pub fn starting_at(store: ConfigStore, now: u32) -> Self {
        let queue: &'static mut FrameQueue<F> = Box::leak(Box::new(FrameQueue::new()));
        let (host, rx) = queue.split();
        let clock = ManualClock::new();
        clock.set(now);
        let driver = SimDriver::new(&store);
        let scheduler = Scheduler::new(
            store,
            1,
            QueuedTransport::new(rx, Vec::new()),
            driver,
            clock.clone(),
            CountingHeartbeat::default(),
        );
        Self {
            scheduler,
            host,
            clock,
        }
    }

    /// Hand a raw frame to the receive queue.
    pub fn push(&mut self, frame: F) -> bool {
        self.host.push(frame)
    }

    /// Advance one timer unit and run the due tick.
    pub fn step(&mut self) -> TickReport {
        self.clock.advance(1);
        self.scheduler.poll().expect("tick due after one period")
    }

    pub fn run(&mut self, ticks: u32) -> Vec<TickReport> {
        (0..ticks).map(|_| self.step()).collect()
    }

    /// Frames sent since the last call.
    pub fn take_sent(&mut self) -> Vec<F> {
        std::mem::take(self.scheduler.transport_mut().sink_mut())
    }

    pub fn sim(&mut self) -> &mut SimDriver {
        self.scheduler.driver_mut()
    }

    pub fn clock_now(&self) -> u32 {
        self.clock.now()
    }
}

impl Rig<Datagram> {
    pub fn defaults() -> Self {
        Self::new(ConfigStore::default())
    }

    /// Queue a request addressed to this module.
    pub fn send(&mut self, instruction: Instruction, kind: u8, axis: u8, value: i32) {
        let frame = Datagram::from_request(&Request::new(instruction, kind, axis, value).to(MODULE));
        assert!(self.push(frame), "receive queue full");
    }

    /// Queue an axis-0 request, ignoring overflow.
    pub fn send_unchecked(&mut self, instruction: Instruction, value: i32) -> bool {
        self.push(Datagram::from_request(&Request::new(instruction, 0, 0, value).to(MODULE)))
    }

    /// Replies sent since the last call.
    pub fn replies(&mut self) -> Vec<Reply> {
        self.take_sent()
            .iter()
            .map(|f| f.parse_reply().expect("reply checksum"))
            .collect()
    }

    /// Send one request, run one tick, return its reply.
    pub fn ask(&mut self, instruction: Instruction, kind: u8, axis: u8, value: i32) -> Reply {
        self.send(instruction, kind, axis, value);
        self.step();
        let mut replies = self.replies();
        assert_eq!(replies.len(), 1, "expected exactly one reply");
        replies.remove(0)
    }

    pub fn sap(&mut self, kind: u8, axis: u8, value: i32) -> Status {
        self.ask(Instruction::SetAxisParameter, kind, axis, value).status
    }

    pub fn gap(&mut self, kind: u8, axis: u8) -> i32 {
        let reply = self.ask(Instruction::GetAxisParameter, kind, axis, 0);
        assert_eq!(reply.status, Status::Ok, "GAP {kind} failed");
        reply.value
    }
}

pub fn axis0() -> AxisId {
    AxisId::new(0, 1).unwrap()
}
