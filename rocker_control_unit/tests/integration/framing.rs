//! Integration test: receive queue, per-tick batch bound, heartbeat, CAN.

use rocker_common::consts::{FRAME_QUEUE_SLOTS, HEARTBEAT_PERIOD, MAX_FRAMES_PER_TICK};
use rocker_common::protocol::{BusFrame, Datagram, Instruction, Status};

use rocker_control_unit::config::ConfigStore;
use rocker_control_unit::transport::FrameQueue;

use super::rig::Rig;

#[test]
fn overflow_drops_newest_frames() {
    let mut rig = Rig::defaults();
    let capacity = FrameQueue::<Datagram>::capacity();
    let extra = 5;
    for value in 0..(capacity + extra) as i32 {
        rig.send_unchecked(Instruction::MotorStop, value);
    }
    assert_eq!(rig.scheduler.transport().pending(), capacity);

    let mut reports = Vec::new();
    while rig.scheduler.transport().pending() > 0 {
        reports.push(rig.step());
    }
    assert_eq!(reports.last().map(|r| r.queue_dropped), Some(extra as u32));

    let values: Vec<i32> = rig.replies().iter().map(|r| r.value).collect();
    assert_eq!(values, (0..capacity as i32).collect::<Vec<_>>());
    assert_eq!(rig.scheduler.totals().queue_dropped, extra as u32);
}

#[test]
fn at_most_a_batch_per_tick() {
    let mut rig = Rig::defaults();
    let total = MAX_FRAMES_PER_TICK + 3;
    assert!(total < FRAME_QUEUE_SLOTS);
    for value in 0..total as i32 {
        rig.send(Instruction::GetAxisParameter, 6, 0, value);
    }

    let first = rig.step();
    assert_eq!(first.received as usize, MAX_FRAMES_PER_TICK);
    assert_eq!(first.replies as usize, MAX_FRAMES_PER_TICK);
    assert_eq!(rig.scheduler.transport().pending(), 3);

    let second = rig.step();
    assert_eq!(second.replies, 3);
    assert_eq!(rig.step().received, 0);
    assert!(rig.replies().iter().all(|r| r.status == Status::Ok));
}

#[test]
fn heartbeat_toggles_after_period() {
    let mut rig = Rig::defaults();
    let reports = rig.run(HEARTBEAT_PERIOD);
    assert!(reports.iter().all(|r| !r.heartbeat));
    assert!(rig.step().heartbeat);
    assert_eq!(rig.scheduler.heartbeat().toggles, 1);

    let reports = rig.run(HEARTBEAT_PERIOD + 1);
    assert_eq!(reports.iter().filter(|r| r.heartbeat).count(), 1);
    assert!(reports.last().is_some_and(|r| r.heartbeat));
    assert_eq!(rig.scheduler.heartbeat().toggles, 2);
}

#[test]
fn heartbeat_survives_timer_wrap() {
    let mut rig: Rig<Datagram> = Rig::starting_at(ConfigStore::default(), u32::MAX - 100);
    let reports = rig.run(HEARTBEAT_PERIOD + 1);
    assert_eq!(reports.iter().filter(|r| r.heartbeat).count(), 1);
    assert!(rig.clock_now() < 1000);
}

#[test]
fn can_frames_are_filtered_by_id() {
    let mut rig: Rig<BusFrame> = Rig::new(ConfigStore::default());
    let gap_run_current = BusFrame::request(1, Instruction::GetAxisParameter as u8, 6, 0, 0);

    rig.push(gap_run_current);
    rig.push(BusFrame { id: 3, ..gap_run_current });
    rig.push(BusFrame { remote: true, ..gap_run_current });
    rig.push(BusFrame { len: 6, ..gap_run_current });
    rig.push(BusFrame { extended: true, ..gap_run_current });

    let report = rig.step();
    assert_eq!(report.received, 5);
    assert_eq!(report.rejected, 4);
    assert_eq!(report.replies, 1);

    let sent = rig.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, 2);
    assert_eq!(sent[0].len, 8);
    let reply = sent[0].parse_reply().unwrap();
    assert_eq!(reply.status, Status::Ok);
    assert_eq!(reply.value, 128);
    assert_eq!(reply.host_address, 2);
}

#[test]
fn can_secondary_id_is_accepted() {
    let mut rig: Rig<BusFrame> = Rig::new(ConfigStore::default());
    let set_secondary = BusFrame::request(1, Instruction::SetGlobalParameter as u8, 72, 0, 0x40);
    rig.push(set_secondary);
    rig.step();
    assert_eq!(rig.take_sent().len(), 1);

    rig.push(BusFrame::request(0x40, Instruction::GetVersion as u8, 1, 0, 0));
    assert_eq!(rig.step().replies, 1);
}
