//! Integration test: closed-loop tracking, deviation fault and re-enable.

use rocker_common::protocol::{Instruction, Status};
use rocker_common::state::ClosedLoopState;

use super::rig::{Rig, axis0};

const CLOSED_LOOP_MODE: u8 = 129;
const MAX_POSITION_DEVIATION: u8 = 212;
const DEVIATION_FLAG: u8 = 211;
const CL_STATE: u8 = 219;

fn corrector_state(rig: &Rig<rocker_common::protocol::Datagram>) -> ClosedLoopState {
    rig.scheduler.state().axis(axis0()).corrector.state()
}

#[test]
fn move_tracks_without_correction() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.sap(CLOSED_LOOP_MODE, 0, 1), Status::Ok);
    assert_eq!(corrector_state(&rig), ClosedLoopState::Tracking);

    let reply = rig.ask(Instruction::MoveTo, 0, 0, 1000);
    assert_eq!(reply.value, 1000);

    let reports = rig.run(1000);
    assert!(reports.iter().all(|r| r.faults == 0));
    assert_eq!(rig.sim().position(axis0()), 1000);
    assert_eq!(rig.sim().last_output(axis0()).position_correction, 0);

    assert_eq!(rig.gap(1, 0), 1000); // ActualPosition
    assert_eq!(rig.gap(8, 0), 1); // PositionReached
    assert_eq!(rig.gap(CL_STATE, 0), ClosedLoopState::Tracking as i32);
    assert_eq!(rig.gap(DEVIATION_FLAG, 0), 0);
}

#[test]
fn deviation_fault_blocks_motion_until_reenabled() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.sap(MAX_POSITION_DEVIATION, 0, 100), Status::Ok);
    assert_eq!(rig.sap(CLOSED_LOOP_MODE, 0, 1), Status::Ok);

    rig.sim().inject_slip(axis0(), 150);
    let report = rig.step();
    assert_eq!(report.faults, 1);
    assert_eq!(corrector_state(&rig), ClosedLoopState::Fault);
    assert_eq!(rig.gap(DEVIATION_FLAG, 0), 1);

    let rejected = rig.ask(Instruction::RotateRight, 0, 0, 1000);
    assert_eq!(rejected.status, Status::MotorDisabled);
    assert_eq!(rig.ask(Instruction::MoveTo, 0, 0, 500).status, Status::MotorDisabled);

    // Removing the cause does not clear the latch.
    rig.sim().inject_slip(axis0(), -150);
    let reports = rig.run(50);
    assert!(reports.iter().all(|r| r.faults == 0));
    assert_eq!(corrector_state(&rig), ClosedLoopState::Fault);

    assert_eq!(rig.sap(DEVIATION_FLAG, 0, 0), Status::Ok);
    assert_eq!(corrector_state(&rig), ClosedLoopState::Tracking);
    assert_eq!(rig.ask(Instruction::RotateRight, 0, 0, 1000).status, Status::Ok);
    assert_eq!(rig.gap(DEVIATION_FLAG, 0), 0);
}

#[test]
fn fault_stops_a_running_axis() {
    let mut rig = Rig::defaults();
    rig.sap(MAX_POSITION_DEVIATION, 0, 100);
    rig.ask(Instruction::RotateRight, 0, 0, 20_000);
    rig.run(20);
    assert!(rig.sim().velocity(axis0()) > 0);

    rig.sim().inject_slip(axis0(), 500);
    let report = rig.step();
    assert_eq!(report.faults, 1);
    assert_eq!(rig.gap(2, 0), 0); // TargetVelocity
    rig.run(200);
    assert_eq!(rig.sim().velocity(axis0()), 0);
}

#[test]
fn deviation_equal_to_limit_does_not_fault() {
    let mut rig = Rig::defaults();
    rig.sap(MAX_POSITION_DEVIATION, 0, 150);
    rig.sim().inject_slip(axis0(), 150);
    let reports = rig.run(10);
    assert!(reports.iter().all(|r| r.faults == 0));
    assert_eq!(rig.gap(DEVIATION_FLAG, 0), 0);
}

#[test]
fn position_correction_pulls_encoder_back() {
    let mut rig = Rig::defaults();
    rig.sap(CLOSED_LOOP_MODE, 0, 1);
    rig.sim().inject_slip(axis0(), 500);
    rig.run(3);
    assert_eq!(rig.sim().slip(axis0()), 0);
    assert_eq!(rig.gap(1, 0), 0);
}

#[test]
fn open_loop_leaves_slip_alone() {
    let mut rig = Rig::defaults();
    rig.sim().inject_slip(axis0(), 500);
    rig.run(3);
    assert_eq!(rig.sim().slip(axis0()), 500);
    assert_eq!(rig.gap(1, 0), 500);
    assert_eq!(rig.gap(CL_STATE, 0), ClosedLoopState::OpenLoop as i32);
}

#[test]
fn encoder_resolution_write_rescales_the_encoder() {
    let mut rig = Rig::defaults();
    rig.sim().inject_slip(axis0(), 500);
    rig.run(3);
    assert_eq!(rig.gap(209, 0), 40); // EncoderPosition

    assert_eq!(rig.sap(210, 0, 8192), Status::Ok);
    rig.run(3);
    assert_eq!(rig.gap(209, 0), 80);
    assert_eq!(rig.gap(1, 0), 500);
}

#[test]
fn motor_disable_parks_the_corrector() {
    let mut rig = Rig::defaults();
    rig.sap(CLOSED_LOOP_MODE, 0, 1);
    assert_eq!(rig.sap(203, 0, 1), Status::Ok);
    assert_eq!(corrector_state(&rig), ClosedLoopState::Disabled);
    assert!(!rig.sim().last_output(axis0()).enabled);

    rig.sap(203, 0, 0);
    assert_eq!(corrector_state(&rig), ClosedLoopState::Tracking);
}
