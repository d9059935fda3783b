//! Integration test: host command sessions over serial datagrams.

use rocker_common::config::{ConfigError, ModuleConfig};
use rocker_common::consts::{RESTORE_DEFAULTS_KEY, VERSION_BINARY, VERSION_STRING};
use rocker_common::hal::MotionCommand;
use rocker_common::params::GlobalParam;
use rocker_common::protocol::{Datagram, Instruction, Request, Status};

use rocker_control_unit::config::ConfigStore;

use super::rig::{MODULE, Rig, axis0};

#[test]
fn gap_returns_compiled_defaults() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.gap(4, 0), 51200); // MaxVelocity
    assert_eq!(rig.gap(5, 0), 204_800); // AMax
    assert_eq!(rig.gap(6, 0), 128); // RunCurrent
    assert_eq!(rig.gap(7, 0), 32); // StandbyCurrent
    assert_eq!(rig.gap(140, 0), 8); // MicrostepResolution
    assert_eq!(rig.gap(110, 0), 255); // Gamma
    assert_eq!(rig.gap(113, 0), 100);
    assert_eq!(rig.gap(114, 0), 240);
    assert_eq!(rig.gap(180, 0), 240); // SmartEnergy
    assert_eq!(rig.gap(210, 0), 4096); // EncoderResolution
    assert_eq!(rig.gap(129, 0), 0); // ClosedLoopMode
}

#[test]
fn sap_then_gap_round_trips_and_is_bounded() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.sap(6, 0, 200), Status::Ok);
    assert_eq!(rig.gap(6, 0), 200);

    let reply = rig.ask(Instruction::SetAxisParameter, 6, 0, 256);
    assert_eq!(reply.status, Status::InvalidValue);
    assert_eq!(reply.value, 256);
    assert_eq!(rig.gap(6, 0), 200);

    assert_eq!(rig.sap(180, 0, 100), Status::InvalidType);
    assert_eq!(rig.sap(6, 1, 100), Status::InvalidAxis);
}

#[test]
fn sgp_out_of_range_bitrate_keeps_module_config() {
    let mut store = ConfigStore::default();
    assert_eq!(
        store.set_global(GlobalParam::CanBitrate, 9),
        Err(ConfigError::OutOfRange { field: 69, value: 9 })
    );
    assert_eq!(store.module(), ModuleConfig::default());

    let mut rig = Rig::defaults();
    let reply = rig.ask(Instruction::SetGlobalParameter, 69, 0, 9);
    assert_eq!(reply.status, Status::InvalidValue);
    assert_eq!(rig.scheduler.state().config.module(), ModuleConfig::default());
    assert_eq!(rig.ask(Instruction::GetGlobalParameter, 69, 0, 0).value, 8);
}

#[test]
fn bad_checksum_gets_no_reply_and_changes_nothing() {
    let mut rig = Rig::defaults();
    let mut frame = Datagram::from_request(&Request::new(Instruction::SetAxisParameter, 6, 0, 200).to(MODULE));
    frame.0[8] = frame.0[8].wrapping_add(1);
    assert!(rig.push(frame));

    let report = rig.step();
    assert_eq!(report.received, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.replies, 0);
    assert!(rig.take_sent().is_empty());
    assert_eq!(rig.gap(6, 0), 128);
}

#[test]
fn unaddressed_request_is_ignored() {
    let mut rig = Rig::defaults();
    let frame = Datagram::from_request(&Request::new(Instruction::RotateRight, 0, 0, 1000).to(7));
    rig.push(frame);
    let report = rig.step();
    assert_eq!(report.ignored, 1);
    assert!(rig.take_sent().is_empty());
    assert_eq!(rig.scheduler.state().axis(axis0()).runtime.motion, MotionCommand::Stop);
}

#[test]
fn secondary_address_is_answered_with_module_address() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.ask(Instruction::SetGlobalParameter, 72, 0, 9).status, Status::Ok);

    rig.push(Datagram::from_request(&Request::new(Instruction::GetAxisParameter, 6, 0, 0).to(9)));
    rig.step();
    let replies = rig.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].module_address, MODULE);
    assert_eq!(replies[0].value, 128);
}

#[test]
fn new_module_address_takes_effect_for_next_request() {
    let mut rig = Rig::defaults();
    let reply = rig.ask(Instruction::SetGlobalParameter, 66, 0, 5);
    assert_eq!(reply.status, Status::Ok);
    assert_eq!(reply.module_address, 5);

    rig.push(Datagram::from_request(&Request::new(Instruction::GetGlobalParameter, 66, 0, 0).to(MODULE)));
    assert_eq!(rig.step().ignored, 1);
    rig.push(Datagram::from_request(&Request::new(Instruction::GetGlobalParameter, 66, 0, 0).to(5)));
    rig.step();
    assert_eq!(rig.replies()[0].value, 5);
}

#[test]
fn rotate_stop_and_move_drive_the_plant() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.ask(Instruction::RotateLeft, 0, 0, 5000).status, Status::Ok);
    assert_eq!(rig.gap(218, 0), 1); // VMaxModified
    rig.run(100);
    assert_eq!(rig.sim().velocity(axis0()), -5000);

    assert_eq!(rig.ask(Instruction::MotorStop, 0, 0, 0).status, Status::Ok);
    rig.run(100);
    assert_eq!(rig.sim().velocity(axis0()), 0);

    let here = rig.sim().position(axis0());
    let reply = rig.ask(Instruction::MoveTo, 0, 0, 0);
    assert_eq!(reply.value, 0);
    assert_eq!(rig.gap(218, 0), 0);
    rig.run(2000);
    assert!(here < 0);
    assert_eq!(rig.sim().position(axis0()), 0);
    assert_eq!(rig.gap(8, 0), 1);
}

#[test]
fn relative_move_builds_on_last_target() {
    let mut rig = Rig::defaults();
    rig.ask(Instruction::MoveTo, 0, 0, 2000);
    let reply = rig.ask(Instruction::MoveTo, 1, 0, -500);
    assert_eq!(reply.value, 1500);
    assert_eq!(rig.gap(0, 0), 1500); // TargetPosition
    rig.run(2000);
    assert_eq!(rig.sim().position(axis0()), 1500);
}

#[test]
fn move_target_velocity_is_signed() {
    let mut rig = Rig::defaults();
    rig.ask(Instruction::MoveTo, 0, 0, 2000);
    assert_eq!(rig.gap(2, 0), 51200); // TargetVelocity
    rig.run(2000);

    rig.ask(Instruction::MoveTo, 0, 0, -1000);
    assert_eq!(rig.gap(2, 0), -51200);
    rig.run(2000);
    assert_eq!(rig.sim().position(axis0()), -1000);
}

#[test]
fn motor_disable_rejects_motion() {
    let mut rig = Rig::defaults();
    rig.ask(Instruction::RotateRight, 0, 0, 3000);
    rig.run(10);
    assert_eq!(rig.sap(203, 0, 1), Status::Ok);
    assert_eq!(rig.ask(Instruction::RotateRight, 0, 0, 3000).status, Status::MotorDisabled);
    assert_eq!(rig.gap(2, 0), 0);
    assert_eq!(rig.sim().last_output(axis0()).current, 0);
}

#[test]
fn unknown_instruction_and_axis() {
    let mut rig = Rig::defaults();
    let raw = Request {
        address: MODULE,
        instruction: 42,
        ..Default::default()
    };
    rig.push(Datagram::from_request(&raw));
    rig.step();
    assert_eq!(rig.replies()[0].status, Status::InvalidInstruction);

    assert_eq!(rig.ask(Instruction::RotateRight, 0, 3, 100).status, Status::InvalidAxis);
    assert_eq!(rig.ask(Instruction::GetGlobalParameter, 69, 2, 0).status, Status::InvalidAxis);
}

#[test]
fn version_and_tick_timer() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.ask(Instruction::GetVersion, 1, 0, 0).value, VERSION_BINARY);

    // Type 0: host address then the ASCII version, no checksum.
    rig.send(Instruction::GetVersion, 0, 0, 0);
    rig.step();
    let sent = rig.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0[0], 2);
    assert_eq!(sent[0].text_payload(), VERSION_STRING);
    assert_eq!(&sent[0].0[1..], b"1111V101");

    rig.run(10);
    // Dispatch happens at the start of tick 13.
    assert_eq!(rig.ask(Instruction::GetGlobalParameter, 132, 0, 0).value, 13);
    assert_eq!(rig.ask(Instruction::SetGlobalParameter, 132, 0, 0).status, Status::InvalidType);
    assert_eq!(rig.ask(Instruction::GetVersion, 2, 0, 0).status, Status::InvalidType);
}

#[test]
fn restore_defaults_needs_the_key() {
    let mut rig = Rig::new(ConfigStore::new(2).unwrap());
    rig.sap(6, 0, 200);
    rig.sap(110, 1, 500);
    rig.ask(Instruction::SetGlobalParameter, 76, 0, 4);

    assert_eq!(rig.ask(Instruction::RestoreDefaults, 0, 0, 1).status, Status::InvalidValue);
    assert_eq!(rig.gap(6, 0), 200);

    let reply = rig.ask(Instruction::RestoreDefaults, 0, 0, RESTORE_DEFAULTS_KEY);
    assert_eq!(reply.status, Status::Ok);
    assert_eq!(reply.host_address, 4);
    assert_eq!(rig.gap(6, 0), 128);
    assert_eq!(rig.gap(110, 1), 255);
}
