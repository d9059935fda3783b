//! Integration test: coolStep current regulation and stall detection.

use rocker_common::error::DriverFlags;
use rocker_common::protocol::{Datagram, Instruction, Status};

use rocker_control_unit::config::load_config_from_str;

use super::rig::{Rig, axis0};

const COOLSTEP_AXIS: &str = r#"
[[axes]]
[axes.closed_loop]
current_scaler_start_up = 150
upscale_delay = 10
downscale_delay = 4

[axes.cool_step]
enabled = true
"#;

fn coolstep_rig() -> Rig<Datagram> {
    let loaded = load_config_from_str(COOLSTEP_AXIS).unwrap();
    Rig::new(loaded.store)
}

fn smart_energy(rig: &Rig<Datagram>) -> u8 {
    rig.scheduler.state().axis(axis0()).regulator.smart_energy()
}

#[test]
fn scaler_rises_after_exactly_upscale_delay_ticks() {
    let mut rig = coolstep_rig();
    // Tick 1 dispatches the rotate; the ramp moves from tick 2 on.
    rig.send(Instruction::RotateRight, 0, 0, 1000);
    rig.run(10);
    assert_eq!(smart_energy(&rig), 150);
    rig.step();
    assert_eq!(smart_energy(&rig), 151);
}

#[test]
fn scaler_stays_within_bounds_under_changing_load() {
    let mut rig = coolstep_rig();
    rig.send(Instruction::RotateRight, 0, 0, 1000);
    rig.step();
    assert_eq!(rig.sap(113, 0, 120), Status::Ok);
    assert_eq!(rig.sap(114, 0, 160), Status::Ok);

    for phase in 0..6u16 {
        let load = if phase % 2 == 0 { 0 } else { 600 };
        rig.sim().set_load(axis0(), load);
        for _ in 0..200 {
            rig.step();
            let se = smart_energy(&rig);
            assert!((120..=160).contains(&se), "SmartEnergy {se} out of bounds");
        }
    }
}

#[test]
fn scaler_scales_run_current() {
    let mut rig = coolstep_rig();
    rig.send(Instruction::RotateRight, 0, 0, 1000);
    rig.run(2);
    rig.sim().set_load(axis0(), 300);
    rig.step();
    // 128 × 150 / 255
    assert_eq!(rig.sim().last_output(axis0()).current, 75);
}

#[test]
fn standby_current_at_rest() {
    let mut rig = Rig::defaults();
    rig.run(3);
    assert_eq!(rig.sim().last_output(axis0()).current, 32);
    assert_eq!(rig.gap(205, 0), 1); // StandbyFlag
}

#[test]
fn load_at_gamma_flags_stall_within_one_tick() {
    let mut rig = Rig::defaults();
    rig.sim().set_load(axis0(), 254);
    rig.step();
    assert!(!rig.scheduler.state().axis(axis0()).stall.stalled());

    rig.sim().set_load(axis0(), 255);
    rig.step();
    assert!(rig.scheduler.state().axis(axis0()).stall.stalled());
    assert_eq!(rig.gap(206, 0), 255); // StallLevel
    assert_eq!(rig.gap(208, 0), 1); // StallFlag
}

#[test]
fn stall_stops_axis_above_stall_v_min() {
    let mut rig = Rig::defaults();
    assert_eq!(rig.sap(181, 0, 100), Status::Ok);
    rig.sim().set_load(axis0(), 400);

    // Tick 1: rotate accepted at rest. Tick 2: moving, stalled, stopped.
    rig.send(Instruction::RotateRight, 0, 0, 5000);
    let reports = rig.run(2);
    assert_eq!(reports[0].stall_stops, 0);
    assert_eq!(reports[1].stall_stops, 1);
    assert_eq!(rig.gap(2, 0), 0);
    rig.run(50);
    assert_eq!(rig.sim().velocity(axis0()), 0);
}

#[test]
fn driver_status_bits_are_reported() {
    let mut rig = Rig::defaults();
    rig.sim().set_driver_flags(axis0(), DriverFlags::OVERTEMP_WARNING | DriverFlags::STANDSTILL);
    rig.step();
    let flags = DriverFlags::from_bits_truncate(rig.gap(207, 0) as u8);
    assert_eq!(flags, DriverFlags::OVERTEMP_WARNING | DriverFlags::STANDSTILL);
    assert!(!flags.has_fault());
}
