//! Integration test: machine file loading drives the running module.

use std::fs;

use tempfile::TempDir;

use rocker_common::axis::AxisId;
use rocker_common::config::{ConfigError, LogLevel};
use rocker_common::protocol::{Datagram, Instruction, Request};

use rocker_control_unit::config::load_config;

use super::rig::Rig;

const MACHINE_TOML: &str = r#"
log_level = "debug"
axis_count = 2
tick_period = 2

[module]
module_address = 3
host_address = 7

[[axes]]
[axes.motor]
run_current = 200
max_position_deviation = 400

[axes.closed_loop]
closed_loop_mode = true
gamma = 600
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn machine_file_overlays_defaults() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(&write(&dir, "rocker.toml", MACHINE_TOML)).unwrap();

    assert_eq!(loaded.log_level, LogLevel::Debug);
    assert_eq!(loaded.tick_period, 2);
    assert_eq!(loaded.store.axis_count(), 2);
    assert_eq!(loaded.store.module().module_address, 3);
    assert_eq!(loaded.store.module().can_bitrate, 8);

    let a0 = loaded.store.get(AxisId::new(0, 2).unwrap());
    let a1 = loaded.store.get(AxisId::new(1, 2).unwrap());
    assert_eq!(a0.motor.run_current, 200);
    assert_eq!(a0.motor.standby_current, 32);
    assert_eq!(a0.closed_loop.gamma, 600);
    assert_eq!(a1.motor.run_current, 128);
    assert!(!a1.closed_loop.closed_loop_mode);
}

#[test]
fn loaded_module_answers_on_its_address() {
    let dir = TempDir::new().unwrap();
    let loaded = load_config(&write(&dir, "rocker.toml", MACHINE_TOML)).unwrap();
    let mut rig: Rig<Datagram> = Rig::new(loaded.store);

    rig.push(Datagram::from_request(&Request::new(Instruction::GetAxisParameter, 6, 1, 0).to(1)));
    assert_eq!(rig.step().ignored, 1);

    rig.push(Datagram::from_request(&Request::new(Instruction::GetAxisParameter, 6, 0, 0).to(3)));
    rig.push(Datagram::from_request(&Request::new(Instruction::GetAxisParameter, 6, 1, 0).to(3)));
    rig.push(Datagram::from_request(&Request::new(Instruction::GetAxisParameter, 219, 0, 0).to(3)));
    rig.step();
    let replies = rig.replies();
    let values: Vec<i32> = replies.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![200, 128, 2]);
    assert!(replies.iter().all(|r| r.host_address == 7 && r.module_address == 3));
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err, ConfigError::FileNotFound);
}

#[test]
fn out_of_bounds_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "bad.toml",
        "[[axes]]\n[axes.motor]\nmax_velocity = 9000000\n",
    );
    assert!(matches!(load_config(&path), Err(ConfigError::ValidationError(_))));

    let path = write(&dir, "bad_module.toml", "[module]\ncan_bitrate = 0\n");
    assert_eq!(
        load_config(&path).unwrap_err(),
        ConfigError::OutOfRange { field: 69, value: 0 }
    );

    let path = write(&dir, "too_many.toml", "axis_count = 1\n[[axes]]\n[[axes]]\n");
    assert!(matches!(load_config(&path), Err(ConfigError::ValidationError(_))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.toml", "axis_count = \n");
    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}
