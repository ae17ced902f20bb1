/*
 * Integration tests for dptf
 *
 * These drive the public API end to end: platform description, settings,
 * session runs and the status snapshots printed by dptfctl.
 */

use std::path::PathBuf;

use dptf::config::{self, PolicySettings, CONFIG_DIR_ENV};
use dptf::platform::PlatformDescription;
use dptf::scenario::{Direction, Session};
use dptf_core::to_pretty_json;
use dptf_protocol::{Power, PowerControlType};
use serial_test::serial;
use tempfile::TempDir;

fn demo_platform() -> PlatformDescription {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join("platform.json");
    PlatformDescription::load(&path).expect("demo platform should load")
}

fn demo_session(settings: PolicySettings) -> Session {
    let mut session = Session::new(&demo_platform(), settings).unwrap();
    session.initialize().unwrap();
    session
}

fn pl1(session: &Session) -> Power {
    session.platform().domain(0, 0).unwrap().power.unwrap().limits[&PowerControlType::Pl1]
}

#[test]
fn test_demo_platform_status() {
    let session = demo_session(PolicySettings::default());
    let status = session.status();

    assert_eq!(status.len(), 2);
    assert_eq!(status[0].name, "SoC");
    assert_eq!(status[0].domains.len(), 2);
    assert_eq!(status[1].domains[0].name, "WiFi");

    let json = to_pretty_json(&status).unwrap();
    assert!(json.contains("\"CPU\""));
    assert!(json.contains("\"Panel\""));
}

#[test]
fn test_first_limit_step_lands_on_cpu_power() {
    let mut session = demo_session(PolicySettings::default());

    let reports = session.limit(1, 1).unwrap();
    assert_eq!(reports[0].absorbed_by, Some(0));
    assert_eq!(pl1(&session), Power::from_watts(11.0));

    let panel = session.platform().domain(0, 1).unwrap().display.unwrap();
    assert_eq!(panel.current_index, 3);
}

#[test]
fn test_limit_until_exhausted() {
    let mut session = demo_session(PolicySettings::default());

    let reports = session.limit(1, 200).unwrap();
    let last = reports.last().unwrap();
    assert_eq!(last.absorbed_by, None);
    assert!(reports.len() < 200);

    let cpu = session.platform().domain(0, 0).unwrap();
    assert_eq!(cpu.power.unwrap().limits[&PowerControlType::Pl1], Power::from_watts(5.0));
    assert_eq!(cpu.core.unwrap().active_cores, 2);
    assert!(cpu.performance.unwrap().current_index >= 4);

    let panel = session.platform().domain(0, 1).unwrap().display.unwrap();
    assert!(panel.current_index > 3);
}

#[test]
fn test_cycle_restores_cpu_controls() {
    let mut session = demo_session(PolicySettings::default());

    let reports = session.cycle(1, 200).unwrap();
    assert!(reports.iter().any(|r| r.direction == Direction::Unlimit && r.absorbed_by.is_some()));

    let cpu = session.platform().domain(0, 0).unwrap();
    assert_eq!(cpu.power.unwrap().limits[&PowerControlType::Pl1], Power::from_watts(25.0));
    assert_eq!(cpu.performance.unwrap().current_index, 0);
    assert_eq!(cpu.core.unwrap().active_cores, 8);
}

#[test]
fn test_targets_arbitrate_independently() {
    let mut session = demo_session(PolicySettings::default());

    session.limit(1, 3).unwrap();
    session.limit(2, 1).unwrap();
    assert_eq!(pl1(&session), Power::from_watts(9.0));

    // The stricter target still holds the limit after the other relaxes
    session.unlimit(2, 1).unwrap();
    assert_eq!(pl1(&session), Power::from_watts(9.0));
}

#[test]
fn test_unknown_domain_lookup() {
    let session = demo_session(PolicySettings::default());
    assert!(session.participants()[1].domain(3).is_err());
}

#[test]
#[serial]
fn test_settings_from_config_dir() {
    let dir = TempDir::new().unwrap();
    std::env::set_var(CONFIG_DIR_ENV, dir.path());

    let saved = PolicySettings {
        commit_each_step: false,
        ..Default::default()
    };
    config::save_settings(&saved).unwrap();
    let loaded = config::load_settings(None).unwrap();
    std::env::remove_var(CONFIG_DIR_ENV);
    assert_eq!(loaded, saved);

    let mut session = demo_session(loaded);
    let reports = session.limit(1, 2).unwrap();
    assert!(!reports[0].committed);
    assert!(reports[1].committed);
    assert_eq!(pl1(&session), Power::from_watts(10.0));
}

#[test]
#[serial]
fn test_missing_settings_use_defaults() {
    let dir = TempDir::new().unwrap();
    std::env::set_var(CONFIG_DIR_ENV, dir.path().join("never-created"));
    let loaded = config::load_settings(None).unwrap();
    std::env::remove_var(CONFIG_DIR_ENV);
    assert_eq!(loaded, PolicySettings::default());
}
