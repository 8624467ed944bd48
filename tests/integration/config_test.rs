//! Integration tests for configuration persistence.

use spinride::sensors::ftms::FrameLayout;
use spinride::storage::config::{load_config_from, save_config_to, AppConfig, Sex};

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.data_dir, dir.path());
    assert_eq!(config.sensors.discovery_timeout_secs, 30);
    assert_eq!(config.session.cadence_stale_ms, 2500);
    assert!(config.profile.mass_kg.is_none());
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AppConfig::default();
    config.profile.mass_kg = Some(81.0);
    config.profile.age = Some(44);
    config.profile.sex = Sex::Male;
    config.sensors.frame_layout = FrameLayout::Flags;
    config.sensors.bike_name_filter = Some("Peloton".into());
    config.calories.acsm_gross = true;
    save_config_to(&config, &path).unwrap();

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded.profile, config.profile);
    assert_eq!(loaded.sensors.frame_layout, FrameLayout::Flags);
    assert_eq!(loaded.sensors.bike_name_filter.as_deref(), Some("Peloton"));
    assert!(loaded.calories.acsm_gross);
    assert_eq!(loaded.rides_dir(), dir.path().join("nested").join("rides"));
}

#[test]
fn test_out_of_range_profile_is_dropped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profile]\nmass_kg = 1000.0\nage = 200\nsex = \"female\"\n").unwrap();

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded.profile.mass_kg, None);
    assert_eq!(loaded.profile.age, None);
    assert_eq!(loaded.profile.sex, Sex::Female);
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[profile\nmass_kg = ").unwrap();

    assert!(load_config_from(&path).is_err());
}
