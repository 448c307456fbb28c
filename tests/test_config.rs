use std::io::Write;
use std::time::Duration;

use live_rocket::config::{CONFIG_ENV, Config, LISTEN_ENV, Limits};

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.idle_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.write_timeout(), Duration::from_secs(10));
    assert_eq!(cfg.max_connections, 1024);
    assert_eq!(cfg.limits, Limits::default());
    assert!(cfg.validate().is_ok());
}

// Env vars are process-wide, so everything touching them lives in one test.
#[test]
fn test_config_load_from_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "listen_addr: \"127.0.0.1:9000\"\nidle_timeout_ms: 500").unwrap();

    unsafe {
        std::env::remove_var(CONFIG_ENV);
        std::env::remove_var(LISTEN_ENV);
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");

    unsafe {
        std::env::set_var(CONFIG_ENV, file.path());
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
    assert_eq!(cfg.idle_timeout_ms, 500);

    // LISTEN overrides the file
    unsafe {
        std::env::set_var(LISTEN_ENV, "0.0.0.0:3000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.idle_timeout_ms, 500);

    unsafe {
        std::env::set_var(LISTEN_ENV, "not an address");
    }
    assert!(Config::load().is_err());

    unsafe {
        std::env::remove_var(CONFIG_ENV);
        std::env::remove_var(LISTEN_ENV);
    }
}

#[test]
fn test_config_partial_yaml_keeps_defaults() {
    let cfg = Config::from_yaml_str("limits:\n  max_body_bytes: 2048\n").unwrap();

    assert_eq!(cfg.limits.max_body_bytes, 2048);
    assert_eq!(cfg.limits.max_header_bytes, Limits::default().max_header_bytes);
    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
}

#[test]
fn test_config_empty_yaml_is_default() {
    assert_eq!(Config::from_yaml_str("   \n").unwrap(), Config::default());
}

#[test]
fn test_config_from_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_yaml_file(&dir.path().join("nope.yaml")).unwrap_err();
    assert!(format!("{:#}", err).contains("nope.yaml"));
}

#[test]
fn test_config_rejects_zero_values() {
    let cfg = Config {
        idle_timeout_ms: 0,
        ..Config::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = Config {
        max_connections: 0,
        ..Config::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1, cfg2);
}
