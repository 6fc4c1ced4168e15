use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.host, "127.0.0.1");
    assert_eq!(settings.broker.inbound_port, 5559);
    assert_eq!(settings.broker.outbound_port, 5560);
    assert_eq!(settings.client.name, "anonymous");
    assert_eq!(settings.client.handshake_attempts, 20);
    assert_eq!(settings.client.handshake_delay_ms, 50);
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn broker_addresses_join_host_and_port() {
    let settings = Settings::default();
    assert_eq!(settings.broker.inbound_addr(), "127.0.0.1:5559");
    assert_eq!(settings.broker.outbound_addr(), "127.0.0.1:5560");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [broker]
        host = "0.0.0.0"
        inbound_port = 7001

        [client]
        name = "probe-runner"
        handshake_attempts = 5
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.broker.host, "0.0.0.0");
    assert_eq!(cfg.broker.inbound_port, 7001);
    // untouched keys keep their defaults
    assert_eq!(cfg.broker.outbound_port, 5560);
    assert_eq!(cfg.client.name, "probe-runner");
    assert_eq!(cfg.client.handshake_attempts, 5);
    assert_eq!(cfg.client.handshake_delay_ms, 50);
}

#[test]
#[serial]
fn load_config_from_environment() {
    temp_env::with_vars(
        [
            ("PUBRELAY_BROKER__OUTBOUND_PORT", Some("7102")),
            ("PUBRELAY_CLIENT__DEFAULT_TIMEOUT_MS", Some("250")),
            ("PUBRELAY_LOGGING__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.broker.outbound_port, 7102);
            assert_eq!(cfg.client.default_timeout_ms, 250);
            assert_eq!(cfg.logging.level, "debug");
            assert_eq!(cfg.broker.inbound_port, 5559);
        },
    );
}
