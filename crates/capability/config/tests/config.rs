use gw_config::{AppConfig, ConfigError};
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| values.get(key).cloned()
}

#[test]
fn defaults_when_unset() {
    let config = AppConfig::from_lookup(lookup(&[])).expect("config");
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.http_addr, "127.0.0.1:8090");
    assert_eq!(config.data_buffer_capacity, 10_000);
    assert!(config.auto_resume_bridges);
}

#[test]
fn overrides_and_blank_values() {
    let config = AppConfig::from_lookup(lookup(&[
        ("GW_HTTP_ADDR", "0.0.0.0:9000"),
        ("GW_BRIDGE_DEFAULT_INTERVAL_MS", "250"),
        ("GW_BRIDGE_DEFAULT_BUFFER_SIZE", " "),
        ("GW_AUTO_RESUME_BRIDGES", "off"),
        ("GW_SHUTDOWN_DISCONNECT", "No"),
    ]))
    .expect("config");
    assert_eq!(config.http_addr, "0.0.0.0:9000");
    assert_eq!(config.bridge_default_interval_ms, 250);
    assert_eq!(config.bridge_default_buffer_size, 1000);
    assert!(!config.auto_resume_bridges);
    assert!(!config.shutdown_disconnect);
}

#[test]
fn invalid_values_are_rejected() {
    let err = AppConfig::from_lookup(lookup(&[("GW_DATA_BUFFER_CAPACITY", "lots")])).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Invalid("GW_DATA_BUFFER_CAPACITY".to_string(), "lots".to_string())
    );
    assert!(AppConfig::from_lookup(lookup(&[("GW_DATA_BUFFER_CAPACITY", "0")])).is_err());
    assert!(AppConfig::from_lookup(lookup(&[("GW_AUTO_RESUME_BRIDGES", "maybe")])).is_err());
}

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("GW_HTTP_ADDR", "127.0.0.1:8091");
        std::env::set_var("GW_DATA_BUFFER_CAPACITY", "500");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8091");
    assert_eq!(config.data_buffer_capacity, 500);
}
