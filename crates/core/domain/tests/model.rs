use domain::{
    BridgeOptions, ConnectionConfig, ConnectionStatus, Protocol, TagAddress, TagValue,
};

#[test]
fn status_transitions_follow_state_machine() {
    use ConnectionStatus::*;
    assert!(Disconnected.can_transition_to(Connecting));
    assert!(Connecting.can_transition_to(Connected));
    assert!(Connecting.can_transition_to(Error));
    assert!(Connected.can_transition_to(Disconnected));
    assert!(Error.can_transition_to(Connecting));
    assert!(!Disconnected.can_transition_to(Connected));
    assert!(!Error.can_transition_to(Connected));
    assert!(Connected.is_active());
    assert!(!Error.is_active());
}

#[test]
fn connection_config_is_tagged_by_protocol() {
    let json = r#"{"protocol":"modbus_tcp","config":{"host":"192.168.1.100"}}"#;
    let config: ConnectionConfig = serde_json::from_str(json).expect("config");
    assert_eq!(config.protocol(), Protocol::ModbusTcp);
    match config {
        ConnectionConfig::ModbusTcp(modbus) => {
            assert_eq!(modbus.port, 502);
            assert_eq!(modbus.unit_id, 1);
        }
        other => panic!("unexpected config: {:?}", other),
    }
}

#[test]
fn tag_address_is_tagged_by_protocol() {
    let json = r#"{"protocol":"mqtt","topic":"plant/line1/temp","jsonPath":"data.value"}"#;
    let address: TagAddress = serde_json::from_str(json).expect("address");
    assert_eq!(address.protocol(), Protocol::Mqtt);
}

#[test]
fn integral_numbers_render_without_fraction() {
    assert_eq!(TagValue::Number(42.0).to_string(), "42");
    assert_eq!(TagValue::Number(3.5).to_string(), "3.5");
    assert_eq!(TagValue::Bool(true).to_string(), "true");
    assert_eq!(TagValue::Text("on".to_string()).to_string(), "on");
}

#[test]
fn bridge_options_are_sanitized() {
    let options = BridgeOptions {
        interval_ms: 10,
        change_only: true,
        change_threshold: Some(-0.5),
        buffer_size: 5,
    }
    .sanitized();
    assert_eq!(options.interval_ms, 100);
    assert_eq!(options.change_threshold, Some(0.5));
}
