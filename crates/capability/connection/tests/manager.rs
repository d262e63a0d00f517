use domain::{
    ConnectionConfig, ConnectionEvent, ConnectionStatus, DataType, ErrorKind, ModbusAddress,
    ModbusTcpConfig, MqttAddress, MqttConfig, Quality, RegisterKind, TagAddress, TagDraft,
    TagUpdate, TagValue, WordOrder,
};
use gw_connection::{ConnectionError, ConnectionManager};
use gw_protocol::MemoryAdapterFactory;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn modbus_config() -> ConnectionConfig {
    ConnectionConfig::ModbusTcp(ModbusTcpConfig {
        host: "127.0.0.1".to_string(),
        port: 502,
        unit_id: 1,
        connect_timeout_ms: 1000,
        request_timeout_ms: 1000,
    })
}

fn holding(address: u16) -> TagAddress {
    TagAddress::ModbusTcp(ModbusAddress {
        register: RegisterKind::HoldingRegister,
        address,
        unit_id: None,
        length: None,
        word_order: WordOrder::BigEndian,
        scale: None,
        offset: None,
    })
}

fn draft(name: &str, address: u16) -> TagDraft {
    TagDraft {
        name: name.to_string(),
        address: holding(address),
        data_type: DataType::Int16,
        description: None,
        decimals: None,
        unit: None,
        alarm: None,
        enabled: true,
    }
}

fn setup() -> (ConnectionManager, Arc<MemoryAdapterFactory>) {
    let factory = Arc::new(MemoryAdapterFactory::new());
    (ConnectionManager::new(factory.clone()), factory)
}

async fn next_event(rx: &mut broadcast::Receiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event timeout")
        .expect("event")
}

#[tokio::test]
async fn connect_transitions_and_emits_events() {
    let (manager, _) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    assert_eq!(connection.status, ConnectionStatus::Disconnected);
    let mut rx = manager.subscribe();

    manager.connect(&connection.id).await.expect("connect");
    assert_eq!(manager.status(&connection.id), Some(ConnectionStatus::Connected));
    assert_eq!(next_event(&mut rx).await.status, ConnectionStatus::Connecting);
    assert_eq!(next_event(&mut rx).await.status, ConnectionStatus::Connected);

    manager.disconnect(&connection.id).await.expect("disconnect");
    let event = next_event(&mut rx).await;
    assert_eq!(event.connection_id, connection.id);
    assert_eq!(event.status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn connect_unknown_is_not_found() {
    let (manager, _) = setup();
    let err = manager.connect("missing").await.unwrap_err();
    assert!(matches!(err, ConnectionError::NotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn connect_twice_is_noop() {
    let (manager, factory) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    manager.connect(&connection.id).await.expect("connect");
    manager.connect(&connection.id).await.expect("connect again");
    assert_eq!(factory.adapter_for(&connection.id).connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn connect_while_connecting_is_noop() {
    let (manager, factory) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    factory
        .adapter_for(&connection.id)
        .set_connect_delay(Some(Duration::from_millis(500)));

    let background = manager.clone();
    let id = connection.id.clone();
    let pending = tokio::spawn(async move { background.connect(&id).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(manager.status(&connection.id), Some(ConnectionStatus::Connecting));

    manager.connect(&connection.id).await.expect("noop connect");
    pending.await.expect("join").expect("connect");
    assert_eq!(manager.status(&connection.id), Some(ConnectionStatus::Connected));
    assert_eq!(factory.adapter_for(&connection.id).connect_calls(), 1);
}

#[tokio::test]
async fn connect_failure_sets_error() {
    let (manager, factory) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    factory.adapter_for(&connection.id).fail_connect(Some("refused"));

    let err = manager.connect(&connection.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdapterConnect);
    let stored = manager.get_connection(&connection.id).expect("get");
    assert_eq!(stored.status, ConnectionStatus::Error);
    assert!(stored.last_error.unwrap_or_default().contains("refused"));

    // error → connecting 合法，恢复后可以重新连接
    factory.adapter_for(&connection.id).fail_connect(None);
    manager.connect(&connection.id).await.expect("reconnect");
    let stored = manager.get_connection(&connection.id).expect("get");
    assert_eq!(stored.status, ConnectionStatus::Connected);
    assert_eq!(stored.last_error, None);
}

#[tokio::test]
async fn delete_requires_disconnect_and_removes_tags() {
    let (manager, _) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    manager.create_tag(&connection.id, draft("T1", 1)).expect("tag");
    manager.connect(&connection.id).await.expect("connect");

    let err = manager.delete_connection(&connection.id).await.unwrap_err();
    assert!(matches!(err, ConnectionError::InvalidState(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    manager.disconnect(&connection.id).await.expect("disconnect");
    manager.delete_connection(&connection.id).await.expect("delete");
    assert!(matches!(
        manager.get_connection(&connection.id),
        Err(ConnectionError::NotFound(_))
    ));
    assert!(matches!(
        manager.list_tags(&connection.id),
        Err(ConnectionError::NotFound(_))
    ));
}

#[tokio::test]
async fn read_once_requires_connection() {
    let (manager, factory) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");

    let err = manager
        .read_once(&connection.id, holding(10), DataType::Int16)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::NotConnected(_)));
    assert!(err.to_string().starts_with("Not connected"));

    factory
        .adapter_for(&connection.id)
        .set_address_value(holding(10), TagValue::Number(21.0));
    manager.connect(&connection.id).await.expect("connect");
    let result = manager
        .read_once(&connection.id, holding(10), DataType::Int16)
        .await
        .expect("read");
    assert_eq!(result.value, TagValue::Number(21.0));
    assert_eq!(result.quality, Quality::Good);
}

#[tokio::test]
async fn adapter_status_is_mirrored() {
    let (manager, factory) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    manager.connect(&connection.id).await.expect("connect");
    let mut rx = manager.subscribe();

    factory
        .adapter_for(&connection.id)
        .simulate_status(ConnectionStatus::Error, Some("link down"));
    let event = next_event(&mut rx).await;
    assert_eq!(event.status, ConnectionStatus::Error);
    assert_eq!(event.error.as_deref(), Some("link down"));
    let stored = manager.get_connection(&connection.id).expect("get");
    assert_eq!(stored.status, ConnectionStatus::Error);
    assert_eq!(stored.last_error.as_deref(), Some("link down"));
}

#[tokio::test]
async fn adapter_self_reconnect_recovers_from_error() {
    let (manager, factory) = setup();
    let connection = manager.create_connection("broker", modbus_config()).expect("create");
    manager.connect(&connection.id).await.expect("connect");
    let mut rx = manager.subscribe();
    let adapter = factory.adapter_for(&connection.id);

    adapter.simulate_status(ConnectionStatus::Error, Some("link down"));
    assert_eq!(next_event(&mut rx).await.status, ConnectionStatus::Error);

    // 事件循环收到新的 CONNACK：connecting 与 connected 连续上报
    adapter.simulate_status(ConnectionStatus::Connecting, None);
    adapter.simulate_status(ConnectionStatus::Connected, None);
    assert_eq!(next_event(&mut rx).await.status, ConnectionStatus::Connecting);
    assert_eq!(next_event(&mut rx).await.status, ConnectionStatus::Connected);

    let stored = manager.get_connection(&connection.id).expect("get");
    assert_eq!(stored.status, ConnectionStatus::Connected);
    assert_eq!(stored.last_error, None);
    assert!(manager.is_connected(&connection.id));
}

#[tokio::test]
async fn illegal_adapter_transition_is_ignored() {
    let (manager, factory) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    manager.connect(&connection.id).await.expect("connect");
    manager.disconnect(&connection.id).await.expect("disconnect");
    let mut rx = manager.subscribe();

    // disconnected → connected 不是合法迁移
    factory
        .adapter_for(&connection.id)
        .simulate_status(ConnectionStatus::Connected, None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(manager.status(&connection.id), Some(ConnectionStatus::Disconnected));
}

#[tokio::test]
async fn update_rejected_while_connected() {
    let (manager, _) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    manager.connect(&connection.id).await.expect("connect");

    let err = manager
        .update_connection(&connection.id, Some("renamed".to_string()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectionError::InvalidState(_)));

    manager.disconnect(&connection.id).await.expect("disconnect");
    let mqtt = ConnectionConfig::Mqtt(MqttConfig {
        broker_url: "mqtt://127.0.0.1:1883".to_string(),
        client_id: None,
        username: None,
        password: None,
        keep_alive_secs: 30,
        clean_session: true,
        connect_timeout_ms: 1000,
    });
    let updated = manager
        .update_connection(&connection.id, Some("broker".to_string()), Some(mqtt))
        .await
        .expect("update");
    assert_eq!(updated.name, "broker");
    assert_eq!(updated.protocol, domain::Protocol::Mqtt);
    assert!(manager.adapter(&connection.id).is_none());
}

#[tokio::test]
async fn tag_crud() {
    let (manager, _) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    let t1 = manager.create_tag(&connection.id, draft("T1", 1)).expect("t1");
    let t2 = manager.create_tag(&connection.id, draft("T2", 2)).expect("t2");

    let tags = manager.list_tags(&connection.id).expect("list");
    assert_eq!(tags.len(), 2);
    assert_eq!(manager.get_tag(&connection.id, &t1.id).expect("get").name, "T1");

    let updated = manager
        .update_tag(
            &connection.id,
            &t2.id,
            TagUpdate {
                enabled: Some(false),
                unit: Some("kW".to_string()),
                ..TagUpdate::default()
            },
        )
        .expect("update");
    assert!(!updated.enabled);
    assert_eq!(updated.unit.as_deref(), Some("kW"));
    assert_eq!(manager.enabled_tags(&connection.id).expect("enabled").len(), 1);

    let ordered = manager
        .tags_by_ids(&connection.id, &[t2.id.clone(), "missing".to_string(), t1.id.clone()])
        .expect("by ids");
    let ids: Vec<_> = ordered.iter().map(|tag| tag.id.clone()).collect();
    assert_eq!(ids, vec![t2.id.clone(), t1.id.clone()]);

    assert!(matches!(
        manager.update_tag(&connection.id, "missing", TagUpdate::default()),
        Err(ConnectionError::TagNotFound(_))
    ));
    assert!(matches!(
        manager.delete_tag(&connection.id, "missing"),
        Err(ConnectionError::TagNotFound(_))
    ));
    manager.delete_tag(&connection.id, &t1.id).expect("delete");
    assert_eq!(manager.list_tags(&connection.id).expect("list").len(), 1);
}

#[tokio::test]
async fn tag_address_must_match_protocol() {
    let (manager, _) = setup();
    let connection = manager.create_connection("plc", modbus_config()).expect("create");
    let mut wrong = draft("T1", 1);
    wrong.address = TagAddress::Mqtt(MqttAddress {
        topic: "a/b".to_string(),
        json_path: None,
    });
    let err = manager.create_tag(&connection.id, wrong).unwrap_err();
    assert!(matches!(err, ConnectionError::InvalidTag(_)));
}
