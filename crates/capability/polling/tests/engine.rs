use domain::{
    ConnectionConfig, DataType, ErrorKind, ModbusAddress, ModbusTcpConfig, PollingStatus, Quality,
    RegisterKind, Tag, TagAddress, TagDraft, TagUpdate, TagValue, WordOrder,
};
use gw_connection::ConnectionManager;
use gw_polling::{InMemoryDataBuffer, PollingEngine, PollingError, PollingEvent};
use gw_protocol::{MemoryAdapter, MemoryAdapterFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

struct Fixture {
    connections: ConnectionManager,
    engine: PollingEngine,
    buffer: Arc<InMemoryDataBuffer>,
    adapter: Arc<MemoryAdapter>,
    connection_id: String,
    tags: Vec<Tag>,
}

fn draft(name: &str, address: u16) -> TagDraft {
    TagDraft {
        name: name.to_string(),
        address: TagAddress::ModbusTcp(ModbusAddress {
            register: RegisterKind::HoldingRegister,
            address,
            unit_id: None,
            length: None,
            word_order: WordOrder::BigEndian,
            scale: None,
            offset: None,
        }),
        data_type: DataType::Int16,
        description: None,
        decimals: None,
        unit: None,
        alarm: None,
        enabled: true,
    }
}

async fn fixture(connect: bool) -> Fixture {
    let factory = Arc::new(MemoryAdapterFactory::new());
    let connections = ConnectionManager::new(factory.clone());
    let buffer = Arc::new(InMemoryDataBuffer::new(1000));
    let engine = PollingEngine::new(connections.clone(), buffer.clone());
    let connection = connections
        .create_connection(
            "plc",
            ConnectionConfig::ModbusTcp(ModbusTcpConfig {
                host: "127.0.0.1".to_string(),
                port: 502,
                unit_id: 1,
                connect_timeout_ms: 1000,
                request_timeout_ms: 1000,
            }),
        )
        .expect("create");
    let tags = vec![
        connections.create_tag(&connection.id, draft("T1", 1)).expect("t1"),
        connections.create_tag(&connection.id, draft("T2", 2)).expect("t2"),
    ];
    let adapter = factory.adapter_for(&connection.id);
    adapter.set_value(&tags[0].id, TagValue::Number(11.0));
    adapter.set_value(&tags[1].id, TagValue::Number(22.0));
    if connect {
        connections.connect(&connection.id).await.expect("connect");
    }
    Fixture {
        connections,
        engine,
        buffer,
        adapter,
        connection_id: connection.id,
        tags,
    }
}

fn drain(rx: &mut broadcast::Receiver<PollingEvent>) -> Vec<PollingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn data_events(events: &[PollingEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, PollingEvent::Data(_)))
        .count()
}

#[tokio::test(start_paused = true)]
async fn interval_is_clamped() {
    let f = fixture(true).await;
    let status = f.engine.start_polling(&f.connection_id, vec![], 10).expect("start");
    assert_eq!(status.interval_ms, 100);
    let status = f
        .engine
        .start_polling(&f.connection_id, vec![], 3_600_000)
        .expect("restart");
    assert_eq!(status.interval_ms, 60_000);
    f.engine.stop_all();
}

#[tokio::test(start_paused = true)]
async fn start_requires_known_connected_connection() {
    let f = fixture(false).await;
    let err = f.engine.start_polling("missing", vec![], 1000).unwrap_err();
    assert!(matches!(err, PollingError::NotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = f.engine.start_polling(&f.connection_id, vec![], 1000).unwrap_err();
    assert!(matches!(err, PollingError::NotConnected(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test(start_paused = true)]
async fn no_enabled_tags_is_rejected() {
    let f = fixture(true).await;
    for tag in &f.tags {
        f.connections
            .update_tag(
                &f.connection_id,
                &tag.id,
                TagUpdate {
                    enabled: Some(false),
                    ..TagUpdate::default()
                },
            )
            .expect("disable");
    }
    let err = f.engine.start_polling(&f.connection_id, vec![], 1000).unwrap_err();
    assert!(matches!(err, PollingError::NoEnabledTags));
    assert_eq!(err.to_string(), "No enabled tags to poll");

    let err = f
        .engine
        .start_polling(&f.connection_id, vec!["missing".to_string()], 1000)
        .unwrap_err();
    assert!(matches!(err, PollingError::NoEnabledTags));
}

#[tokio::test(start_paused = true)]
async fn polls_immediately_then_every_interval() {
    let f = fixture(true).await;
    let mut rx = f.engine.subscribe();
    f.engine.start_polling(&f.connection_id, vec![], 1000).expect("start");

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let events = drain(&mut rx);
    assert!(matches!(
        events.first(),
        Some(PollingEvent::Status(status)) if status.is_polling && status.tag_count == 2
    ));
    assert_eq!(data_events(&events), 3);
    assert_eq!(f.adapter.read_calls(), 3);

    let Some(PollingEvent::Data(data)) = events.iter().find(|e| matches!(e, PollingEvent::Data(_)))
    else {
        panic!("no data event");
    };
    assert_eq!(data.connection_id, f.connection_id);
    assert_eq!(data.values.len(), 2);
    assert_eq!(data.values[0].tag_id, f.tags[0].id);
    assert_eq!(data.values[1].value, TagValue::Number(22.0));

    // 每次轮询的结果都写入数据缓冲
    assert_eq!(f.buffer.len(), 6);
    assert_eq!(
        f.buffer.latest(&f.tags[0].id).map(|p| p.value),
        Some(TagValue::Number(11.0))
    );

    let status = f.engine.get_polling_status(&f.connection_id);
    assert!(status.is_polling);
    assert_eq!(status.interval_ms, 1000);
    assert!(status.last_poll_timestamp > 0);
    f.engine.stop_polling(&f.connection_id);
}

#[tokio::test(start_paused = true)]
async fn second_start_replaces_session() {
    let f = fixture(true).await;
    let mut rx = f.engine.subscribe();
    f.engine.start_polling(&f.connection_id, vec![], 1000).expect("start");
    tokio::time::sleep(Duration::from_millis(100)).await;
    f.engine.start_polling(&f.connection_id, vec![], 500).expect("restart");

    // 新会话：100、600、1100 三次；旧会话的 1000 不应再触发
    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(f.adapter.read_calls(), 4);
    assert_eq!(f.engine.active_connections(), vec![f.connection_id.clone()]);
    assert_eq!(f.engine.get_polling_status(&f.connection_id).interval_ms, 500);

    let statuses: Vec<bool> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            PollingEvent::Status(status) => Some(status.is_polling),
            PollingEvent::Data(_) => None,
        })
        .collect();
    assert_eq!(statuses, vec![true, false, true]);
    f.engine.stop_all();
}

#[tokio::test(start_paused = true)]
async fn read_failure_emits_degraded_payload() {
    let f = fixture(true).await;
    f.adapter.fail_reads(Some("bus timeout"));
    let mut rx = f.engine.subscribe();
    f.engine.start_polling(&f.connection_id, vec![], 1000).expect("start");

    tokio::time::sleep(Duration::from_millis(10)).await;
    let events = drain(&mut rx);
    let data = events
        .iter()
        .find_map(|event| match event {
            PollingEvent::Data(data) => Some(data.clone()),
            PollingEvent::Status(_) => None,
        })
        .expect("data event");
    assert_eq!(data.values.len(), 2);
    assert!(data
        .values
        .iter()
        .all(|value| value.quality == Quality::Bad && value.value == TagValue::Number(0.0)));
    assert!(f.engine.is_polling(&f.connection_id));

    // 读取恢复后继续正常轮询
    f.adapter.fail_reads(None);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(f.buffer.len(), 2);
    f.engine.stop_all();
}

#[tokio::test(start_paused = true)]
async fn stops_itself_when_connection_drops() {
    let f = fixture(true).await;
    let mut rx = f.engine.subscribe();
    f.engine.start_polling(&f.connection_id, vec![], 500).expect("start");
    tokio::time::sleep(Duration::from_millis(10)).await;

    f.connections.disconnect(&f.connection_id).await.expect("disconnect");
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(!f.engine.is_polling(&f.connection_id));
    assert_eq!(f.engine.get_polling_status(&f.connection_id), PollingStatus::default());
    let last_status = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            PollingEvent::Status(status) => Some(status),
            PollingEvent::Data(_) => None,
        })
        .last()
        .expect("status");
    assert!(!last_status.is_polling);
    assert_eq!(f.adapter.read_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stops_itself_when_tags_disabled() {
    let f = fixture(true).await;
    f.engine
        .start_polling(&f.connection_id, vec![f.tags[1].id.clone()], 200)
        .expect("start");
    assert_eq!(f.engine.get_polling_status(&f.connection_id).tag_count, 1);

    f.connections
        .update_tag(
            &f.connection_id,
            &f.tags[1].id,
            TagUpdate {
                enabled: Some(false),
                ..TagUpdate::default()
            },
        )
        .expect("disable");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!f.engine.is_polling(&f.connection_id));
}

#[tokio::test(start_paused = true)]
async fn in_flight_result_discarded_after_stop() {
    let f = fixture(true).await;
    f.adapter.set_read_delay(Some(Duration::from_millis(500)));
    let mut rx = f.engine.subscribe();
    f.engine.start_polling(&f.connection_id, vec![], 100).expect("start");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(f.engine.stop_polling(&f.connection_id));
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert_eq!(data_events(&drain(&mut rx)), 0);
    assert!(f.buffer.is_empty());
    assert_eq!(f.adapter.read_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_without_session_is_zeroed() {
    let f = fixture(true).await;
    assert_eq!(
        f.engine.get_polling_status(&f.connection_id),
        PollingStatus {
            is_polling: false,
            interval_ms: 0,
            last_poll_timestamp: 0,
            tag_count: 0,
        }
    );
    assert_eq!(f.engine.get_polling_status("missing"), PollingStatus::default());
    assert!(!f.engine.stop_polling(&f.connection_id));
}

#[tokio::test(start_paused = true)]
async fn stop_all_clears_sessions() {
    let f = fixture(true).await;
    f.engine.start_polling(&f.connection_id, vec![], 1000).expect("start");
    tokio::time::sleep(Duration::from_millis(10)).await;
    f.engine.dispose();
    assert!(f.engine.active_connections().is_empty());
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(f.adapter.read_calls(), 1);
}
