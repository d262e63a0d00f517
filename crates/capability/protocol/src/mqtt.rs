//! MQTT 适配器
//!
//! - 读点：按点位 topic 订阅，读取时返回该 topic 最近一次收到的载荷
//!   （尚未收到任何消息的点位返回 uncertain 质量）
//! - 发布：桥接目标通过 `publish` 写出消息
//! - 断线后 eventloop 自动重连，重连成功后重新订阅并广播状态

use crate::adapter::{AdapterEvent, ProtocolAdapter, StatusSignal};
use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{
    now_epoch_ms, ConnectionStatus, DataType, MqttConfig, Protocol, Quality, ReadResult, Tag,
    TagAddress, TagValue,
};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::{Host, Url};

/// 最近一次收到的载荷
#[derive(Debug, Clone)]
struct LastMessage {
    payload: Vec<u8>,
    received_at_ms: i64,
}

struct MqttSession {
    client: AsyncClient,
    eventloop: JoinHandle<()>,
}

/// MQTT 适配器
pub struct MqttAdapter {
    config: MqttConfig,
    signal: Arc<StatusSignal>,
    session: Mutex<Option<MqttSession>>,
    subscriptions: Arc<RwLock<HashSet<String>>>,
    messages: Arc<RwLock<HashMap<String, LastMessage>>>,
}

impl MqttAdapter {
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            signal: Arc::new(StatusSignal::new()),
            session: Mutex::new(None),
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
            messages: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn options(&self) -> Result<MqttOptions, ProtocolError> {
        let endpoint = parse_broker_url(&self.config.broker_url)?;
        let client_id = self
            .config
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("gw-{}", uuid::Uuid::new_v4()));
        let mut options = MqttOptions::new(client_id, endpoint.host, endpoint.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(5)));
        options.set_clean_session(self.config.clean_session);
        // 显式配置的凭据优先，否则取代理地址中的 userinfo
        let username = self.config.username.clone().or(endpoint.username);
        if let Some(username) = username {
            let password = self
                .config
                .password
                .clone()
                .or(endpoint.password)
                .unwrap_or_default();
            options.set_credentials(username, password);
        }
        Ok(options)
    }

    async fn ensure_subscribed(&self, client: &AsyncClient, topic: &str) {
        let known = self
            .subscriptions
            .read()
            .map(|set| set.contains(topic))
            .unwrap_or(false);
        if known {
            return;
        }
        match client.subscribe(topic, QoS::AtLeastOnce).await {
            Ok(()) => {
                if let Ok(mut set) = self.subscriptions.write() {
                    set.insert(topic.to_string());
                }
                debug!(target: "gw.protocol", topic = %topic, "mqtt_subscribed");
            }
            Err(err) => {
                warn!(target: "gw.protocol", topic = %topic, error = %err, "mqtt_subscribe_failed");
            }
        }
    }

    fn last_message(&self, topic: &str) -> Option<LastMessage> {
        self.messages
            .read()
            .ok()
            .and_then(|map| map.get(topic).cloned())
    }
}

#[async_trait]
impl ProtocolAdapter for MqttAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Mqtt
    }

    async fn connect(&self) -> Result<(), ProtocolError> {
        let mut guard = self.session.lock().await;
        if guard.is_some() && self.signal.is_connected() {
            return Ok(());
        }
        if let Some(stale) = guard.take() {
            stale.eventloop.abort();
        }
        self.signal.set(ConnectionStatus::Connecting, None);

        let options = match self.options() {
            Ok(options) => options,
            Err(err) => {
                self.signal.set(ConnectionStatus::Error, Some(err.to_string()));
                return Err(err);
            }
        };
        let (client, mut eventloop) = AsyncClient::new(options, 64);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();

        let signal = self.signal.clone();
        let messages = self.messages.clone();
        let subscriptions = self.subscriptions.clone();
        let resubscribe = client.clone();
        let broker = self.config.broker_url.clone();
        let handle = tokio::spawn(async move {
            let mut ready = Some(ready_tx);
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code != ConnectReturnCode::Success {
                            let message = format!("connection refused: {:?}", ack.code);
                            if let Some(tx) = ready.take() {
                                let _ = tx.send(Err(message));
                                return;
                            }
                            signal.set(ConnectionStatus::Error, Some(message.clone()));
                            signal.error(message);
                            continue;
                        }
                        if !signal.is_connected() {
                            signal.set(ConnectionStatus::Connecting, None);
                        }
                        signal.set(ConnectionStatus::Connected, None);
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Ok(()));
                        } else {
                            info!(target: "gw.protocol", broker = %broker, "mqtt_reconnected");
                            let topics: Vec<String> = subscriptions
                                .read()
                                .map(|set| set.iter().cloned().collect())
                                .unwrap_or_default();
                            for topic in topics {
                                if let Err(err) = resubscribe.try_subscribe(topic, QoS::AtLeastOnce)
                                {
                                    warn!(target: "gw.protocol", error = %err, "mqtt_resubscribe_failed");
                                }
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if let Ok(mut map) = messages.write() {
                            map.insert(
                                publish.topic.clone(),
                                LastMessage {
                                    payload: publish.payload.to_vec(),
                                    received_at_ms: now_epoch_ms(),
                                },
                            );
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let message = err.to_string();
                        if let Some(tx) = ready.take() {
                            let _ = tx.send(Err(message));
                            return;
                        }
                        if signal.is_connected() {
                            warn!(target: "gw.protocol", broker = %broker, error = %message, "mqtt eventloop error");
                            signal.set(ConnectionStatus::Error, Some(message.clone()));
                            signal.error(message);
                        }
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let outcome = match timeout(connect_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(message))) => Err(ProtocolError::Connection(message)),
            Ok(Err(_)) => Err(ProtocolError::Connection("eventloop stopped".to_string())),
            Err(_) => Err(ProtocolError::Timeout(format!(
                "no CONNACK from {} within {} ms",
                self.config.broker_url, self.config.connect_timeout_ms
            ))),
        };

        match outcome {
            Ok(()) => {
                *guard = Some(MqttSession {
                    client,
                    eventloop: handle,
                });
                info!(target: "gw.protocol", broker = %self.config.broker_url, "mqtt_connected");
                Ok(())
            }
            Err(err) => {
                handle.abort();
                self.signal.set(ConnectionStatus::Error, Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        if let Some(session) = self.session.lock().await.take() {
            if let Err(err) = session.client.try_disconnect() {
                debug!(target: "gw.protocol", error = %err, "mqtt_disconnect_request_failed");
            }
            session.eventloop.abort();
        }
        if let Ok(mut set) = self.subscriptions.write() {
            set.clear();
        }
        self.signal.set(ConnectionStatus::Disconnected, None);
        Ok(())
    }

    async fn read_tags(&self, tags: &[Tag]) -> Result<Vec<ReadResult>, ProtocolError> {
        let client = {
            let guard = self.session.lock().await;
            match guard.as_ref() {
                Some(session) if self.signal.is_connected() => session.client.clone(),
                _ => return Err(ProtocolError::NotConnected),
            }
        };

        let mut results = Vec::with_capacity(tags.len());
        for tag in tags {
            let now = now_epoch_ms();
            let TagAddress::Mqtt(address) = &tag.address else {
                warn!(target: "gw.protocol", tag_id = %tag.id, "tag address is not an mqtt address");
                results.push(ReadResult::bad(&tag.id, now));
                continue;
            };
            self.ensure_subscribed(&client, &address.topic).await;
            let result = match self.last_message(&address.topic) {
                None => ReadResult {
                    tag_id: tag.id.clone(),
                    value: TagValue::Null,
                    quality: Quality::Uncertain,
                    timestamp: now,
                },
                Some(message) => {
                    match decode_payload(
                        &message.payload,
                        address.json_path.as_deref(),
                        tag.data_type,
                    ) {
                        Ok(value) => ReadResult::good(&tag.id, value, message.received_at_ms),
                        Err(err) => {
                            debug!(target: "gw.protocol", tag_id = %tag.id, error = %err, "mqtt payload decode failed");
                            ReadResult::bad(&tag.id, message.received_at_ms)
                        }
                    }
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: u8,
        retain: bool,
    ) -> Result<(), ProtocolError> {
        let client = {
            let guard = self.session.lock().await;
            match guard.as_ref() {
                Some(session) if self.signal.is_connected() => session.client.clone(),
                _ => return Err(ProtocolError::NotConnected),
            }
        };
        client
            .publish(topic, qos_from_u8(qos), retain, payload.to_vec())
            .await
            .map_err(|err| ProtocolError::Publish(err.to_string()))
    }

    fn status(&self) -> ConnectionStatus {
        self.signal.status()
    }

    fn is_connected(&self) -> bool {
        self.signal.is_connected()
    }

    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.signal.subscribe()
    }
}

/// 代理地址解析结果
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 解析代理地址：支持 `mqtt://`、`tcp://` 前缀或裸 `host[:port]`，可带 `user:password@`。
pub(crate) fn parse_broker_url(raw: &str) -> Result<BrokerEndpoint, ProtocolError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::ConfigParse("empty broker url".to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("mqtt://{}", trimmed)
    };
    let url = Url::parse(&candidate)
        .map_err(|err| ProtocolError::ConfigParse(format!("invalid broker url {}: {}", raw, err)))?;
    if !matches!(url.scheme(), "mqtt" | "tcp") {
        return Err(ProtocolError::ConfigParse(format!(
            "unsupported broker scheme: {}",
            url.scheme()
        )));
    }
    let host = match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        _ => {
            return Err(ProtocolError::ConfigParse(format!(
                "broker url has no host: {}",
                raw
            )))
        }
    };
    let username = Some(url.username())
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    Ok(BrokerEndpoint {
        host,
        port: url.port().unwrap_or(1883),
        username,
        password: url.password().map(str::to_string),
    })
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// 把载荷解析为点位值。非 JSON 文本按原样参与类型转换。
pub(crate) fn decode_payload(
    payload: &[u8],
    json_path: Option<&str>,
    data_type: DataType,
) -> Result<TagValue, ProtocolError> {
    let text = std::str::from_utf8(payload)
        .map_err(|err| ProtocolError::DataParse(err.to_string()))?
        .trim();
    let root: serde_json::Value = serde_json::from_str(text)
        .unwrap_or_else(|_| serde_json::Value::String(text.to_string()));

    let selected = match json_path.filter(|path| !path.is_empty()) {
        Some(path) => {
            let mut current = &root;
            for segment in path.split('.') {
                current = match current {
                    serde_json::Value::Object(map) => map.get(segment),
                    serde_json::Value::Array(items) => segment
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| items.get(index)),
                    _ => None,
                }
                .ok_or_else(|| ProtocolError::DataParse(format!("path not found: {}", path)))?;
            }
            current
        }
        None => &root,
    };

    json_to_tag_value(selected, data_type)
}

fn json_to_tag_value(value: &serde_json::Value, data_type: DataType) -> Result<TagValue, ProtocolError> {
    use serde_json::Value;
    match data_type {
        DataType::Bool => match value {
            Value::Bool(flag) => Ok(TagValue::Bool(*flag)),
            Value::Number(number) => Ok(TagValue::Bool(number.as_f64().unwrap_or(0.0) != 0.0)),
            Value::String(text) => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(TagValue::Bool(true)),
                "false" | "0" | "off" => Ok(TagValue::Bool(false)),
                _ => Err(ProtocolError::DataParse(format!("not a bool: {}", text))),
            },
            other => Err(ProtocolError::DataParse(format!("not a bool: {}", other))),
        },
        DataType::String => match value {
            Value::String(text) => Ok(TagValue::Text(text.clone())),
            other => Ok(TagValue::Text(other.to_string())),
        },
        _ => match value {
            Value::Number(number) => number
                .as_f64()
                .map(TagValue::Number)
                .ok_or_else(|| ProtocolError::DataParse(format!("not a number: {}", number))),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map(TagValue::Number)
                .map_err(|_| ProtocolError::DataParse(format!("not a number: {}", text))),
            Value::Bool(flag) => Ok(TagValue::Number(if *flag { 1.0 } else { 0.0 })),
            other => Err(ProtocolError::DataParse(format!("not a number: {}", other))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str, port: u16) -> BrokerEndpoint {
        BrokerEndpoint {
            host: host.to_string(),
            port,
            username: None,
            password: None,
        }
    }

    #[test]
    fn broker_url_variants() {
        assert_eq!(
            parse_broker_url("mqtt://broker.local:1884").unwrap(),
            endpoint("broker.local", 1884)
        );
        assert_eq!(parse_broker_url("tcp://10.0.0.2").unwrap(), endpoint("10.0.0.2", 1883));
        assert_eq!(parse_broker_url("localhost:1883").unwrap(), endpoint("localhost", 1883));
        assert_eq!(parse_broker_url("broker.local").unwrap(), endpoint("broker.local", 1883));
        assert!(parse_broker_url("ws://broker:80").is_err());
        assert!(parse_broker_url("mqtt://broker:notaport").is_err());
        assert!(parse_broker_url("   ").is_err());
        assert!(parse_broker_url("mqtt://").is_err());
    }

    #[test]
    fn broker_url_with_ipv6_host() {
        assert_eq!(parse_broker_url("mqtt://[::1]:1884").unwrap(), endpoint("::1", 1884));
        assert_eq!(parse_broker_url("mqtt://[::1]").unwrap(), endpoint("::1", 1883));
    }

    #[test]
    fn broker_url_with_credentials() {
        let parsed = parse_broker_url("mqtt://user:pw@broker.local:1883").unwrap();
        assert_eq!(parsed.host, "broker.local");
        assert_eq!(parsed.port, 1883);
        assert_eq!(parsed.username.as_deref(), Some("user"));
        assert_eq!(parsed.password.as_deref(), Some("pw"));

        let parsed = parse_broker_url("mqtt://reader@broker.local").unwrap();
        assert_eq!(parsed.username.as_deref(), Some("reader"));
        assert_eq!(parsed.password, None);
    }

    #[test]
    fn payload_with_json_path() {
        let payload = br#"{"data":{"temperature":21.5,"items":[1,2,3]}}"#;
        assert_eq!(
            decode_payload(payload, Some("data.temperature"), DataType::Float32).unwrap(),
            TagValue::Number(21.5)
        );
        assert_eq!(
            decode_payload(payload, Some("data.items.2"), DataType::Int16).unwrap(),
            TagValue::Number(3.0)
        );
        assert!(decode_payload(payload, Some("data.missing"), DataType::Int16).is_err());
    }

    #[test]
    fn plain_text_payloads() {
        assert_eq!(
            decode_payload(b" 42 ", None, DataType::Int32).unwrap(),
            TagValue::Number(42.0)
        );
        assert_eq!(
            decode_payload(b"on", None, DataType::Bool).unwrap(),
            TagValue::Bool(true)
        );
        assert_eq!(
            decode_payload(b"running", None, DataType::String).unwrap(),
            TagValue::Text("running".to_string())
        );
        assert!(decode_payload(b"running", None, DataType::Float64).is_err());
    }
}
