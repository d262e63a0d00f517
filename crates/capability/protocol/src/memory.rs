//! 内存适配器（用于接线与测试）
//!
//! 不做任何网络 I/O：点位值、连接失败、读失败、发布结果都可以预先设置，
//! 发布出去的消息会被记录下来供断言。

use crate::adapter::{AdapterEvent, AdapterFactory, ProtocolAdapter, StatusSignal};
use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{
    now_epoch_ms, Connection, ConnectionStatus, Protocol, ReadResult, Tag, TagAddress, TagValue,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

/// 已发布的消息记录
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, TagValue>,
    address_values: Vec<(TagAddress, TagValue)>,
    connect_failure: Option<String>,
    read_failure: Option<String>,
    publish_failure: Option<String>,
    /// 逐次发布结果脚本（true 成功 / false 失败），用完后按 publish_failure 决定
    publish_script: VecDeque<bool>,
    published: Vec<PublishedMessage>,
    read_calls: usize,
    connect_calls: usize,
    connect_delay: Option<Duration>,
    read_delay: Option<Duration>,
}

/// 内存适配器
pub struct MemoryAdapter {
    protocol: Protocol,
    signal: StatusSignal,
    state: Mutex<MemoryState>,
}

impl MemoryAdapter {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            signal: StatusSignal::new(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 设置点位当前值（按点位 ID）
    pub fn set_value(&self, tag_id: impl Into<String>, value: TagValue) {
        self.state().values.insert(tag_id.into(), value);
    }

    /// 设置地址上的当前值（点位 ID 未命中时按地址查找）
    pub fn set_address_value(&self, address: TagAddress, value: TagValue) {
        let mut state = self.state();
        state.address_values.retain(|(existing, _)| *existing != address);
        state.address_values.push((address, value));
    }

    pub fn clear_value(&self, tag_id: &str) {
        self.state().values.remove(tag_id);
    }

    /// 之后的 connect 失败（None 恢复正常）
    pub fn fail_connect(&self, message: Option<&str>) {
        self.state().connect_failure = message.map(str::to_string);
    }

    /// 之后的 read_tags 整批失败（None 恢复正常）
    pub fn fail_reads(&self, message: Option<&str>) {
        self.state().read_failure = message.map(str::to_string);
    }

    /// 之后的 publish 失败（None 恢复正常）
    pub fn fail_publish(&self, message: Option<&str>) {
        self.state().publish_failure = message.map(str::to_string);
    }

    /// 追加逐次发布结果
    pub fn script_publish(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.state().publish_script.extend(outcomes);
    }

    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state().connect_delay = delay;
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        self.state().read_delay = delay;
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    pub fn read_calls(&self) -> usize {
        self.state().read_calls
    }

    pub fn connect_calls(&self) -> usize {
        self.state().connect_calls
    }

    /// 模拟底层链路的状态变化（例如对端掉线）
    pub fn simulate_status(&self, status: ConnectionStatus, error: Option<&str>) {
        self.signal.set(status, error.map(str::to_string));
    }
}

#[async_trait]
impl ProtocolAdapter for MemoryAdapter {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn connect(&self) -> Result<(), ProtocolError> {
        let (delay, failure) = {
            let mut state = self.state();
            state.connect_calls += 1;
            (state.connect_delay, state.connect_failure.clone())
        };
        self.signal.set(ConnectionStatus::Connecting, None);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(message) => {
                self.signal
                    .set(ConnectionStatus::Error, Some(message.clone()));
                Err(ProtocolError::Connection(message))
            }
            None => {
                self.signal.set(ConnectionStatus::Connected, None);
                Ok(())
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ProtocolError> {
        self.signal.set(ConnectionStatus::Disconnected, None);
        Ok(())
    }

    async fn read_tags(&self, tags: &[Tag]) -> Result<Vec<ReadResult>, ProtocolError> {
        let delay = {
            let mut state = self.state();
            state.read_calls += 1;
            state.read_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.signal.is_connected() {
            return Err(ProtocolError::NotConnected);
        }

        let state = self.state();
        if let Some(message) = &state.read_failure {
            return Err(ProtocolError::Read(message.clone()));
        }
        let timestamp = now_epoch_ms();
        Ok(tags
            .iter()
            .map(|tag| {
                let value = state.values.get(&tag.id).or_else(|| {
                    state
                        .address_values
                        .iter()
                        .find(|(address, _)| *address == tag.address)
                        .map(|(_, value)| value)
                });
                match value {
                    Some(value) => ReadResult::good(&tag.id, value.clone(), timestamp),
                    None => ReadResult::bad(&tag.id, timestamp),
                }
            })
            .collect())
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: u8,
        retain: bool,
    ) -> Result<(), ProtocolError> {
        if !self.signal.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        let mut state = self.state();
        let succeeded = match state.publish_script.pop_front() {
            Some(outcome) => outcome,
            None => state.publish_failure.is_none(),
        };
        if !succeeded {
            let message = state
                .publish_failure
                .clone()
                .unwrap_or_else(|| "scripted publish failure".to_string());
            return Err(ProtocolError::Publish(message));
        }
        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
            retain,
        });
        Ok(())
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

/// 内存适配器工厂：每个连接 ID 对应一个共享的 MemoryAdapter。
#[derive(Default)]
pub struct MemoryAdapterFactory {
    adapters: Mutex<HashMap<String, Arc<MemoryAdapter>>>,
}

impl MemoryAdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（必要时创建）连接对应的适配器，便于在连接前预置行为。
    pub fn adapter_for(&self, connection_id: &str) -> Arc<MemoryAdapter> {
        self.get_or_create(connection_id, Protocol::ModbusTcp)
    }

    fn get_or_create(&self, connection_id: &str, protocol: Protocol) -> Arc<MemoryAdapter> {
        let mut adapters = match self.adapters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        adapters
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(MemoryAdapter::new(protocol)))
            .clone()
    }
}

impl AdapterFactory for MemoryAdapterFactory {
    fn create(&self, connection: &Connection) -> Result<Arc<dyn ProtocolAdapter>, ProtocolError> {
        Ok(self.get_or_create(&connection.id, connection.protocol))
    }
}
