//! 协议适配器契约
//!
//! 任意协议实现（Modbus / MQTT / OPC UA）都满足同一组能力：
//! 连接、断开、批量读点、释放资源，以及连接状态变更信号。
//! 适配器内部不包含任何调度逻辑。

use crate::error::ProtocolError;
use crate::modbus_tcp::ModbusTcpAdapter;
use crate::mqtt::MqttAdapter;
use async_trait::async_trait;
use domain::{Connection, ConnectionConfig, ConnectionStatus, Protocol, ReadResult, Tag};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::warn;

/// 适配器事件。
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    /// 内部连接状态发生变化
    StatusChanged {
        status: ConnectionStatus,
        error: Option<String>,
    },
    /// 运行期错误（不一定伴随状态变化）
    Error(String),
}

/// 协议适配器。
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// 建立连接：connecting → connected，失败时 → error 并返回错误。
    async fn connect(&self) -> Result<(), ProtocolError>;

    /// 断开连接（幂等），结束时状态总是 disconnected。
    async fn disconnect(&self) -> Result<(), ProtocolError>;

    /// 批量读点，结果与输入一一对应且顺序一致。
    ///
    /// 单点失败以 bad 质量返回；只有整批无法执行（如未连接）时返回错误。
    async fn read_tags(&self, tags: &[Tag]) -> Result<Vec<ReadResult>, ProtocolError>;

    /// 发布消息（桥接目标使用）。
    async fn publish(
        &self,
        _topic: &str,
        _payload: &[u8],
        _qos: u8,
        _retain: bool,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::Unsupported(format!(
            "{} adapter cannot publish",
            self.protocol()
        )))
    }

    /// 释放全部资源（先断开连接）。
    async fn dispose(&self) {
        if let Err(err) = self.disconnect().await {
            warn!(target: "gw.protocol", error = %err, "adapter_dispose_disconnect_failed");
        }
    }

    /// 当前内部连接状态。
    fn status(&self) -> ConnectionStatus;

    fn is_connected(&self) -> bool;

    /// 订阅状态变更事件。
    fn subscribe(&self) -> broadcast::Receiver<AdapterEvent>;
}

/// 适配器内部的连接状态信号。
///
/// 只在状态真正变化时广播 `StatusChanged`。
pub struct StatusSignal {
    connected: AtomicBool,
    status: Mutex<ConnectionStatus>,
    sender: broadcast::Sender<AdapterEvent>,
}

impl StatusSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            connected: AtomicBool::new(false),
            status: Mutex::new(ConnectionStatus::Disconnected),
            sender,
        }
    }

    pub fn set(&self, status: ConnectionStatus, error: Option<String>) {
        self.connected
            .store(status == ConnectionStatus::Connected, Ordering::SeqCst);
        let changed = {
            let mut current = match self.status.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        };
        if changed {
            let _ = self
                .sender
                .send(AdapterEvent::StatusChanged { status, error });
        }
    }

    pub fn error(&self, message: impl Into<String>) {
        let _ = self.sender.send(AdapterEvent::Error(message.into()));
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.status.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.sender.subscribe()
    }
}

impl Default for StatusSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// 适配器工厂：根据连接配置构造适配器（纯构造，不做 I/O）。
pub trait AdapterFactory: Send + Sync {
    fn create(&self, connection: &Connection) -> Result<Arc<dyn ProtocolAdapter>, ProtocolError>;
}

/// 默认工厂：Modbus TCP 与 MQTT。
///
/// 未注册 OPC UA 驱动，OPC UA 连接在构造阶段即失败。
#[derive(Debug, Default)]
pub struct DefaultAdapterFactory;

impl AdapterFactory for DefaultAdapterFactory {
    fn create(&self, connection: &Connection) -> Result<Arc<dyn ProtocolAdapter>, ProtocolError> {
        match &connection.config {
            ConnectionConfig::ModbusTcp(config) => {
                Ok(Arc::new(ModbusTcpAdapter::new(config.clone())))
            }
            ConnectionConfig::Mqtt(config) => Ok(Arc::new(MqttAdapter::new(config.clone()))),
            ConnectionConfig::OpcUa(config) => Err(ProtocolError::Unsupported(format!(
                "no OPC UA driver registered for {}",
                config.endpoint_url
            ))),
        }
    }
}
