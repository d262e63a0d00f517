//! 连接模型
//!
//! 一个 Connection 代表到现场设备或消息代理的一条配置好的链路。
//! 协议配置使用按协议区分的和类型，协议由配置变体唯一决定。

use serde::{Deserialize, Serialize};

/// 协议种类（封闭枚举）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    ModbusTcp,
    Mqtt,
    OpcUa,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::ModbusTcp => "modbus_tcp",
            Protocol::Mqtt => "mqtt",
            Protocol::OpcUa => "opc_ua",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 连接状态。
///
/// 状态机：
///
/// ```text
/// disconnected ──▶ connecting ──▶ connected
///      ▲               │              │
///      │               ▼              │
///      └──────────── error ◀──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }

    /// 是否为合法的状态迁移（同状态视为合法）。
    pub fn can_transition_to(&self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Connected, Error)
                | (Error, Disconnected)
                | (Error, Connecting)
        )
    }

    /// 连接处于活动期（已连接或正在连接），此时禁止删除与修改配置。
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connected | ConnectionStatus::Connecting
        )
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modbus TCP 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModbusTcpConfig {
    /// 从设备主机地址
    pub host: String,
    /// 端口（默认 502）
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    /// 默认从站 ID（点位地址未指定时使用）
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// 单次请求超时（毫秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// MQTT 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfig {
    /// 代理地址，例如 `mqtt://127.0.0.1:1883` 或 `tcp://host:port`
    pub broker_url: String,
    /// 客户端 ID（为空时自动生成）
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 心跳间隔（秒）
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
    /// 等待 CONNACK 的超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// OPC UA 消息安全模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpcUaSecurityMode {
    #[default]
    None,
    Sign,
    SignAndEncrypt,
}

/// OPC UA 连接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpcUaConfig {
    /// 端点地址，例如 `opc.tcp://192.168.1.10:4840`
    pub endpoint_url: String,
    #[serde(default)]
    pub security_mode: OpcUaSecurityMode,
    /// 安全策略名称（None / Basic256Sha256 ...）
    #[serde(default = "default_security_policy")]
    pub security_policy: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    3000
}

fn default_keep_alive() -> u64 {
    30
}

fn default_clean_session() -> bool {
    true
}

fn default_security_policy() -> String {
    "None".to_string()
}

/// 按协议区分的连接配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", content = "config", rename_all = "snake_case")]
pub enum ConnectionConfig {
    ModbusTcp(ModbusTcpConfig),
    Mqtt(MqttConfig),
    OpcUa(OpcUaConfig),
}

impl ConnectionConfig {
    pub fn protocol(&self) -> Protocol {
        match self {
            ConnectionConfig::ModbusTcp(_) => Protocol::ModbusTcp,
            ConnectionConfig::Mqtt(_) => Protocol::Mqtt,
            ConnectionConfig::OpcUa(_) => Protocol::OpcUa,
        }
    }
}

/// 连接记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub name: String,
    pub protocol: Protocol,
    pub config: ConnectionConfig,
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    pub created_at: i64,
}

/// 连接状态变更通知。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEvent {
    pub connection_id: String,
    pub status: ConnectionStatus,
    pub error: Option<String>,
}
