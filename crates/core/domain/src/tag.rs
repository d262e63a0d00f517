//! 点位（Tag）与读取结果模型

use serde::{Deserialize, Serialize};

/// 点位数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    #[default]
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    String,
}

impl DataType {
    /// 该类型占用的 16 位寄存器数量（字符串由地址长度决定）。
    pub fn register_count(&self) -> u16 {
        match self {
            DataType::Bool | DataType::Int16 | DataType::Uint16 => 1,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 2,
            DataType::Float64 => 4,
            DataType::String => 1,
        }
    }
}

/// Modbus 寄存器区
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterKind {
    Coil,
    DiscreteInput,
    #[default]
    HoldingRegister,
    InputRegister,
}

/// 多寄存器值的字序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Modbus 点位地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModbusAddress {
    #[serde(default)]
    pub register: RegisterKind,
    pub address: u16,
    /// 覆盖连接级从站 ID
    #[serde(default)]
    pub unit_id: Option<u8>,
    /// 字符串类型占用的寄存器数量
    #[serde(default)]
    pub length: Option<u16>,
    #[serde(default)]
    pub word_order: WordOrder,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub offset: Option<f64>,
}

/// MQTT 点位地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttAddress {
    pub topic: String,
    /// JSON 载荷中的取值路径（点号分隔，例如 `data.temperature`）
    #[serde(default)]
    pub json_path: Option<String>,
}

/// OPC UA 点位地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpcUaAddress {
    /// 节点 ID，例如 `ns=2;s=Channel1.Device1.Tag1`
    pub node_id: String,
}

/// 按协议区分的点位地址。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum TagAddress {
    ModbusTcp(ModbusAddress),
    Mqtt(MqttAddress),
    OpcUa(OpcUaAddress),
}

impl TagAddress {
    pub fn protocol(&self) -> crate::Protocol {
        match self {
            TagAddress::ModbusTcp(_) => crate::Protocol::ModbusTcp,
            TagAddress::Mqtt(_) => crate::Protocol::Mqtt,
            TagAddress::OpcUa(_) => crate::Protocol::OpcUa,
        }
    }
}

/// 告警阈值（核心层不解释，仅随点位保存）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmThresholds {
    pub low_low: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub high_high: Option<f64>,
}

/// 点位定义。归属于一个连接（按 connection_id 引用）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub connection_id: String,
    pub name: String,
    pub address: TagAddress,
    pub data_type: DataType,
    pub description: Option<String>,
    pub decimals: Option<u8>,
    pub unit: Option<String>,
    pub alarm: Option<AlarmThresholds>,
    pub enabled: bool,
    pub created_at: i64,
}

/// 点位创建参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDraft {
    pub name: String,
    pub address: TagAddress,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub alarm: Option<AlarmThresholds>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// 点位更新参数（None 表示不修改）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUpdate {
    pub name: Option<String>,
    pub address: Option<TagAddress>,
    pub data_type: Option<DataType>,
    pub description: Option<String>,
    pub decimals: Option<u8>,
    pub unit: Option<String>,
    pub alarm: Option<AlarmThresholds>,
    pub enabled: Option<bool>,
}

/// 读取质量标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Good,
    Bad,
    Uncertain,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::Bad => "bad",
            Quality::Uncertain => "uncertain",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 点位值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl TagValue {
    /// 数值型取值（布尔与字符串不参与阈值比较）。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl Default for TagValue {
    fn default() -> Self {
        TagValue::Null
    }
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagValue::Bool(value) => write!(f, "{}", value),
            TagValue::Number(value) => {
                // 整数值不带小数点输出
                if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{}", value)
                }
            }
            TagValue::Text(value) => f.write_str(value),
            TagValue::Null => f.write_str("null"),
        }
    }
}

/// 单个点位的读取结果。读取失败以 bad 质量表示，不中断整批读取。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    pub tag_id: String,
    pub value: TagValue,
    pub quality: Quality,
    pub timestamp: i64,
}

impl ReadResult {
    pub fn good(tag_id: impl Into<String>, value: TagValue, timestamp: i64) -> Self {
        Self {
            tag_id: tag_id.into(),
            value,
            quality: Quality::Good,
            timestamp,
        }
    }

    pub fn bad(tag_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            tag_id: tag_id.into(),
            value: TagValue::Null,
            quality: Quality::Bad,
            timestamp,
        }
    }
}
