//! 桥接（Bridge）模型：把一个连接的点位值周期性转发到另一个连接的发布面。

use serde::{Deserialize, Serialize};

/// 桥接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    #[default]
    Idle,
    Active,
    Paused,
}

impl BridgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeStatus::Idle => "idle",
            BridgeStatus::Active => "active",
            BridgeStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 目标发布配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeTarget {
    /// topic 模板，例如 `plant/${connectionId}/${tagName}`
    pub topic_template: String,
    /// 载荷模板，例如 `{"value": ${value}, "ts": ${timestamp}}`
    pub payload_template: String,
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub retain: bool,
}

/// 转发选项。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOptions {
    /// 转发周期（毫秒）
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// 仅在值变化时转发
    #[serde(default)]
    pub change_only: bool,
    /// 数值变化阈值（未设置时任何不等都算变化）
    #[serde(default)]
    pub change_threshold: Option<f64>,
    /// 目标不可达时的缓冲容量
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// 桥接转发周期下限（毫秒）。
pub const MIN_BRIDGE_INTERVAL_MS: u64 = 100;

fn default_interval() -> u64 {
    1000
}

fn default_buffer_size() -> usize {
    1000
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
            change_only: false,
            change_threshold: None,
            buffer_size: default_buffer_size(),
        }
    }
}

impl BridgeOptions {
    /// 规整非法取值：周期不低于下限，负阈值按绝对值处理。
    pub fn sanitized(mut self) -> Self {
        if self.interval_ms < MIN_BRIDGE_INTERVAL_MS {
            self.interval_ms = MIN_BRIDGE_INTERVAL_MS;
        }
        self.change_threshold = self
            .change_threshold
            .filter(|value| value.is_finite())
            .map(f64::abs);
        self
    }
}

/// 桥接定义。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bridge {
    pub id: String,
    pub name: String,
    pub source_connection_id: String,
    pub source_tag_ids: Vec<String>,
    pub target_connection_id: String,
    pub target: BridgeTarget,
    pub options: BridgeOptions,
    pub status: BridgeStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// 桥接创建参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeDraft {
    pub name: String,
    pub source_connection_id: String,
    pub source_tag_ids: Vec<String>,
    pub target_connection_id: String,
    pub target: BridgeTarget,
    #[serde(default)]
    pub options: BridgeOptions,
}

/// 桥接更新参数（None 表示不修改）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeUpdate {
    pub name: Option<String>,
    pub source_connection_id: Option<String>,
    pub source_tag_ids: Option<Vec<String>>,
    pub target_connection_id: Option<String>,
    pub target: Option<BridgeTarget>,
    pub options: Option<BridgeOptions>,
}

/// 待发送消息（目标不可达时进入缓冲）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedMessage {
    pub timestamp: i64,
    pub topic: String,
    pub payload: String,
    pub source_tag_id: String,
}

/// 桥接运行统计快照。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStats {
    pub bridge_id: String,
    pub status: BridgeStatus,
    pub messages_forwarded: u64,
    pub messages_dropped: u64,
    pub bytes_transferred: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub last_forward_at: Option<i64>,
    pub uptime_ms: u64,
    /// 当前缓冲中的消息数
    pub buffered_messages: usize,
    pub target_reachable: bool,
}

impl BridgeStats {
    /// 未运行桥接的零值统计。
    pub fn idle(bridge_id: impl Into<String>, status: BridgeStatus) -> Self {
        Self {
            bridge_id: bridge_id.into(),
            status,
            ..Self::default()
        }
    }
}
