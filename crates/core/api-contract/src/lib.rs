//! 稳定的 DTO 与 API 响应契约。

use domain::{
    BridgeDraft, BridgeOptions, BridgeTarget, BridgeUpdate, ConnectionConfig, DataType,
    TagAddress,
};
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub connections: usize,
    pub polling_sessions: usize,
    pub running_bridges: usize,
}

/// 连接创建请求体（协议由 config 的 protocol 字段决定）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    pub name: String,
    #[serde(flatten)]
    pub config: ConnectionConfig,
}

/// 连接更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConnectionRequest {
    pub name: Option<String>,
    #[serde(flatten)]
    pub config: Option<ConnectionConfig>,
}

/// 单次读取请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOnceRequest {
    pub address: TagAddress,
    #[serde(default)]
    pub data_type: DataType,
}

/// 启动轮询请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPollingRequest {
    /// 轮询周期（毫秒），超出范围时被限定
    #[serde(default = "default_polling_interval")]
    pub interval_ms: u64,
    /// 为空时轮询全部启用点位
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

fn default_polling_interval() -> u64 {
    1000
}

/// 桥接选项（省略的字段取服务端默认值）。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOptionsInput {
    pub interval_ms: Option<u64>,
    pub change_only: Option<bool>,
    pub change_threshold: Option<f64>,
    pub buffer_size: Option<usize>,
}

impl BridgeOptionsInput {
    pub fn resolve(self, default_interval_ms: u64, default_buffer_size: usize) -> BridgeOptions {
        BridgeOptions {
            interval_ms: self.interval_ms.unwrap_or(default_interval_ms),
            change_only: self.change_only.unwrap_or(false),
            change_threshold: self.change_threshold,
            buffer_size: self.buffer_size.unwrap_or(default_buffer_size),
        }
    }
}

/// 桥接创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBridgeRequest {
    pub name: String,
    pub source_connection_id: String,
    pub source_tag_ids: Vec<String>,
    pub target_connection_id: String,
    pub target: BridgeTarget,
    #[serde(default)]
    pub options: Option<BridgeOptionsInput>,
}

impl CreateBridgeRequest {
    pub fn into_draft(self, default_interval_ms: u64, default_buffer_size: usize) -> BridgeDraft {
        BridgeDraft {
            name: self.name,
            source_connection_id: self.source_connection_id,
            source_tag_ids: self.source_tag_ids,
            target_connection_id: self.target_connection_id,
            target: self.target,
            options: self
                .options
                .unwrap_or_default()
                .resolve(default_interval_ms, default_buffer_size),
        }
    }
}

/// 桥接更新请求体（只修改给出的字段）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBridgeRequest {
    pub name: Option<String>,
    pub source_connection_id: Option<String>,
    pub source_tag_ids: Option<Vec<String>>,
    pub target_connection_id: Option<String>,
    pub target: Option<BridgeTarget>,
    pub options: Option<BridgeOptionsInput>,
}

impl UpdateBridgeRequest {
    /// 选项中省略的字段沿用当前值。
    pub fn into_update(self, current: &BridgeOptions) -> BridgeUpdate {
        BridgeUpdate {
            name: self.name,
            source_connection_id: self.source_connection_id,
            source_tag_ids: self.source_tag_ids,
            target_connection_id: self.target_connection_id,
            target: self.target,
            options: self.options.map(|input| BridgeOptions {
                interval_ms: input.interval_ms.unwrap_or(current.interval_ms),
                change_only: input.change_only.unwrap_or(current.change_only),
                change_threshold: input.change_threshold.or(current.change_threshold),
                buffer_size: input.buffer_size.unwrap_or(current.buffer_size),
            }),
        }
    }
}

/// 补发结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResultDto {
    pub bridge_id: String,
    pub delivered: usize,
}

/// 停止轮询结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPollingDto {
    pub connection_id: String,
    pub stopped: bool,
}

/// 运行指标快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub connect_failures: u64,
    pub polls: u64,
    pub poll_failures: u64,
    pub points_persisted: u64,
    pub persist_failures: u64,
    pub messages_forwarded: u64,
    pub bytes_forwarded: u64,
    pub messages_buffered: u64,
    pub messages_dropped: u64,
    pub publish_failures: u64,
    pub template_failures: u64,
}

/// 历史数据查询参数。
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    100
}
