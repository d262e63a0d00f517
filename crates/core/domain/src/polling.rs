//! 轮询相关的数据载荷

use crate::tag::{Quality, ReadResult, TagValue};
use serde::{Deserialize, Serialize};

/// 轮询会话状态（无会话时为全零的 "未轮询" 状态）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingStatus {
    pub is_polling: bool,
    pub interval_ms: u64,
    pub last_poll_timestamp: i64,
    pub tag_count: usize,
}

/// 会话启动/停止时的状态通知。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingStatusEvent {
    pub connection_id: String,
    pub is_polling: bool,
    pub interval_ms: u64,
    pub last_poll_timestamp: i64,
    pub tag_count: usize,
}

impl PollingStatusEvent {
    pub fn new(connection_id: impl Into<String>, status: PollingStatus) -> Self {
        Self {
            connection_id: connection_id.into(),
            is_polling: status.is_polling,
            interval_ms: status.interval_ms,
            last_poll_timestamp: status.last_poll_timestamp,
            tag_count: status.tag_count,
        }
    }
}

/// 每次轮询推送的数据。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingData {
    pub connection_id: String,
    pub timestamp: i64,
    pub values: Vec<ReadResult>,
}

/// 写入历史数据缓冲的数据点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub tag_id: String,
    pub timestamp: i64,
    pub value: TagValue,
    pub quality: Quality,
}

impl From<&ReadResult> for DataPoint {
    fn from(result: &ReadResult) -> Self {
        Self {
            tag_id: result.tag_id.clone(),
            timestamp: result.timestamp,
            value: result.value.clone(),
            quality: result.quality,
        }
    }
}
