//! 历史数据缓冲接口
//!
//! 轮询结果逐批写入；写入失败只记录日志，不影响轮询。

use crate::error::SinkError;
use async_trait::async_trait;
use domain::DataPoint;
use std::collections::VecDeque;
use std::sync::RwLock;

/// 数据缓冲写入接口。
#[async_trait]
pub trait DataBufferSink: Send + Sync {
    async fn insert_batch(&self, points: &[DataPoint]) -> Result<(), SinkError>;
}

/// 空实现（用于接线与测试）。
#[derive(Debug, Default)]
pub struct NoopDataBuffer;

#[async_trait]
impl DataBufferSink for NoopDataBuffer {
    async fn insert_batch(&self, _points: &[DataPoint]) -> Result<(), SinkError> {
        Ok(())
    }
}

/// 有界内存缓冲，超出容量时丢弃最旧的数据点。
pub struct InMemoryDataBuffer {
    capacity: usize,
    points: RwLock<VecDeque<DataPoint>>,
}

impl InMemoryDataBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.read().map(|points| points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 某点位最近的若干数据点（新的在前）。
    pub fn recent(&self, tag_id: &str, limit: usize) -> Vec<DataPoint> {
        self.points
            .read()
            .map(|points| {
                points
                    .iter()
                    .rev()
                    .filter(|point| point.tag_id == tag_id)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn latest(&self, tag_id: &str) -> Option<DataPoint> {
        self.recent(tag_id, 1).into_iter().next()
    }
}

#[async_trait]
impl DataBufferSink for InMemoryDataBuffer {
    async fn insert_batch(&self, batch: &[DataPoint]) -> Result<(), SinkError> {
        let mut points = self
            .points
            .write()
            .map_err(|_| SinkError::Write("lock failed".to_string()))?;
        for point in batch {
            if points.len() >= self.capacity {
                points.pop_front();
            }
            points.push_back(point.clone());
        }
        Ok(())
    }
}
