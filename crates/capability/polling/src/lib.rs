//! 轮询引擎
//!
//! 每个连接至多一个轮询会话。会话启动后立即执行一次读取，
//! 之后按限定在 [100, 60000] 毫秒内的周期重复，直到被停止，
//! 或在连接断开、适配器消失、没有启用点位时自行停止。

mod engine;
mod error;
mod sink;

pub use engine::{
    MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS, PollingEngine, PollingEvent, clamp_interval,
};
pub use error::{PollingError, SinkError};
pub use sink::{DataBufferSink, InMemoryDataBuffer, NoopDataBuffer};
