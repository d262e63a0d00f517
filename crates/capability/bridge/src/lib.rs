//! 桥接转发引擎
//!
//! 周期性读取源连接的点位，经模板生成 topic 与载荷后发布到目标连接。
//!
//! - 目标不可达时消息进入有界 FIFO 缓冲，溢出时丢弃最旧的消息
//! - 目标恢复后自动补发缓冲
//! - 源连接断开时自动暂停，恢复连接后自动继续
//!
//! 单次 I/O 失败不会让桥接停止，只有显式的 stop / delete 才会结束运行。

mod error;
mod manager;
mod runtime;

pub use error::BridgeError;
pub use manager::{BridgeEvent, BridgeManager};
