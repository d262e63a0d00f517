//! 连接管理
//!
//! `ConnectionManager` 是连接配置与点位的唯一数据源，也是适配器实例的唯一持有者。
//! 轮询与桥接只通过它借用适配器，不缓存、不修改适配器状态。
//!
//! 连接状态机：
//!
//! ```text
//! disconnected → connecting → {connected, error}
//! connected    → disconnected | error
//! error        → disconnected | connecting
//! ```
//!
//! 每次状态变化都会通过 [`ConnectionManager::subscribe`] 广播 `ConnectionEvent`。

mod error;
mod manager;
mod tags;

pub use error::ConnectionError;
pub use manager::ConnectionManager;
