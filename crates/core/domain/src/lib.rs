//! 网关运行时共享的领域模型。

pub mod bridge;
pub mod connection;
pub mod error;
pub mod polling;
pub mod tag;

pub use bridge::*;
pub use connection::*;
pub use error::ErrorKind;
pub use polling::*;
pub use tag::*;

/// 获取当前时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
