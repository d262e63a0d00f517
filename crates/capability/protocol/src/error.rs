//! 协议错误类型定义

use domain::ErrorKind;

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误（拒绝、握手失败等）
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Modbus 错误
    #[error("modbus error: {0}")]
    Modbus(String),

    /// 批量读取失败
    #[error("read error: {0}")]
    Read(String),

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// 数据解析错误
    #[error("data parse error: {0}")]
    DataParse(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 适配器未连接
    #[error("not connected")]
    NotConnected,

    /// 发布失败
    #[error("publish error: {0}")]
    Publish(String),

    /// 不支持的操作或协议
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Connection(_)
            | ProtocolError::Io(_)
            | ProtocolError::Timeout(_)
            | ProtocolError::ConfigParse(_)
            | ProtocolError::Unsupported(_) => ErrorKind::AdapterConnect,
            ProtocolError::Modbus(_)
            | ProtocolError::Read(_)
            | ProtocolError::DataParse(_) => ErrorKind::ReadFailure,
            ProtocolError::NotConnected | ProtocolError::Publish(_) => {
                ErrorKind::TargetUnavailable
            }
        }
    }
}
