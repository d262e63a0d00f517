use domain::ErrorKind;
use gw_connection::ConnectionError;

/// 轮询错误。
#[derive(Debug, thiserror::Error)]
pub enum PollingError {
    #[error("connection not found: {0}")]
    NotFound(String),
    #[error("connection {0} is not connected")]
    NotConnected(String),
    #[error("No enabled tags to poll")]
    NoEnabledTags,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl PollingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollingError::NotFound(_) => ErrorKind::NotFound,
            PollingError::NotConnected(_) | PollingError::NoEnabledTags => ErrorKind::InvalidState,
            PollingError::Connection(err) => err.kind(),
            PollingError::Storage(_) => ErrorKind::Internal,
        }
    }
}

/// 数据缓冲写入错误。
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink write error: {0}")]
    Write(String),
}
