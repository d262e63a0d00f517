use domain::ErrorKind;
use gw_protocol::ProtocolError;

/// 连接管理错误。
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection not found: {0}")]
    NotFound(String),
    #[error("tag not found: {0}")]
    TagNotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid tag: {0}")]
    InvalidTag(String),
    #[error("Not connected: {0}")]
    NotConnected(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ConnectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectionError::NotFound(_) | ConnectionError::TagNotFound(_) => ErrorKind::NotFound,
            ConnectionError::InvalidState(_)
            | ConnectionError::InvalidTag(_)
            | ConnectionError::NotConnected(_) => ErrorKind::InvalidState,
            ConnectionError::Protocol(err) => err.kind(),
            ConnectionError::Storage(_) => ErrorKind::Internal,
        }
    }
}

pub(crate) fn lock_failed() -> ConnectionError {
    ConnectionError::Storage("lock failed".to_string())
}
