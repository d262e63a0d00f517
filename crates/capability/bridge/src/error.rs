use domain::ErrorKind;
use gw_connection::ConnectionError;
use gw_template::TemplateError;

/// 桥接错误。
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge not found: {0}")]
    NotFound(String),
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid bridge: {0}")]
    Invalid(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("target unavailable: {0}")]
    TargetUnavailable(String),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::NotFound(_) | BridgeError::ConnectionNotFound(_) => ErrorKind::NotFound,
            BridgeError::InvalidState(_) | BridgeError::Invalid(_) => ErrorKind::InvalidState,
            BridgeError::Template(err) => err.kind(),
            BridgeError::TargetUnavailable(_) => ErrorKind::TargetUnavailable,
            BridgeError::Connection(err) => err.kind(),
            BridgeError::Storage(_) => ErrorKind::Internal,
        }
    }
}

pub(crate) fn lock_failed() -> BridgeError {
    BridgeError::Storage("lock failed".to_string())
}
