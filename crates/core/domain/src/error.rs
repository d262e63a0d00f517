//! 错误分类
//!
//! 各能力模块有各自的错误枚举，统一通过 `ErrorKind` 映射为对外的错误码。

use serde::Serialize;

/// 对外可见的错误类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 未知的连接/点位/桥接 ID
    NotFound,
    /// 非法状态（连接中删除、运行中修改、无可用点位等）
    InvalidState,
    /// 网络/协议层连接失败
    AdapterConnect,
    /// 读取失败
    ReadFailure,
    /// 模板解析或 JSON 校验失败
    TemplateResolution,
    /// 目标不可达
    TargetUnavailable,
    /// 内部错误（锁失效等）
    Internal,
}

impl ErrorKind {
    /// 稳定的错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "RESOURCE.NOT_FOUND",
            ErrorKind::InvalidState => "STATE.INVALID",
            ErrorKind::AdapterConnect => "ADAPTER.CONNECT",
            ErrorKind::ReadFailure => "READ.FAILURE",
            ErrorKind::TemplateResolution => "TEMPLATE.RESOLUTION",
            ErrorKind::TargetUnavailable => "TARGET.UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL.ERROR",
        }
    }
}
