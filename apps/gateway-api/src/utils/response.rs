//! HTTP 响应辅助函数
//!
//! 服务错误按 `ErrorKind` 映射为状态码与稳定错误码，错误对象本身不直接出现在响应中。

use api_contract::ApiResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::ErrorKind;
use gw_bridge::BridgeError;
use gw_connection::ConnectionError;
use gw_polling::PollingError;
use serde::Serialize;

/// 成功响应
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 按错误类别构造响应
pub fn kind_error(kind: ErrorKind, message: impl Into<String>) -> Response {
    (
        status_for(kind),
        Json(ApiResponse::<()>::error(kind.code(), message.into())),
    )
        .into_response()
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::AdapterConnect | ErrorKind::ReadFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::TemplateResolution => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TargetUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 连接错误响应
pub fn connection_error(err: ConnectionError) -> Response {
    kind_error(err.kind(), err.to_string())
}

/// 轮询错误响应
pub fn polling_error(err: PollingError) -> Response {
    kind_error(err.kind(), err.to_string())
}

/// 桥接错误响应
pub fn bridge_error(err: BridgeError) -> Response {
    kind_error(err.kind(), err.to_string())
}
