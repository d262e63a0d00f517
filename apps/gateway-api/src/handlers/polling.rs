//! 轮询 handlers
//!
//! - GET /polling - 正在轮询的连接
//! - GET /connections/{id}/polling - 轮询状态（未轮询时为零值）
//! - POST /connections/{id}/polling - 启动（或替换）轮询
//! - DELETE /connections/{id}/polling - 停止轮询

use crate::AppState;
use crate::handlers::connections::ConnectionPath;
use crate::utils::{ok, polling_error};
use api_contract::{StartPollingRequest, StopPollingDto};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};

pub async fn list_polling(State(state): State<AppState>) -> Response {
    ok(state.polling.active_connections())
}

pub async fn get_polling_status(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
) -> Response {
    ok(state.polling.get_polling_status(&path.id))
}

pub async fn start_polling(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
    Json(req): Json<StartPollingRequest>,
) -> Response {
    match state
        .polling
        .start_polling(&path.id, req.tag_ids, req.interval_ms)
    {
        Ok(status) => ok(status),
        Err(err) => polling_error(err),
    }
}

pub async fn stop_polling(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
) -> Response {
    let stopped = state.polling.stop_polling(&path.id);
    ok(StopPollingDto {
        connection_id: path.id,
        stopped,
    })
}
