//! 桥接 handlers
//!
//! - GET /bridges - 列出桥接
//! - POST /bridges - 创建桥接（省略的选项取配置默认值）
//! - GET /bridges/{id} - 桥接详情
//! - PUT /bridges/{id} - 更新桥接（运行中拒绝）
//! - DELETE /bridges/{id} - 删除桥接
//! - POST /bridges/{id}/start|stop|pause|resume - 生命周期
//! - POST /bridges/{id}/flush - 立即补发缓冲
//! - GET /bridges/{id}/stats - 运行统计

use crate::AppState;
use crate::utils::{bridge_error, normalize_required, ok};
use api_contract::{CreateBridgeRequest, FlushResultDto, UpdateBridgeRequest};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};

#[derive(serde::Deserialize)]
pub struct BridgePath {
    id: String,
}

pub async fn list_bridges(State(state): State<AppState>) -> Response {
    match state.bridges.list_bridges() {
        Ok(items) => ok(items),
        Err(err) => bridge_error(err),
    }
}

pub async fn create_bridge(
    State(state): State<AppState>,
    Json(mut req): Json<CreateBridgeRequest>,
) -> Response {
    req.name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let draft = req.into_draft(
        state.config.bridge_default_interval_ms,
        state.config.bridge_default_buffer_size,
    );
    match state.bridges.create_bridge(draft) {
        Ok(item) => ok(item),
        Err(err) => bridge_error(err),
    }
}

pub async fn get_bridge(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.get_bridge(&path.id) {
        Ok(item) => ok(item),
        Err(err) => bridge_error(err),
    }
}

pub async fn update_bridge(
    State(state): State<AppState>,
    Path(path): Path<BridgePath>,
    Json(req): Json<UpdateBridgeRequest>,
) -> Response {
    let current = match state.bridges.get_bridge(&path.id) {
        Ok(item) => item,
        Err(err) => return bridge_error(err),
    };
    match state
        .bridges
        .update_bridge(&path.id, req.into_update(&current.options))
    {
        Ok(item) => ok(item),
        Err(err) => bridge_error(err),
    }
}

pub async fn delete_bridge(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.delete_bridge(&path.id) {
        Ok(()) => ok(()),
        Err(err) => bridge_error(err),
    }
}

pub async fn start_bridge(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.start(&path.id).await {
        Ok(item) => ok(item),
        Err(err) => bridge_error(err),
    }
}

pub async fn stop_bridge(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.stop(&path.id) {
        Ok(item) => ok(item),
        Err(err) => bridge_error(err),
    }
}

pub async fn pause_bridge(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.pause(&path.id) {
        Ok(item) => ok(item),
        Err(err) => bridge_error(err),
    }
}

pub async fn resume_bridge(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.resume(&path.id).await {
        Ok(item) => ok(item),
        Err(err) => bridge_error(err),
    }
}

pub async fn flush_bridge(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.flush_buffer(&path.id).await {
        Ok(delivered) => ok(FlushResultDto {
            bridge_id: path.id,
            delivered,
        }),
        Err(err) => bridge_error(err),
    }
}

pub async fn bridge_stats(State(state): State<AppState>, Path(path): Path<BridgePath>) -> Response {
    match state.bridges.get_stats(&path.id).await {
        Ok(stats) => ok(stats),
        Err(err) => bridge_error(err),
    }
}
