//! 点位 handlers
//!
//! - GET /connections/{id}/tags - 列出点位
//! - POST /connections/{id}/tags - 创建点位
//! - GET /connections/{id}/tags/{tag_id} - 点位详情
//! - PUT /connections/{id}/tags/{tag_id} - 更新点位
//! - DELETE /connections/{id}/tags/{tag_id} - 删除点位
//! - GET /connections/{id}/tags/{tag_id}/history - 数据缓冲中的近期数据

use crate::AppState;
use crate::handlers::connections::ConnectionPath;
use crate::utils::{connection_error, normalize_optional, normalize_required, ok};
use api_contract::HistoryQuery;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use domain::{TagDraft, TagUpdate};

#[derive(serde::Deserialize)]
pub struct TagPath {
    id: String,
    tag_id: String,
}

/// 列出点位
pub async fn list_tags(State(state): State<AppState>, Path(path): Path<ConnectionPath>) -> Response {
    match state.connections.list_tags(&path.id) {
        Ok(items) => ok(items),
        Err(err) => connection_error(err),
    }
}

/// 创建点位
pub async fn create_tag(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
    Json(mut draft): Json<TagDraft>,
) -> Response {
    draft.name = match normalize_required(draft.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.connections.create_tag(&path.id, draft) {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 点位详情
pub async fn get_tag(State(state): State<AppState>, Path(path): Path<TagPath>) -> Response {
    match state.connections.get_tag(&path.id, &path.tag_id) {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 更新点位
pub async fn update_tag(
    State(state): State<AppState>,
    Path(path): Path<TagPath>,
    Json(mut update): Json<TagUpdate>,
) -> Response {
    update.name = match normalize_optional(update.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.connections.update_tag(&path.id, &path.tag_id, update) {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 删除点位
pub async fn delete_tag(State(state): State<AppState>, Path(path): Path<TagPath>) -> Response {
    match state.connections.delete_tag(&path.id, &path.tag_id) {
        Ok(()) => ok(()),
        Err(err) => connection_error(err),
    }
}

/// 近期数据（新的在前）
pub async fn tag_history(
    State(state): State<AppState>,
    Path(path): Path<TagPath>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    if let Err(err) = state.connections.get_tag(&path.id, &path.tag_id) {
        return connection_error(err);
    }
    ok(state.data_buffer.recent(&path.tag_id, query.limit))
}
