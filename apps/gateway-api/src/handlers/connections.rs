//! 连接 handlers
//!
//! - GET /connections - 列出连接
//! - POST /connections - 创建连接
//! - GET /connections/{id} - 连接详情
//! - PUT /connections/{id} - 更新连接（仅断开状态）
//! - DELETE /connections/{id} - 删除连接（仅断开状态）
//! - POST /connections/{id}/connect - 建立连接
//! - POST /connections/{id}/disconnect - 断开连接
//! - POST /connections/{id}/read - 按地址单次读取

use crate::AppState;
use crate::utils::{connection_error, normalize_optional, normalize_required, ok};
use api_contract::{CreateConnectionRequest, ReadOnceRequest, UpdateConnectionRequest};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};

#[derive(serde::Deserialize)]
pub struct ConnectionPath {
    pub(crate) id: String,
}

/// 列出连接
pub async fn list_connections(State(state): State<AppState>) -> Response {
    match state.connections.list_connections() {
        Ok(items) => ok(items),
        Err(err) => connection_error(err),
    }
}

/// 创建连接
pub async fn create_connection(
    State(state): State<AppState>,
    Json(req): Json<CreateConnectionRequest>,
) -> Response {
    let name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state.connections.create_connection(&name, req.config) {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 连接详情
pub async fn get_connection(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
) -> Response {
    match state.connections.get_connection(&path.id) {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 更新连接
pub async fn update_connection(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
    Json(req): Json<UpdateConnectionRequest>,
) -> Response {
    let name = match normalize_optional(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    match state
        .connections
        .update_connection(&path.id, name, req.config)
        .await
    {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 删除连接
pub async fn delete_connection(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
) -> Response {
    match state.connections.delete_connection(&path.id).await {
        Ok(()) => ok(()),
        Err(err) => connection_error(err),
    }
}

/// 建立连接
pub async fn connect_connection(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
) -> Response {
    if let Err(err) = state.connections.connect(&path.id).await {
        return connection_error(err);
    }
    match state.connections.get_connection(&path.id) {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 断开连接（同时停止该连接的轮询）
pub async fn disconnect_connection(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
) -> Response {
    if let Err(err) = state.connections.disconnect(&path.id).await {
        return connection_error(err);
    }
    state.polling.stop_polling(&path.id);
    match state.connections.get_connection(&path.id) {
        Ok(item) => ok(item),
        Err(err) => connection_error(err),
    }
}

/// 按地址单次读取
pub async fn read_once(
    State(state): State<AppState>,
    Path(path): Path<ConnectionPath>,
    Json(req): Json<ReadOnceRequest>,
) -> Response {
    match state
        .connections
        .read_once(&path.id, req.address, req.data_type)
        .await
    {
        Ok(result) => ok(result),
        Err(err) => connection_error(err),
    }
}
