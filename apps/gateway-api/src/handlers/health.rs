//! 健康检查
//!
//! - GET /health

use crate::AppState;
use crate::utils::ok;
use api_contract::HealthDto;
use axum::{extract::State, response::Response};

pub async fn health(State(state): State<AppState>) -> Response {
    let connections = state
        .connections
        .list_connections()
        .map(|items| items.len())
        .unwrap_or(0);
    ok(HealthDto {
        status: "ok".to_string(),
        connections,
        polling_sessions: state.polling.active_connections().len(),
        running_bridges: state.bridges.running_bridges().len(),
    })
}
