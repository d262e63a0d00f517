//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 连接管理：/connections/*
//! - 点位管理：/connections/{id}/tags/*
//! - 轮询控制：/polling, /connections/{id}/polling
//! - 桥接管理：/bridges/*
//! - 运行指标：/metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由（挂载在 /api 下）
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/connections", get(list_connections).post(create_connection))
        .route(
            "/connections/:id",
            get(get_connection)
                .put(update_connection)
                .delete(delete_connection),
        )
        .route("/connections/:id/connect", post(connect_connection))
        .route("/connections/:id/disconnect", post(disconnect_connection))
        .route("/connections/:id/read", post(read_once))
        .route("/connections/:id/tags", get(list_tags).post(create_tag))
        .route(
            "/connections/:id/tags/:tag_id",
            get(get_tag).put(update_tag).delete(delete_tag),
        )
        .route("/connections/:id/tags/:tag_id/history", get(tag_history))
        .route(
            "/connections/:id/polling",
            get(get_polling_status)
                .post(start_polling)
                .delete(stop_polling),
        )
        .route("/polling", get(list_polling))
        .route("/bridges", get(list_bridges).post(create_bridge))
        .route(
            "/bridges/:id",
            get(get_bridge).put(update_bridge).delete(delete_bridge),
        )
        .route("/bridges/:id/start", post(start_bridge))
        .route("/bridges/:id/stop", post(stop_bridge))
        .route("/bridges/:id/pause", post(pause_bridge))
        .route("/bridges/:id/resume", post(resume_bridge))
        .route("/bridges/:id/flush", post(flush_bridge))
        .route("/bridges/:id/stats", get(bridge_stats))
        .route("/metrics", get(get_metrics))
}

/// 完整应用：/health + /api 前缀的业务路由 + 请求上下文与 HTTP trace。
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", create_api_router())
        .with_state(state)
        .layer(axum::middleware::from_fn(super::middleware::request_context))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
