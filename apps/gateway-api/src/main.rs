//! 工业协议网关 HTTP 服务：连接、点位、轮询与桥接的管理接口。

mod handlers;
mod middleware;
mod routes;
mod state;
mod utils;

use gw_config::AppConfig;
use gw_protocol::DefaultAdapterFactory;
use gw_telemetry::init_tracing;
use state::AppState;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let http_addr = config.http_addr.clone();
    let state = AppState::new(config, Arc::new(DefaultAdapterFactory));
    let listener_task = state.spawn_listeners();
    let app = routes::create_app(state.clone());

    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!(target: "gw.api", addr = %http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(target: "gw.api", "shutting_down");
    state.shutdown().await;
    listener_task.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "gw.api", error = %err, "ctrl_c_listener_failed");
    }
}
