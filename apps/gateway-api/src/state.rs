//! 服务装配
//!
//! 按依赖顺序构造：AdapterFactory → ConnectionManager → {PollingEngine, BridgeManager}。

use gw_bridge::BridgeManager;
use gw_config::AppConfig;
use gw_connection::ConnectionManager;
use gw_polling::{InMemoryDataBuffer, PollingEngine};
use gw_protocol::AdapterFactory;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub connections: ConnectionManager,
    pub polling: PollingEngine,
    pub bridges: BridgeManager,
    pub data_buffer: Arc<InMemoryDataBuffer>,
}

impl AppState {
    pub fn new(config: AppConfig, factory: Arc<dyn AdapterFactory>) -> Self {
        let connections = ConnectionManager::new(factory);
        let data_buffer = Arc::new(InMemoryDataBuffer::new(config.data_buffer_capacity));
        let polling = PollingEngine::new(connections.clone(), data_buffer.clone());
        let bridges = BridgeManager::with_auto_resume(connections.clone(), config.auto_resume_bridges);
        Self {
            config: Arc::new(config),
            connections,
            polling,
            bridges,
            data_buffer,
        }
    }

    /// 连接状态事件接入桥接（目标可达性、自动暂停/恢复）。
    pub fn spawn_listeners(&self) -> JoinHandle<()> {
        self.bridges
            .spawn_status_listener(self.connections.subscribe())
    }

    /// 退出清理：先停桥接与轮询，再断开连接并释放适配器。
    pub async fn shutdown(&self) {
        self.bridges.dispose();
        self.polling.dispose();
        if self.config.shutdown_disconnect {
            self.connections.dispose().await;
        }
    }
}
