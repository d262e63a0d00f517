use crate::error::{ConnectionError, lock_failed};
use domain::{
    Connection, ConnectionConfig, ConnectionEvent, ConnectionStatus, DataType, ReadResult, Tag,
    TagAddress, now_epoch_ms,
};
use gw_protocol::{AdapterEvent, AdapterFactory, ProtocolAdapter, ProtocolError};
use gw_telemetry::record_connect_failure;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// 单次读取使用的临时点位 ID。
const READ_ONCE_TAG_ID: &str = "__read_once__";

struct AdapterSlot {
    adapter: Arc<dyn ProtocolAdapter>,
    /// 把适配器事件同步到连接记录的后台任务
    mirror: JoinHandle<()>,
}

pub(crate) struct Inner {
    factory: Arc<dyn AdapterFactory>,
    connections: RwLock<HashMap<String, Connection>>,
    /// 连接 ID → 点位（按创建顺序）
    pub(crate) tags: RwLock<HashMap<String, Vec<Tag>>>,
    adapters: RwLock<HashMap<String, AdapterSlot>>,
    events: broadcast::Sender<ConnectionEvent>,
}

/// 连接管理器（可克隆，克隆共享同一份状态）。
#[derive(Clone)]
pub struct ConnectionManager {
    pub(crate) inner: Arc<Inner>,
}

impl ConnectionManager {
    /// 创建连接管理器。
    pub fn new(factory: Arc<dyn AdapterFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                factory,
                connections: RwLock::new(HashMap::new()),
                tags: RwLock::new(HashMap::new()),
                adapters: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    /// 订阅连接状态变更。
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// 创建连接（纯构造，不做 I/O），初始状态为 disconnected。
    pub fn create_connection(
        &self,
        name: impl Into<String>,
        config: ConnectionConfig,
    ) -> Result<Connection, ConnectionError> {
        let connection = Connection {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            protocol: config.protocol(),
            config,
            status: ConnectionStatus::Disconnected,
            last_error: None,
            created_at: now_epoch_ms(),
        };
        self.inner
            .connections
            .write()
            .map_err(|_| lock_failed())?
            .insert(connection.id.clone(), connection.clone());
        self.inner
            .tags
            .write()
            .map_err(|_| lock_failed())?
            .insert(connection.id.clone(), Vec::new());
        info!(
            target: "gw.connection",
            connection_id = %connection.id,
            protocol = %connection.protocol,
            "connection_created"
        );
        Ok(connection)
    }

    /// 列出所有连接（按创建时间）。
    pub fn list_connections(&self) -> Result<Vec<Connection>, ConnectionError> {
        let mut items: Vec<Connection> = self
            .inner
            .connections
            .read()
            .map_err(|_| lock_failed())?
            .values()
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    pub fn get_connection(&self, id: &str) -> Result<Connection, ConnectionError> {
        self.inner
            .connections
            .read()
            .map_err(|_| lock_failed())?
            .get(id)
            .cloned()
            .ok_or_else(|| ConnectionError::NotFound(id.to_string()))
    }

    /// 更新连接名称或配置。连接活动期间拒绝修改；配置变更会丢弃已缓存的适配器。
    pub async fn update_connection(
        &self,
        id: &str,
        name: Option<String>,
        config: Option<ConnectionConfig>,
    ) -> Result<Connection, ConnectionError> {
        let (updated, config_changed) = {
            let mut connections = self.inner.connections.write().map_err(|_| lock_failed())?;
            let connection = connections
                .get_mut(id)
                .ok_or_else(|| ConnectionError::NotFound(id.to_string()))?;
            if connection.status.is_active() {
                return Err(ConnectionError::InvalidState(format!(
                    "connection {} is {}, disconnect first",
                    id, connection.status
                )));
            }
            if let Some(name) = name {
                connection.name = name;
            }
            let mut config_changed = false;
            if let Some(config) = config {
                config_changed = config != connection.config;
                connection.protocol = config.protocol();
                connection.config = config;
            }
            (connection.clone(), config_changed)
        };

        if config_changed {
            if let Some(slot) = self.take_adapter(id)? {
                slot.mirror.abort();
                slot.adapter.dispose().await;
            }
            debug!(target: "gw.connection", connection_id = %id, "connection_adapter_reset");
        }
        Ok(updated)
    }

    /// 建立连接。
    ///
    /// 已连接或正在连接时直接返回；失败时状态置为 error 并返回错误。
    pub async fn connect(&self, id: &str) -> Result<(), ConnectionError> {
        {
            let mut connections = self.inner.connections.write().map_err(|_| lock_failed())?;
            let connection = connections
                .get_mut(id)
                .ok_or_else(|| ConnectionError::NotFound(id.to_string()))?;
            match connection.status {
                ConnectionStatus::Connected => return Ok(()),
                ConnectionStatus::Connecting => {
                    warn!(target: "gw.connection", connection_id = %id, "connection_already_connecting");
                    return Ok(());
                }
                ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                    connection.status = ConnectionStatus::Connecting;
                    connection.last_error = None;
                }
            }
        }
        self.emit(id, ConnectionStatus::Connecting, None);

        let adapter = match self.ensure_adapter(id) {
            Ok(adapter) => adapter,
            Err(err) => {
                record_connect_failure();
                self.set_status(id, ConnectionStatus::Error, Some(err.to_string()));
                return Err(err);
            }
        };

        match adapter.connect().await {
            Ok(()) => {
                self.set_status(id, ConnectionStatus::Connected, None);
                info!(target: "gw.connection", connection_id = %id, "connection_connected");
                Ok(())
            }
            Err(err) => {
                record_connect_failure();
                warn!(target: "gw.connection", connection_id = %id, error = %err, "connection_connect_failed");
                self.set_status(id, ConnectionStatus::Error, Some(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// 断开连接（尽力而为）：适配器报错只记录日志，最终状态总是 disconnected。
    pub async fn disconnect(&self, id: &str) -> Result<(), ConnectionError> {
        self.get_connection(id)?;
        if let Some(adapter) = self.adapter(id) {
            if let Err(err) = adapter.disconnect().await {
                warn!(target: "gw.connection", connection_id = %id, error = %err, "connection_disconnect_failed");
            }
        }
        self.set_status(id, ConnectionStatus::Disconnected, None);
        info!(target: "gw.connection", connection_id = %id, "connection_disconnected");
        Ok(())
    }

    /// 删除连接及其全部点位。已连接或正在连接时拒绝删除。
    pub async fn delete_connection(&self, id: &str) -> Result<(), ConnectionError> {
        let connection = self.get_connection(id)?;
        if connection.status.is_active() {
            return Err(ConnectionError::InvalidState(format!(
                "connection {} is {}, disconnect first",
                id, connection.status
            )));
        }
        if let Some(slot) = self.take_adapter(id)? {
            slot.mirror.abort();
            slot.adapter.dispose().await;
        }
        self.inner
            .connections
            .write()
            .map_err(|_| lock_failed())?
            .remove(id);
        self.inner.tags.write().map_err(|_| lock_failed())?.remove(id);
        info!(target: "gw.connection", connection_id = %id, "connection_deleted");
        Ok(())
    }

    /// 单点读取：走与轮询相同的批量读取路径，使用一个临时点位。
    pub async fn read_once(
        &self,
        id: &str,
        address: TagAddress,
        data_type: DataType,
    ) -> Result<ReadResult, ConnectionError> {
        self.get_connection(id)?;
        let adapter = self
            .adapter(id)
            .filter(|adapter| adapter.is_connected())
            .ok_or_else(|| ConnectionError::NotConnected(id.to_string()))?;
        let tag = Tag {
            id: READ_ONCE_TAG_ID.to_string(),
            connection_id: id.to_string(),
            name: READ_ONCE_TAG_ID.to_string(),
            address,
            data_type,
            description: None,
            decimals: None,
            unit: None,
            alarm: None,
            enabled: true,
            created_at: now_epoch_ms(),
        };
        let results = adapter.read_tags(std::slice::from_ref(&tag)).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::Read("adapter returned no result".to_string()).into())
    }

    /// 借用连接当前的适配器。
    pub fn adapter(&self, id: &str) -> Option<Arc<dyn ProtocolAdapter>> {
        self.inner
            .adapters
            .read()
            .ok()
            .and_then(|adapters| adapters.get(id).map(|slot| slot.adapter.clone()))
    }

    pub fn status(&self, id: &str) -> Option<ConnectionStatus> {
        self.inner
            .connections
            .read()
            .ok()
            .and_then(|connections| connections.get(id).map(|connection| connection.status))
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.status(id) == Some(ConnectionStatus::Connected)
    }

    /// 断开全部连接（关闭时使用）。
    pub async fn disconnect_all(&self) {
        let ids: Vec<String> = match self.list_connections() {
            Ok(connections) => connections
                .into_iter()
                .filter(|connection| connection.status != ConnectionStatus::Disconnected)
                .map(|connection| connection.id)
                .collect(),
            Err(err) => {
                warn!(target: "gw.connection", error = %err, "connection_list_failed");
                return;
            }
        };
        for id in ids {
            if let Err(err) = self.disconnect(&id).await {
                warn!(target: "gw.connection", connection_id = %id, error = %err, "connection_disconnect_failed");
            }
        }
    }

    /// 释放全部适配器。
    pub async fn dispose(&self) {
        self.disconnect_all().await;
        let slots: Vec<AdapterSlot> = match self.inner.adapters.write() {
            Ok(mut adapters) => adapters.drain().map(|(_, slot)| slot).collect(),
            Err(_) => Vec::new(),
        };
        for slot in slots {
            slot.mirror.abort();
            slot.adapter.dispose().await;
        }
    }

    fn take_adapter(&self, id: &str) -> Result<Option<AdapterSlot>, ConnectionError> {
        Ok(self
            .inner
            .adapters
            .write()
            .map_err(|_| lock_failed())?
            .remove(id))
    }

    /// 首次使用时构造适配器，并订阅其事件以同步连接记录。
    fn ensure_adapter(&self, id: &str) -> Result<Arc<dyn ProtocolAdapter>, ConnectionError> {
        if let Some(adapter) = self.adapter(id) {
            return Ok(adapter);
        }
        let connection = self.get_connection(id)?;
        let adapter = self.inner.factory.create(&connection)?;
        let mirror = spawn_mirror(
            Arc::downgrade(&self.inner),
            Arc::downgrade(&adapter),
            id.to_string(),
            adapter.subscribe(),
        );

        let mut adapters = self.inner.adapters.write().map_err(|_| lock_failed())?;
        if let Some(existing) = adapters.get(id) {
            mirror.abort();
            return Ok(existing.adapter.clone());
        }
        adapters.insert(
            id.to_string(),
            AdapterSlot {
                adapter: adapter.clone(),
                mirror,
            },
        );
        debug!(target: "gw.connection", connection_id = %id, protocol = %connection.protocol, "adapter_created");
        Ok(adapter)
    }

    fn set_status(&self, id: &str, status: ConnectionStatus, error: Option<String>) {
        self.inner.apply_status(id, status, error, false);
    }

    fn emit(&self, id: &str, status: ConnectionStatus, error: Option<String>) {
        self.inner.emit(id, status, error);
    }
}

impl Inner {
    /// 更新连接状态，变化时广播。
    ///
    /// `checked` 为 true 时（来自适配器事件）忽略非法迁移。
    fn apply_status(
        &self,
        id: &str,
        status: ConnectionStatus,
        error: Option<String>,
        checked: bool,
    ) {
        let changed = {
            let Ok(mut connections) = self.connections.write() else {
                warn!(target: "gw.connection", connection_id = %id, "connection store lock failed");
                return;
            };
            let Some(connection) = connections.get_mut(id) else {
                return;
            };
            if checked && !connection.status.can_transition_to(status) {
                debug!(
                    target: "gw.connection",
                    connection_id = %id,
                    from = %connection.status,
                    to = %status,
                    "adapter_transition_ignored"
                );
                return;
            }
            match status {
                ConnectionStatus::Error => {
                    if error.is_some() {
                        connection.last_error = error.clone();
                    }
                }
                ConnectionStatus::Connected => connection.last_error = None,
                _ => {}
            }
            let changed = connection.status != status;
            connection.status = status;
            changed
        };
        if changed {
            self.emit(id, status, error);
        }
    }

    /// 同步适配器上报的状态。
    ///
    /// 适配器自行重连时 connecting 与 connected 几乎同时发生，connecting 会被当作过期事件跳过；
    /// 记录仍为 error 时先补上 connecting，使 error → connecting → connected 依次生效。
    fn apply_adapter_status(&self, id: &str, status: ConnectionStatus, error: Option<String>) {
        if status == ConnectionStatus::Connected
            && self.current_status(id) == Some(ConnectionStatus::Error)
        {
            self.apply_status(id, ConnectionStatus::Connecting, None, true);
        }
        self.apply_status(id, status, error, true);
    }

    fn current_status(&self, id: &str) -> Option<ConnectionStatus> {
        self.connections
            .read()
            .ok()
            .and_then(|connections| connections.get(id).map(|connection| connection.status))
    }

    fn record_error(&self, id: &str, message: String) {
        if let Ok(mut connections) = self.connections.write() {
            if let Some(connection) = connections.get_mut(id) {
                connection.last_error = Some(message);
            }
        }
    }

    fn emit(&self, id: &str, status: ConnectionStatus, error: Option<String>) {
        debug!(target: "gw.connection", connection_id = %id, status = %status, "connection_status_changed");
        let _ = self.events.send(ConnectionEvent {
            connection_id: id.to_string(),
            status,
            error,
        });
    }
}

fn spawn_mirror(
    inner: Weak<Inner>,
    adapter: Weak<dyn ProtocolAdapter>,
    id: String,
    mut rx: broadcast::Receiver<AdapterEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "gw.connection", connection_id = %id, skipped, "adapter_events_lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let (Some(inner), Some(adapter)) = (inner.upgrade(), adapter.upgrade()) else {
                break;
            };
            match event {
                AdapterEvent::StatusChanged { status, error } => {
                    // 只同步适配器当前仍处于的状态，积压的旧事件直接跳过
                    if adapter.status() != status {
                        debug!(target: "gw.connection", connection_id = %id, status = %status, "adapter_event_stale");
                        continue;
                    }
                    inner.apply_adapter_status(&id, status, error);
                }
                AdapterEvent::Error(message) => {
                    warn!(target: "gw.connection", connection_id = %id, error = %message, "adapter_error");
                    inner.record_error(&id, message);
                }
            }
        }
    })
}
