use crate::error::{BridgeError, lock_failed};
use crate::runtime::{BridgeRuntime, RuntimeState, is_changed};
use domain::{
    Bridge, BridgeDraft, BridgeStats, BridgeStatus, BridgeUpdate, BufferedMessage,
    ConnectionEvent, ConnectionStatus, ReadResult, Tag, now_epoch_ms,
};
use gw_connection::ConnectionManager;
use gw_protocol::ProtocolAdapter;
use gw_scheduler::{CancelToken, PeriodicTask};
use gw_telemetry::{
    record_message_buffered, record_message_dropped, record_message_forwarded,
    record_publish_failure, record_template_failure,
};
use gw_template::{TagSnapshot, TemplateContext, TemplateError, resolve_payload, resolve_topic};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 1024;

/// 桥接事件。
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    StatusChanged {
        bridge_id: String,
        status: BridgeStatus,
    },
    Error {
        bridge_id: String,
        message: String,
    },
    /// 每次转发/补发之后的统计快照
    Stats(BridgeStats),
}

struct Inner {
    connections: ConnectionManager,
    auto_resume: bool,
    bridges: RwLock<HashMap<String, Bridge>>,
    runtimes: Mutex<HashMap<String, Arc<BridgeRuntime>>>,
    events: broadcast::Sender<BridgeEvent>,
}

/// 桥接管理（可克隆，克隆共享同一份状态）。
#[derive(Clone)]
pub struct BridgeManager {
    inner: Arc<Inner>,
}

impl BridgeManager {
    pub fn new(connections: ConnectionManager) -> Self {
        Self::with_auto_resume(connections, true)
    }

    /// `auto_resume` 为 false 时源连接断开不自动暂停，恢复后也不自动继续；目标可达性照常跟踪。
    pub fn with_auto_resume(connections: ConnectionManager, auto_resume: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                connections,
                auto_resume,
                bridges: RwLock::new(HashMap::new()),
                runtimes: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }

    pub fn create_bridge(&self, draft: BridgeDraft) -> Result<Bridge, BridgeError> {
        let now = now_epoch_ms();
        let bridge = Bridge {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            source_connection_id: draft.source_connection_id,
            source_tag_ids: draft.source_tag_ids,
            target_connection_id: draft.target_connection_id,
            target: draft.target,
            options: draft.options.sanitized(),
            status: BridgeStatus::Idle,
            created_at: now,
            updated_at: now,
        };
        self.inner.validate(&bridge)?;
        self.inner
            .bridges
            .write()
            .map_err(|_| lock_failed())?
            .insert(bridge.id.clone(), bridge.clone());
        info!(
            target: "gw.bridge",
            bridge_id = %bridge.id,
            source = %bridge.source_connection_id,
            target_connection = %bridge.target_connection_id,
            "bridge_created"
        );
        Ok(bridge)
    }

    pub fn list_bridges(&self) -> Result<Vec<Bridge>, BridgeError> {
        let bridges = self.inner.bridges.read().map_err(|_| lock_failed())?;
        let mut items: Vec<Bridge> = bridges.values().cloned().collect();
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(items)
    }

    pub fn get_bridge(&self, id: &str) -> Result<Bridge, BridgeError> {
        self.inner.get(id)
    }

    /// 修改桥接定义。运行中的桥接必须先停止；暂停中的桥接在恢复后使用新定义。
    pub fn update_bridge(&self, id: &str, update: BridgeUpdate) -> Result<Bridge, BridgeError> {
        let mut bridges = self.inner.bridges.write().map_err(|_| lock_failed())?;
        let existing = bridges
            .get_mut(id)
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
        if existing.status == BridgeStatus::Active {
            return Err(BridgeError::InvalidState(format!(
                "bridge {} is active; stop it before updating",
                id
            )));
        }

        let mut next = existing.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        if let Some(source) = update.source_connection_id {
            next.source_connection_id = source;
        }
        if let Some(tag_ids) = update.source_tag_ids {
            next.source_tag_ids = tag_ids;
        }
        if let Some(target) = update.target_connection_id {
            next.target_connection_id = target;
        }
        if let Some(target) = update.target {
            next.target = target;
        }
        if let Some(options) = update.options {
            next.options = options.sanitized();
        }
        self.inner.validate(&next)?;
        next.updated_at = now_epoch_ms();
        *existing = next.clone();
        info!(target: "gw.bridge", bridge_id = %id, "bridge_updated");
        Ok(next)
    }

    /// 删除桥接（运行中的会先停止，缓冲一并丢弃）。
    pub fn delete_bridge(&self, id: &str) -> Result<(), BridgeError> {
        self.inner.get(id)?;
        if let Some(runtime) = self.inner.remove_runtime(id) {
            runtime.cancel_task();
        }
        self.inner
            .bridges
            .write()
            .map_err(|_| lock_failed())?
            .remove(id);
        info!(target: "gw.bridge", bridge_id = %id, "bridge_deleted");
        Ok(())
    }

    /// 启动转发。已运行时不做任何事，暂停中的桥接直接恢复。
    pub async fn start(&self, id: &str) -> Result<Bridge, BridgeError> {
        let bridge = self.inner.get(id)?;
        match bridge.status {
            BridgeStatus::Active => return Ok(bridge),
            BridgeStatus::Paused => return self.inner.resume(id).await,
            BridgeStatus::Idle => {}
        }

        let reachable = self
            .inner
            .connections
            .is_connected(&bridge.target_connection_id);
        let runtime = Arc::new(BridgeRuntime::new(id, reachable));
        {
            let mut runtimes = self.inner.lock_runtimes();
            if runtimes.contains_key(id) {
                return self.inner.get(id);
            }
            runtime.install_task(self.inner.spawn_forwarder(&runtime, bridge.options.interval_ms));
            runtimes.insert(id.to_string(), runtime);
        }
        let bridge = self.inner.set_status(id, BridgeStatus::Active)?;
        info!(
            target: "gw.bridge",
            bridge_id = %id,
            interval_ms = bridge.options.interval_ms,
            target_reachable = reachable,
            "bridge_started"
        );
        Ok(bridge)
    }

    /// 停止转发并销毁运行期状态（未补发的缓冲丢弃）。
    pub fn stop(&self, id: &str) -> Result<Bridge, BridgeError> {
        let bridge = self.inner.get(id)?;
        let runtime = self.inner.remove_runtime(id);
        if let Some(runtime) = &runtime {
            runtime.cancel_task();
        }
        if bridge.status == BridgeStatus::Idle && runtime.is_none() {
            return Ok(bridge);
        }
        let bridge = self.inner.set_status(id, BridgeStatus::Idle)?;
        info!(target: "gw.bridge", bridge_id = %id, "bridge_stopped");
        Ok(bridge)
    }

    /// 暂停转发，保留统计与缓冲。
    pub fn pause(&self, id: &str) -> Result<Bridge, BridgeError> {
        self.inner.pause(id, false)
    }

    /// 恢复转发；目标可达且缓冲非空时先补发。
    pub async fn resume(&self, id: &str) -> Result<Bridge, BridgeError> {
        self.inner.resume(id).await
    }

    /// 单次转发（通常由定时器驱动）。
    pub async fn forward_data(&self, id: &str) -> Result<(), BridgeError> {
        self.inner.get(id)?;
        if let Some(runtime) = self.inner.runtime(id) {
            self.inner.forward_data(&runtime, None).await;
        }
        Ok(())
    }

    /// 按顺序补发缓冲，返回成功发出的条数。遇到失败即停止，失败的消息放回队首。
    pub async fn flush_buffer(&self, id: &str) -> Result<usize, BridgeError> {
        self.inner.get(id)?;
        match self.inner.runtime(id) {
            Some(runtime) => Ok(self.inner.flush(&runtime).await),
            None => Ok(0),
        }
    }

    /// 运行统计；未运行的桥接返回零值统计。
    pub async fn get_stats(&self, id: &str) -> Result<BridgeStats, BridgeError> {
        let bridge = self.inner.get(id)?;
        match self.inner.runtime(id) {
            Some(runtime) => {
                let state = runtime.state.lock().await;
                Ok(runtime.snapshot(&state, bridge.status))
            }
            None => Ok(BridgeStats::idle(id, bridge.status)),
        }
    }

    /// 响应连接状态变化：更新目标可达性、自动暂停与自动恢复。
    pub async fn handle_connection_status_change(&self, connection_id: &str, status: ConnectionStatus) {
        self.inner
            .handle_connection_status_change(connection_id, status)
            .await;
    }

    /// 把连接事件接到桥接上，事件通道关闭时任务结束。
    pub fn spawn_status_listener(
        &self,
        mut rx: broadcast::Receiver<ConnectionEvent>,
    ) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        inner
                            .handle_connection_status_change(&event.connection_id, event.status)
                            .await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "gw.bridge", skipped, "bridge_status_listener_lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(target: "gw.bridge", "bridge_status_listener_stopped");
        })
    }

    /// 当前有运行期状态（运行或暂停）的桥接 ID。
    pub fn running_bridges(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock_runtimes().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn stop_all(&self) {
        for id in self.running_bridges() {
            if let Err(err) = self.stop(&id) {
                warn!(target: "gw.bridge", bridge_id = %id, error = %err, "bridge_stop_failed");
            }
        }
    }

    pub fn dispose(&self) {
        self.stop_all();
    }
}

impl Inner {
    fn lock_runtimes(&self) -> MutexGuard<'_, HashMap<String, Arc<BridgeRuntime>>> {
        match self.runtimes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn get(&self, id: &str) -> Result<Bridge, BridgeError> {
        self.bridges
            .read()
            .map_err(|_| lock_failed())?
            .get(id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))
    }

    fn runtime(&self, id: &str) -> Option<Arc<BridgeRuntime>> {
        self.lock_runtimes().get(id).cloned()
    }

    fn remove_runtime(&self, id: &str) -> Option<Arc<BridgeRuntime>> {
        self.lock_runtimes().remove(id)
    }

    fn is_current(&self, runtime: &Arc<BridgeRuntime>) -> bool {
        self.lock_runtimes()
            .get(&runtime.bridge_id)
            .map(|current| Arc::ptr_eq(current, runtime))
            .unwrap_or(false)
    }

    fn validate(&self, bridge: &Bridge) -> Result<(), BridgeError> {
        if bridge.name.is_empty() {
            return Err(BridgeError::Invalid("name is required".to_string()));
        }
        if bridge.source_tag_ids.is_empty() {
            return Err(BridgeError::Invalid("at least one source tag is required".to_string()));
        }
        if bridge.target.topic_template.trim().is_empty() {
            return Err(BridgeError::Invalid("topic template is required".to_string()));
        }
        if bridge.target.qos > 2 {
            return Err(BridgeError::Invalid(format!("unsupported qos {}", bridge.target.qos)));
        }
        for connection_id in [&bridge.source_connection_id, &bridge.target_connection_id] {
            if self.connections.status(connection_id).is_none() {
                return Err(BridgeError::ConnectionNotFound(connection_id.clone()));
            }
        }
        Ok(())
    }

    fn set_status(&self, id: &str, status: BridgeStatus) -> Result<Bridge, BridgeError> {
        let bridge = {
            let mut bridges = self.bridges.write().map_err(|_| lock_failed())?;
            let bridge = bridges
                .get_mut(id)
                .ok_or_else(|| BridgeError::NotFound(id.to_string()))?;
            bridge.status = status;
            bridge.clone()
        };
        let _ = self.events.send(BridgeEvent::StatusChanged {
            bridge_id: id.to_string(),
            status,
        });
        Ok(bridge)
    }

    fn spawn_forwarder(self: &Arc<Self>, runtime: &Arc<BridgeRuntime>, interval_ms: u64) -> PeriodicTask {
        let weak_inner = Arc::downgrade(self);
        let weak_runtime = Arc::downgrade(runtime);
        PeriodicTask::spawn(
            format!("bridge:{}", runtime.bridge_id),
            Duration::from_millis(interval_ms),
            false,
            move |token| {
                let weak_inner = weak_inner.clone();
                let weak_runtime = weak_runtime.clone();
                async move {
                    if let (Some(inner), Some(runtime)) = (weak_inner.upgrade(), weak_runtime.upgrade()) {
                        inner.forward_data(&runtime, Some(token)).await;
                    }
                }
            },
        )
    }

    fn pause(&self, id: &str, auto: bool) -> Result<Bridge, BridgeError> {
        let bridge = self.get(id)?;
        if bridge.status != BridgeStatus::Active {
            return Ok(bridge);
        }
        if let Some(runtime) = self.runtime(id) {
            runtime.cancel_task();
            runtime.set_resume_pending(auto);
        }
        let bridge = self.set_status(id, BridgeStatus::Paused)?;
        info!(target: "gw.bridge", bridge_id = %id, auto, "bridge_paused");
        Ok(bridge)
    }

    async fn resume(self: &Arc<Self>, id: &str) -> Result<Bridge, BridgeError> {
        let bridge = self.get(id)?;
        if bridge.status != BridgeStatus::Paused {
            return Ok(bridge);
        }
        let runtime = {
            let mut runtimes = self.lock_runtimes();
            runtimes
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(BridgeRuntime::new(id, false)))
                .clone()
        };
        runtime.set_resume_pending(false);

        let reachable = self.connections.is_connected(&bridge.target_connection_id);
        runtime.set_target_reachable(reachable);
        if reachable {
            self.flush(&runtime).await;
        }

        // 补发期间可能已被停止或删除
        if !self.is_current(&runtime) {
            return self.get(id);
        }
        let bridge = self.get(id)?;
        if bridge.status != BridgeStatus::Paused || runtime.has_task() {
            return Ok(bridge);
        }
        runtime.install_task(self.spawn_forwarder(&runtime, bridge.options.interval_ms));
        let bridge = self.set_status(id, BridgeStatus::Active)?;
        info!(target: "gw.bridge", bridge_id = %id, target_reachable = reachable, "bridge_resumed");
        Ok(bridge)
    }

    async fn forward_data(&self, runtime: &Arc<BridgeRuntime>, token: Option<CancelToken>) {
        let bridge_id = runtime.bridge_id.as_str();
        let Ok(bridge) = self.get(bridge_id) else {
            return;
        };
        if bridge.status != BridgeStatus::Active {
            return;
        }
        let source_id = bridge.source_connection_id.as_str();
        if !self.connections.is_connected(source_id) {
            debug!(target: "gw.bridge", bridge_id = %bridge_id, source = %source_id, "bridge_source_offline");
            return;
        }
        let Some(source) = self.connections.adapter(source_id) else {
            return;
        };
        let tags = match self.connections.tags_by_ids(source_id, &bridge.source_tag_ids) {
            Ok(tags) => tags,
            Err(err) => {
                self.record_failure(runtime, err.to_string()).await;
                return;
            }
        };
        if tags.is_empty() {
            debug!(target: "gw.bridge", bridge_id = %bridge_id, "bridge_no_source_tags");
            return;
        }

        let read = source.read_tags(&tags).await;
        let cancelled = token.as_ref().map(CancelToken::is_cancelled).unwrap_or(false);
        if cancelled || !self.is_current(runtime) {
            debug!(target: "gw.bridge", bridge_id = %bridge_id, "bridge_tick_discarded");
            return;
        }
        let results = match read {
            Ok(results) => results,
            Err(err) => {
                self.record_failure(runtime, format!("read failed: {}", err)).await;
                return;
            }
        };

        let target = self.connections.adapter(&bridge.target_connection_id);
        let snapshots: BTreeMap<String, TagSnapshot> = tags
            .iter()
            .zip(&results)
            .map(|(tag, result)| {
                (
                    tag.name.clone(),
                    TagSnapshot {
                        value: result.value.clone(),
                        quality: result.quality,
                    },
                )
            })
            .collect();

        let mut state = runtime.state.lock().await;
        for (tag, result) in tags.iter().zip(&results) {
            let previous = state.last_values.insert(tag.id.clone(), result.value.clone());
            if bridge.options.change_only
                && !is_changed(previous.as_ref(), &result.value, bridge.options.change_threshold)
            {
                continue;
            }

            let message = match build_message(&bridge, tag, result, &snapshots) {
                Ok(message) => message,
                Err(err) => {
                    record_template_failure();
                    warn!(target: "gw.bridge", bridge_id = %bridge_id, tag_id = %tag.id, error = %err, "bridge_template_failed");
                    state.record_error(err.to_string());
                    self.emit_error(bridge_id, err.to_string());
                    continue;
                }
            };

            if !runtime.is_target_reachable() {
                self.buffer_message(&mut state, &bridge, message);
                continue;
            }
            match publish(target.as_deref(), &bridge, &message).await {
                Ok(()) => {
                    record_message_forwarded(message.payload.len() as u64);
                    state.record_forwarded(message.payload.len(), now_epoch_ms());
                }
                Err(err) => {
                    record_publish_failure();
                    if runtime.set_target_reachable(false) {
                        warn!(target: "gw.bridge", bridge_id = %bridge_id, error = %err, "bridge_target_unreachable");
                    }
                    state.record_error(err.to_string());
                    self.emit_error(bridge_id, err.to_string());
                    self.buffer_message(&mut state, &bridge, message);
                }
            }
        }

        let stats = runtime.snapshot(&state, bridge.status);
        drop(state);
        let _ = self.events.send(BridgeEvent::Stats(stats));
    }

    async fn flush(&self, runtime: &Arc<BridgeRuntime>) -> usize {
        let bridge_id = runtime.bridge_id.as_str();
        let Ok(bridge) = self.get(bridge_id) else {
            return 0;
        };
        let target = self.connections.adapter(&bridge.target_connection_id);

        let mut state = runtime.state.lock().await;
        if state.buffer.is_empty() {
            return 0;
        }
        let mut delivered = 0;
        let mut failure = None;
        while let Some(message) = state.buffer.pop_front() {
            match publish(target.as_deref(), &bridge, &message).await {
                Ok(()) => {
                    record_message_forwarded(message.payload.len() as u64);
                    state.record_forwarded(message.payload.len(), now_epoch_ms());
                    delivered += 1;
                }
                Err(err) => {
                    state.buffer.push_front(message);
                    failure = Some(err.to_string());
                    break;
                }
            }
        }

        match failure {
            Some(message) => {
                record_publish_failure();
                runtime.set_target_reachable(false);
                state.record_error(message.clone());
                warn!(
                    target: "gw.bridge",
                    bridge_id = %bridge_id,
                    delivered,
                    remaining = state.buffer.len(),
                    error = %message,
                    "bridge_flush_interrupted"
                );
                self.emit_error(bridge_id, message);
            }
            None => {
                runtime.set_target_reachable(true);
                info!(target: "gw.bridge", bridge_id = %bridge_id, delivered, "bridge_buffer_flushed");
            }
        }

        let stats = runtime.snapshot(&state, bridge.status);
        drop(state);
        let _ = self.events.send(BridgeEvent::Stats(stats));
        delivered
    }

    async fn handle_connection_status_change(self: &Arc<Self>, connection_id: &str, status: ConnectionStatus) {
        let affected: Vec<Bridge> = match self.bridges.read() {
            Ok(bridges) => bridges
                .values()
                .filter(|bridge| {
                    bridge.source_connection_id == connection_id
                        || bridge.target_connection_id == connection_id
                })
                .cloned()
                .collect(),
            Err(_) => return,
        };

        for bridge in affected {
            let Some(runtime) = self.runtime(&bridge.id) else {
                continue;
            };

            if bridge.target_connection_id == connection_id {
                let reachable = status == ConnectionStatus::Connected;
                let was_reachable = runtime.set_target_reachable(reachable);
                if reachable && !was_reachable {
                    info!(target: "gw.bridge", bridge_id = %bridge.id, "bridge_target_recovered");
                    let inner = Arc::clone(self);
                    let runtime = Arc::clone(&runtime);
                    tokio::spawn(async move {
                        inner.flush(&runtime).await;
                    });
                } else if !reachable && was_reachable {
                    warn!(target: "gw.bridge", bridge_id = %bridge.id, status = %status, "bridge_target_unreachable");
                }
            }

            if self.auto_resume && bridge.source_connection_id == connection_id {
                match status {
                    ConnectionStatus::Disconnected | ConnectionStatus::Error
                        if bridge.status == BridgeStatus::Active =>
                    {
                        if let Err(err) = self.pause(&bridge.id, true) {
                            warn!(target: "gw.bridge", bridge_id = %bridge.id, error = %err, "bridge_auto_pause_failed");
                        }
                    }
                    ConnectionStatus::Connected if bridge.status == BridgeStatus::Paused => {
                        if runtime.take_resume_pending() {
                            if let Err(err) = self.resume(&bridge.id).await {
                                warn!(target: "gw.bridge", bridge_id = %bridge.id, error = %err, "bridge_auto_resume_failed");
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    async fn record_failure(&self, runtime: &BridgeRuntime, message: String) {
        warn!(target: "gw.bridge", bridge_id = %runtime.bridge_id, error = %message, "bridge_forward_failed");
        runtime.state.lock().await.record_error(message.clone());
        self.emit_error(&runtime.bridge_id, message);
    }

    fn buffer_message(&self, state: &mut RuntimeState, bridge: &Bridge, message: BufferedMessage) {
        record_message_buffered();
        if let Some(evicted) = state.push_buffer(message, bridge.options.buffer_size) {
            record_message_dropped();
            debug!(
                target: "gw.bridge",
                bridge_id = %bridge.id,
                tag_id = %evicted.source_tag_id,
                "bridge_buffer_overflow"
            );
        }
    }

    fn emit_error(&self, bridge_id: &str, message: String) {
        let _ = self.events.send(BridgeEvent::Error {
            bridge_id: bridge_id.to_string(),
            message,
        });
    }
}

fn build_message(
    bridge: &Bridge,
    tag: &Tag,
    result: &ReadResult,
    snapshots: &BTreeMap<String, TagSnapshot>,
) -> Result<BufferedMessage, TemplateError> {
    let context = TemplateContext {
        value: result.value.clone(),
        timestamp: result.timestamp,
        quality: result.quality,
        tag_id: tag.id.clone(),
        tag_name: tag.name.clone(),
        connection_id: bridge.source_connection_id.clone(),
        unit: tag.unit.clone(),
        tags: snapshots.clone(),
    };
    Ok(BufferedMessage {
        timestamp: result.timestamp,
        topic: resolve_topic(&bridge.target.topic_template, &context)?,
        payload: resolve_payload(&bridge.target.payload_template, &context)?,
        source_tag_id: tag.id.clone(),
    })
}

async fn publish(
    target: Option<&dyn ProtocolAdapter>,
    bridge: &Bridge,
    message: &BufferedMessage,
) -> Result<(), BridgeError> {
    let target = target
        .ok_or_else(|| BridgeError::TargetUnavailable(bridge.target_connection_id.clone()))?;
    target
        .publish(
            &message.topic,
            message.payload.as_bytes(),
            bridge.target.qos,
            bridge.target.retain,
        )
        .await
        .map_err(|err| BridgeError::TargetUnavailable(err.to_string()))
}
