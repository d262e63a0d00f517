use crate::error::PollingError;
use crate::sink::DataBufferSink;
use domain::{
    DataPoint, PollingData, PollingStatus, PollingStatusEvent, Quality, ReadResult, Tag, TagValue,
    now_epoch_ms,
};
use gw_connection::ConnectionManager;
use gw_scheduler::{CancelToken, PeriodicTask};
use gw_telemetry::{record_persist_failure, record_points_persisted, record_poll, record_poll_failure};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

const EVENT_CAPACITY: usize = 1024;

/// 把请求的轮询周期限定在 [100, 60000] 毫秒。
pub fn clamp_interval(interval_ms: u64) -> u64 {
    interval_ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
}

/// 轮询事件。
#[derive(Debug, Clone, PartialEq)]
pub enum PollingEvent {
    /// 每次轮询的读数
    Data(PollingData),
    /// 会话启动/停止
    Status(PollingStatusEvent),
}

#[derive(Debug, Default)]
struct SessionState {
    last_poll_timestamp: i64,
    tag_count: usize,
}

/// 轮询会话（仅运行期存在）。
struct Session {
    connection_id: String,
    /// 请求的点位 ID，空表示全部启用点位
    tag_ids: Vec<String>,
    interval_ms: u64,
    state: Mutex<SessionState>,
}

impl Session {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn status(&self) -> PollingStatus {
        let state = self.state();
        PollingStatus {
            is_polling: true,
            interval_ms: self.interval_ms,
            last_poll_timestamp: state.last_poll_timestamp,
            tag_count: state.tag_count,
        }
    }
}

struct SessionHandle {
    session: Arc<Session>,
    /// 句柄被丢弃时任务随之取消
    task: PeriodicTask,
}

struct Inner {
    connections: ConnectionManager,
    sink: Arc<dyn DataBufferSink>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    events: broadcast::Sender<PollingEvent>,
}

/// 轮询引擎（可克隆，克隆共享同一份状态）。
#[derive(Clone)]
pub struct PollingEngine {
    inner: Arc<Inner>,
}

impl PollingEngine {
    pub fn new(connections: ConnectionManager, sink: Arc<dyn DataBufferSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                connections,
                sink,
                sessions: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollingEvent> {
        self.inner.events.subscribe()
    }

    /// 启动轮询。已有会话时先停止旧会话再启动新会话。
    pub fn start_polling(
        &self,
        connection_id: &str,
        tag_ids: Vec<String>,
        interval_ms: u64,
    ) -> Result<PollingStatus, PollingError> {
        let connections = &self.inner.connections;
        let status = connections
            .status(connection_id)
            .ok_or_else(|| PollingError::NotFound(connection_id.to_string()))?;
        if status != domain::ConnectionStatus::Connected || connections.adapter(connection_id).is_none() {
            return Err(PollingError::NotConnected(connection_id.to_string()));
        }

        let interval_ms = clamp_interval(interval_ms);
        let tags = resolve_tags(connections, connection_id, &tag_ids)?;
        if tags.is_empty() {
            return Err(PollingError::NoEnabledTags);
        }

        self.stop_polling(connection_id);

        let session = Arc::new(Session {
            connection_id: connection_id.to_string(),
            tag_ids,
            interval_ms,
            state: Mutex::new(SessionState {
                last_poll_timestamp: 0,
                tag_count: tags.len(),
            }),
        });
        let status = session.status();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let tick_session = session.clone();
        {
            // 持锁启动：首个 tick 在会话登记完成后才能判断自己是否为当前会话
            let mut sessions = self.inner.lock_sessions();
            let task = PeriodicTask::spawn(
                format!("polling:{}", connection_id),
                Duration::from_millis(interval_ms),
                true,
                move |token| {
                    let weak = weak.clone();
                    let session = tick_session.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.poll_once(&session, token).await;
                        }
                    }
                },
            );
            sessions.insert(connection_id.to_string(), SessionHandle { session, task });
        }
        info!(
            target: "gw.polling",
            connection_id = %connection_id,
            interval_ms,
            tag_count = status.tag_count,
            "polling_started"
        );
        self.inner.emit_status(connection_id, status.clone());
        Ok(status)
    }

    /// 停止轮询；没有会话时什么都不做。返回是否真的停止了会话。
    pub fn stop_polling(&self, connection_id: &str) -> bool {
        let removed = self.inner.lock_sessions().remove(connection_id);
        match removed {
            Some(handle) => {
                handle.task.cancel();
                info!(target: "gw.polling", connection_id = %connection_id, "polling_stopped");
                self.inner
                    .emit_status(connection_id, PollingStatus::default());
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self, connection_id: &str) -> bool {
        self.inner.lock_sessions().contains_key(connection_id)
    }

    /// 会话状态；没有会话时返回全零的 "未轮询" 状态。
    pub fn get_polling_status(&self, connection_id: &str) -> PollingStatus {
        self.inner
            .lock_sessions()
            .get(connection_id)
            .map(|handle| handle.session.status())
            .unwrap_or_default()
    }

    /// 当前有会话的连接 ID。
    pub fn active_connections(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock_sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn stop_all(&self) {
        for connection_id in self.active_connections() {
            self.stop_polling(&connection_id);
        }
    }

    pub fn dispose(&self) {
        self.stop_all();
    }
}

impl Inner {
    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, SessionHandle>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_current(&self, session: &Arc<Session>) -> bool {
        self.lock_sessions()
            .get(&session.connection_id)
            .map(|handle| Arc::ptr_eq(&handle.session, session))
            .unwrap_or(false)
    }

    /// 会话自行停止（只停止仍是当前会话的那一个）。
    fn stop_session(&self, session: &Arc<Session>, reason: &str) {
        let removed = {
            let mut sessions = self.lock_sessions();
            let current = sessions
                .get(&session.connection_id)
                .map(|handle| Arc::ptr_eq(&handle.session, session))
                .unwrap_or(false);
            if current {
                sessions.remove(&session.connection_id)
            } else {
                None
            }
        };
        if let Some(handle) = removed {
            handle.task.cancel();
            warn!(
                target: "gw.polling",
                connection_id = %session.connection_id,
                reason,
                "polling_self_stopped"
            );
            self.emit_status(&session.connection_id, PollingStatus::default());
        }
    }

    async fn poll_once(&self, session: &Arc<Session>, token: CancelToken) {
        let connection_id = session.connection_id.as_str();
        if !self.connections.is_connected(connection_id) {
            self.stop_session(session, "connection is not connected");
            return;
        }
        let Some(adapter) = self.connections.adapter(connection_id) else {
            self.stop_session(session, "adapter is gone");
            return;
        };
        let tags = match resolve_tags(&self.connections, connection_id, &session.tag_ids) {
            Ok(tags) if !tags.is_empty() => tags,
            Ok(_) => {
                self.stop_session(session, "no enabled tags");
                return;
            }
            Err(err) => {
                self.stop_session(session, &err.to_string());
                return;
            }
        };

        record_poll();
        let read = adapter.read_tags(&tags).await;
        if token.is_cancelled() || !self.is_current(session) {
            debug!(target: "gw.polling", connection_id = %connection_id, "polling_result_discarded");
            return;
        }

        let timestamp = now_epoch_ms();
        let values = match read {
            Ok(values) => {
                let points: Vec<DataPoint> = values.iter().map(DataPoint::from).collect();
                match self.sink.insert_batch(&points).await {
                    Ok(()) => record_points_persisted(points.len() as u64),
                    Err(err) => {
                        record_persist_failure();
                        warn!(target: "gw.polling", connection_id = %connection_id, error = %err, "polling_persist_failed");
                    }
                }
                let mut state = session.state();
                state.last_poll_timestamp = timestamp;
                state.tag_count = tags.len();
                values
            }
            Err(err) => {
                record_poll_failure();
                warn!(target: "gw.polling", connection_id = %connection_id, error = %err, "polling_read_failed");
                degraded(&tags, timestamp)
            }
        };

        let _ = self.events.send(PollingEvent::Data(PollingData {
            connection_id: connection_id.to_string(),
            timestamp,
            values,
        }));
    }

    fn emit_status(&self, connection_id: &str, status: PollingStatus) {
        let _ = self
            .events
            .send(PollingEvent::Status(PollingStatusEvent::new(connection_id, status)));
    }
}

/// 读取失败时的降级结果：每个点位 value=0、quality=bad。
fn degraded(tags: &[Tag], timestamp: i64) -> Vec<ReadResult> {
    tags.iter()
        .map(|tag| ReadResult {
            tag_id: tag.id.clone(),
            value: TagValue::Number(0.0),
            quality: Quality::Bad,
            timestamp,
        })
        .collect()
}

/// 解析要轮询的点位：未指定时取全部启用点位，否则取指定 ID 中存在且启用的点位。
fn resolve_tags(
    connections: &ConnectionManager,
    connection_id: &str,
    tag_ids: &[String],
) -> Result<Vec<Tag>, PollingError> {
    let tags = if tag_ids.is_empty() {
        connections.enabled_tags(connection_id)?
    } else {
        connections
            .tags_by_ids(connection_id, tag_ids)?
            .into_iter()
            .filter(|tag| tag.enabled)
            .collect()
    };
    Ok(tags)
}
