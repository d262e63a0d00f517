//! 追踪初始化、运行计数与请求 ID 生成。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 运行计数快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub connect_failures: u64,
    pub polls: u64,
    pub poll_failures: u64,
    pub points_persisted: u64,
    pub persist_failures: u64,
    pub messages_forwarded: u64,
    pub bytes_forwarded: u64,
    pub messages_buffered: u64,
    pub messages_dropped: u64,
    pub publish_failures: u64,
    pub template_failures: u64,
}

/// 运行计数（仅用于观测，不承载任何服务状态）。
pub struct TelemetryMetrics {
    connect_failures: AtomicU64,
    polls: AtomicU64,
    poll_failures: AtomicU64,
    points_persisted: AtomicU64,
    persist_failures: AtomicU64,
    messages_forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    messages_buffered: AtomicU64,
    messages_dropped: AtomicU64,
    publish_failures: AtomicU64,
    template_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            connect_failures: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            points_persisted: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
            messages_forwarded: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            messages_buffered: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            template_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            points_persisted: self.points_persisted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            messages_forwarded: self.messages_forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            messages_buffered: self.messages_buffered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            template_failures: self.template_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可通过 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录连接失败次数。
pub fn record_connect_failure() {
    metrics().connect_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录轮询次数。
pub fn record_poll() {
    metrics().polls.fetch_add(1, Ordering::Relaxed);
}

/// 记录轮询读取失败次数（降级为 bad 质量）。
pub fn record_poll_failure() {
    metrics().poll_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入数据缓冲的点数。
pub fn record_points_persisted(count: u64) {
    metrics().points_persisted.fetch_add(count, Ordering::Relaxed);
}

/// 记录数据缓冲写入失败次数。
pub fn record_persist_failure() {
    metrics().persist_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录桥接转发成功（消息数与字节数）。
pub fn record_message_forwarded(bytes: u64) {
    let metrics = metrics();
    metrics.messages_forwarded.fetch_add(1, Ordering::Relaxed);
    metrics.bytes_forwarded.fetch_add(bytes, Ordering::Relaxed);
}

/// 记录进入桥接缓冲的消息数。
pub fn record_message_buffered() {
    metrics().messages_buffered.fetch_add(1, Ordering::Relaxed);
}

/// 记录缓冲溢出丢弃的消息数。
pub fn record_message_dropped() {
    metrics().messages_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录发布失败次数。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录模板解析失败次数。
pub fn record_template_failure() {
    metrics().template_failures.fetch_add(1, Ordering::Relaxed);
}
