//! 单个桥接的运行期状态（启动时创建，stop/delete 时销毁）。

use domain::{BridgeStats, BridgeStatus, BufferedMessage, TagValue};
use gw_scheduler::PeriodicTask;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub messages_forwarded: u64,
    pub messages_dropped: u64,
    pub bytes_transferred: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub last_forward_at: Option<i64>,
}

/// 受桥接自身互斥锁保护的部分；转发 tick 与补发在同一把锁下串行。
#[derive(Debug, Default)]
pub(crate) struct RuntimeState {
    pub counters: Counters,
    /// 点位 ID → 上次观察到的值
    pub last_values: HashMap<String, TagValue>,
    pub buffer: VecDeque<BufferedMessage>,
}

impl RuntimeState {
    pub fn record_forwarded(&mut self, bytes: usize, at: i64) {
        self.counters.messages_forwarded += 1;
        self.counters.bytes_transferred += bytes as u64;
        self.counters.last_forward_at = Some(at);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.counters.error_count += 1;
        self.counters.last_error = Some(message.into());
    }

    /// 追加到缓冲尾部。已满时丢弃最旧的一条并返回它；容量为 0 时直接丢弃新消息。
    pub fn push_buffer(
        &mut self,
        message: BufferedMessage,
        capacity: usize,
    ) -> Option<BufferedMessage> {
        if capacity == 0 {
            self.counters.messages_dropped += 1;
            return Some(message);
        }
        let mut evicted = None;
        while self.buffer.len() >= capacity {
            evicted = self.buffer.pop_front();
            self.counters.messages_dropped += 1;
        }
        self.buffer.push_back(message);
        evicted
    }
}

pub(crate) struct BridgeRuntime {
    pub bridge_id: String,
    started_at: Instant,
    target_reachable: AtomicBool,
    resume_pending: AtomicBool,
    pub state: tokio::sync::Mutex<RuntimeState>,
    /// 暂停时为 None
    task: Mutex<Option<PeriodicTask>>,
}

impl BridgeRuntime {
    pub fn new(bridge_id: impl Into<String>, target_reachable: bool) -> Self {
        Self {
            bridge_id: bridge_id.into(),
            started_at: Instant::now(),
            target_reachable: AtomicBool::new(target_reachable),
            resume_pending: AtomicBool::new(false),
            state: tokio::sync::Mutex::new(RuntimeState::default()),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<PeriodicTask>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_target_reachable(&self) -> bool {
        self.target_reachable.load(Ordering::SeqCst)
    }

    /// 更新可达标记，返回旧值。
    pub fn set_target_reachable(&self, reachable: bool) -> bool {
        self.target_reachable.swap(reachable, Ordering::SeqCst)
    }

    pub fn set_resume_pending(&self, pending: bool) {
        self.resume_pending.store(pending, Ordering::SeqCst);
    }

    /// 取出并清除 "等待自动恢复" 标记。
    pub fn take_resume_pending(&self) -> bool {
        self.resume_pending.swap(false, Ordering::SeqCst)
    }

    /// 安装转发定时器，替换掉的旧定时器随之取消。
    pub fn install_task(&self, task: PeriodicTask) {
        if let Some(previous) = self.task().replace(task) {
            previous.cancel();
        }
    }

    pub fn cancel_task(&self) -> bool {
        match self.task().take() {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_task(&self) -> bool {
        self.task().is_some()
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self, state: &RuntimeState, status: BridgeStatus) -> BridgeStats {
        let counters = &state.counters;
        BridgeStats {
            bridge_id: self.bridge_id.clone(),
            status,
            messages_forwarded: counters.messages_forwarded,
            messages_dropped: counters.messages_dropped,
            bytes_transferred: counters.bytes_transferred,
            error_count: counters.error_count,
            last_error: counters.last_error.clone(),
            last_forward_at: counters.last_forward_at,
            uptime_ms: self.uptime_ms(),
            buffered_messages: state.buffer.len(),
            target_reachable: self.is_target_reachable(),
        }
    }
}

/// 变化判定：首次观察总算变化；数值且设置了阈值时比较差值，否则比较是否相等。
pub(crate) fn is_changed(previous: Option<&TagValue>, current: &TagValue, threshold: Option<f64>) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    match (threshold, previous.as_f64(), current.as_f64()) {
        (Some(threshold), Some(old), Some(new)) => (new - old).abs() >= threshold,
        _ => previous != current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: i64) -> BufferedMessage {
        BufferedMessage {
            timestamp: n,
            topic: "t".to_string(),
            payload: n.to_string(),
            source_tag_id: "tag".to_string(),
        }
    }

    #[test]
    fn buffer_evicts_oldest_when_full() {
        let mut state = RuntimeState::default();
        for n in 0..3 {
            assert!(state.push_buffer(message(n), 3).is_none());
        }
        let evicted = state.push_buffer(message(3), 3).expect("evicted");
        assert_eq!(evicted.timestamp, 0);
        assert_eq!(state.counters.messages_dropped, 1);
        let kept: Vec<i64> = state.buffer.iter().map(|m| m.timestamp).collect();
        assert_eq!(kept, vec![1, 2, 3]);
    }

    #[test]
    fn zero_capacity_drops_everything() {
        let mut state = RuntimeState::default();
        assert!(state.push_buffer(message(1), 0).is_some());
        assert!(state.buffer.is_empty());
        assert_eq!(state.counters.messages_dropped, 1);
    }

    #[test]
    fn change_detection() {
        let n = |v: f64| TagValue::Number(v);
        assert!(is_changed(None, &n(1.0), Some(5.0)));
        assert!(!is_changed(Some(&n(1.0)), &n(3.0), Some(5.0)));
        assert!(is_changed(Some(&n(1.0)), &n(6.0), Some(5.0)));
        assert!(is_changed(Some(&n(6.0)), &n(1.0), Some(5.0)));
        assert!(!is_changed(Some(&n(1.0)), &n(1.0), None));
        assert!(is_changed(Some(&n(1.0)), &n(1.5), None));
        // 非数值忽略阈值
        assert!(is_changed(
            Some(&TagValue::Bool(true)),
            &TagValue::Bool(false),
            Some(5.0)
        ));
        assert!(!is_changed(
            Some(&TagValue::Text("a".into())),
            &TagValue::Text("a".into()),
            Some(5.0)
        ));
    }

    #[tokio::test]
    async fn snapshot_reflects_state() {
        let runtime = BridgeRuntime::new("b1", false);
        {
            let mut state = runtime.state.lock().await;
            state.record_forwarded(10, 42);
            state.record_error("boom");
            state.push_buffer(message(1), 10);
        }
        let state = runtime.state.lock().await;
        let stats = runtime.snapshot(&state, BridgeStatus::Active);
        assert_eq!(stats.bridge_id, "b1");
        assert_eq!(stats.messages_forwarded, 1);
        assert_eq!(stats.bytes_transferred, 10);
        assert_eq!(stats.last_forward_at, Some(42));
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.last_error.as_deref(), Some("boom"));
        assert_eq!(stats.buffered_messages, 1);
        assert!(!stats.target_reachable);
        assert!(!runtime.take_resume_pending());
    }
}
