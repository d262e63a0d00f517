//! 周期任务：一个 ticker 加一个取消信号。
//!
//! - 每个任务独占一个 tokio 任务，同一任务的 tick 串行执行，不会重叠；
//!   tick 耗时超过周期时跳过错过的 tick（`MissedTickBehavior::Skip`）。
//! - `cancel()` 同步、幂等；已在执行中的 tick 会跑完，
//!   tick 可以通过 [`CancelToken`] 判断结果是否还需要提交。
//! - 任务句柄被丢弃时自动取消。

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// 取消信号的只读视图。
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// 周期任务句柄。
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    period: Duration,
    cancel: watch::Sender<bool>,
}

impl PeriodicTask {
    /// 启动周期任务。`immediate` 为 true 时立即执行第一次 tick。
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, immediate: bool, mut tick: F) -> Self
    where
        F: FnMut(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let period = period.max(Duration::from_millis(1));
        let (cancel, mut rx) = watch::channel(false);
        let token = CancelToken { rx: rx.clone() };
        let task_name = name.clone();

        tokio::spawn(async move {
            let start = if immediate {
                Instant::now()
            } else {
                Instant::now() + period
            };
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        tick(token.clone()).await;
                    }
                }
            }
            debug!(target: "gw.scheduler", task = %task_name, "periodic_task_stopped");
        });

        debug!(target: "gw.scheduler", task = %name, period_ms = period.as_millis() as u64, "periodic_task_started");
        Self {
            name,
            period,
            cancel,
        }
    }

    /// 取消任务（幂等）。
    pub fn cancel(&self) {
        if !self.cancel.send_replace(true) {
            debug!(
                target: "gw.scheduler",
                task = %self.name,
                period_ms = self.period.as_millis() as u64,
                "periodic_task_cancelled"
            );
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// 获取任务的取消信号。
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.cancel.subscribe(),
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
