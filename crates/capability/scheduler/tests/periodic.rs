use gw_scheduler::PeriodicTask;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

fn counting_task(period_ms: u64, immediate: bool) -> (PeriodicTask, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let ticks = count.clone();
    let task = PeriodicTask::spawn("count", Duration::from_millis(period_ms), immediate, move |_| {
        let ticks = ticks.clone();
        async move {
            ticks.fetch_add(1, Ordering::SeqCst);
        }
    });
    (task, count)
}

#[tokio::test(start_paused = true)]
async fn immediate_tick_then_every_period() {
    let (task, count) = counting_task(100, true);
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(count.load(Ordering::SeqCst), 4);
    task.cancel();
}

#[tokio::test(start_paused = true)]
async fn delayed_first_tick() {
    let (_task, count) = counting_task(100, false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_is_idempotent_and_stops_ticks() {
    let (task, count) = counting_task(100, true);
    tokio::time::sleep(Duration::from_millis(150)).await;
    task.cancel();
    task.cancel();
    assert!(task.is_cancelled());
    let seen = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(count.load(Ordering::SeqCst), seen);
}

#[tokio::test(start_paused = true)]
async fn drop_cancels() {
    let (task, count) = counting_task(100, true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(task);
    let seen = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(count.load(Ordering::SeqCst), seen);
}

#[tokio::test(start_paused = true)]
async fn slow_ticks_never_overlap() {
    let running = Arc::new(AtomicUsize::new(0));
    let max_running = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));
    let (r, m, t) = (running.clone(), max_running.clone(), total.clone());
    let task = PeriodicTask::spawn("slow", Duration::from_millis(100), true, move |_| {
        let (r, m, t) = (r.clone(), m.clone(), t.clone());
        async move {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            m.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(250)).await;
            r.fetch_sub(1, Ordering::SeqCst);
            t.fetch_add(1, Ordering::SeqCst);
        }
    });

    tokio::time::sleep(Duration::from_millis(1000)).await;
    task.cancel();
    assert_eq!(max_running.load(Ordering::SeqCst), 1);
    // 每次 tick 250ms，1 秒内最多完成 4 次
    assert!(total.load(Ordering::SeqCst) <= 4);
    assert!(total.load(Ordering::SeqCst) >= 3);
}

#[tokio::test(start_paused = true)]
async fn in_flight_tick_observes_cancellation() {
    let observed = Arc::new(AtomicBool::new(false));
    let flag = observed.clone();
    let task = PeriodicTask::spawn("inflight", Duration::from_millis(1000), true, move |token| {
        let flag = flag.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(token.is_cancelled(), Ordering::SeqCst);
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let token = task.token();
    task.cancel();
    assert!(token.is_cancelled());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(observed.load(Ordering::SeqCst));
}
