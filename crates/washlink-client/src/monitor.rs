//! 会话活性监视
//!
//! 家电彻底沉默不是错误，只是"不再有更新"——会话层不会为此报警。
//! 守护进程需要知道这件事，本模块在事件流上挂一条监视线程，
//! 记录每个字段的最近更新时刻和累计次数，供外部随时查询静默
//! 时长与陈旧字段。
//!
//! 监视是旁路：只消费自己那份订阅，不影响会话本体。

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use washlink_driver::TelemetryEvent;
use washlink_protocol::FieldId;

/// 单个字段的活动记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldActivity {
    pub field: FieldId,
    /// 累计更新次数（读响应 + 变更通知）
    pub updates: u64,
    pub last_seen: Instant,
}

struct MonitorState {
    activity: [Option<FieldActivity>; FieldId::ALL.len()],
    last_update: Option<Instant>,
    timeouts: u64,
    ready_seen: bool,
    close_reason: Option<String>,
}

impl MonitorState {
    fn new() -> Self {
        MonitorState {
            activity: std::array::from_fn(|_| None),
            last_update: None,
            timeouts: 0,
            ready_seen: false,
            close_reason: None,
        }
    }

    fn touch(&mut self, field: FieldId, now: Instant) {
        let slot = &mut self.activity[field.index()];
        match slot {
            Some(activity) => {
                activity.updates += 1;
                activity.last_seen = now;
            }
            None => {
                *slot = Some(FieldActivity {
                    field,
                    updates: 1,
                    last_seen: now,
                });
            }
        }
        self.last_update = Some(now);
    }
}

/// 会话活性监视器
///
/// Drop 时停止监视线程并 join。
pub struct SessionMonitor {
    state: Arc<RwLock<MonitorState>>,
    is_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SessionMonitor {
    /// 在一条事件订阅上启动监视
    pub fn spawn(events: crossbeam_channel::Receiver<TelemetryEvent>) -> Self {
        let state = Arc::new(RwLock::new(MonitorState::new()));
        let is_running = Arc::new(AtomicBool::new(true));

        let thread_state = state.clone();
        let thread_running = is_running.clone();
        let thread = std::thread::spawn(move || {
            monitor_loop(events, thread_state, thread_running);
        });

        SessionMonitor {
            state,
            is_running,
            thread: Some(thread),
        }
    }

    /// 距最近一次字段更新的时长（从未更新过则为 `None`）
    pub fn idle_for(&self) -> Option<Duration> {
        self.state.read().last_update.map(|at| at.elapsed())
    }

    /// 字段的活动记录
    pub fn activity(&self, field: FieldId) -> Option<FieldActivity> {
        self.state.read().activity[field.index()]
    }

    /// 最近更新时刻早于阈值的字段（从未更新过的不算陈旧）
    pub fn stale_fields(&self, threshold: Duration) -> Vec<FieldId> {
        self.state
            .read()
            .activity
            .iter()
            .flatten()
            .filter(|a| a.last_seen.elapsed() > threshold)
            .map(|a| a.field)
            .collect()
    }

    /// 累计超时事件数
    pub fn timeouts(&self) -> u64 {
        self.state.read().timeouts
    }

    /// 是否观察到就绪信号
    pub fn ready_seen(&self) -> bool {
        self.state.read().ready_seen
    }

    /// 会话关闭原因（未关闭则为 `None`）
    pub fn close_reason(&self) -> Option<String> {
        self.state.read().close_reason.clone()
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            warn!("monitor thread panicked");
        }
    }
}

fn monitor_loop(
    events: crossbeam_channel::Receiver<TelemetryEvent>,
    state: Arc<RwLock<MonitorState>>,
    is_running: Arc<AtomicBool>,
) {
    loop {
        if !is_running.load(Ordering::Acquire) {
            break;
        }
        let event = match events.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => event,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        let now = Instant::now();
        let mut state = state.write();
        match event {
            TelemetryEvent::FieldRead { field, .. }
            | TelemetryEvent::FieldChanged { field, .. } => state.touch(field, now),
            TelemetryEvent::ReadTimedOut { .. } | TelemetryEvent::SubscribeTimedOut { .. } => {
                state.timeouts += 1;
            }
            TelemetryEvent::SessionReady => state.ready_seen = true,
            TelemetryEvent::SessionClosed { reason } => {
                state.close_reason = Some(reason);
                break;
            }
            _ => {}
        }
    }
    debug!("monitor loop exiting");
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod monitor_tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use washlink_protocol::{FieldRecord, RawValue};

    fn field_read(field: FieldId, value: u32) -> TelemetryEvent {
        TelemetryEvent::FieldRead {
            field,
            record: FieldRecord::DoorCount(value),
            raw: RawValue::Integer(value),
        }
    }

    /// 轮询等待监视线程消化完投递的事件
    fn eventually<F: Fn() -> bool>(pred: F) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if pred() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn test_updates_are_counted_per_field() {
        let (tx, rx) = unbounded();
        let monitor = SessionMonitor::spawn(rx);

        tx.send(field_read(FieldId::DoorCount, 1)).unwrap();
        tx.send(field_read(FieldId::DoorCount, 2)).unwrap();
        tx.send(field_read(FieldId::Reminders, 0)).unwrap();

        eventually(|| monitor.activity(FieldId::Reminders).is_some());
        let activity = monitor.activity(FieldId::DoorCount).unwrap();
        assert_eq!(activity.updates, 2);
        assert!(monitor.idle_for().is_some());
        assert!(monitor.activity(FieldId::Error).is_none());
    }

    #[test]
    fn test_timeout_events_accumulate() {
        let (tx, rx) = unbounded();
        let monitor = SessionMonitor::spawn(rx);

        tx.send(TelemetryEvent::ReadTimedOut {
            field: FieldId::DoorCount,
        })
        .unwrap();
        tx.send(TelemetryEvent::SubscribeTimedOut {
            field: FieldId::Reminders,
        })
        .unwrap();

        eventually(|| monitor.timeouts() == 2);
    }

    #[test]
    fn test_close_reason_recorded() {
        let (tx, rx) = unbounded();
        let monitor = SessionMonitor::spawn(rx);

        tx.send(TelemetryEvent::SessionReady).unwrap();
        tx.send(TelemetryEvent::SessionClosed {
            reason: "bus disconnected".to_string(),
        })
        .unwrap();

        eventually(|| monitor.close_reason().is_some());
        assert!(monitor.ready_seen());
        assert_eq!(monitor.close_reason().as_deref(), Some("bus disconnected"));
    }

    #[test]
    fn test_never_updated_fields_are_not_stale() {
        let (tx, rx) = unbounded();
        let monitor = SessionMonitor::spawn(rx);

        tx.send(field_read(FieldId::DoorCount, 1)).unwrap();
        eventually(|| monitor.activity(FieldId::DoorCount).is_some());

        // 刚更新过，阈值 0 毫秒下仍可能被判陈旧，给出足够余量
        assert!(monitor.stale_fields(Duration::from_secs(60)).is_empty());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(
            monitor.stale_fields(Duration::from_millis(1)),
            vec![FieldId::DoorCount]
        );
    }

    #[test]
    fn test_drop_joins_monitor_thread() {
        let (tx, rx) = unbounded();
        let monitor = SessionMonitor::spawn(rx);
        drop(monitor);
        // 线程已退出，继续投递不会出错也不会被消费
        let _ = tx.send(TelemetryEvent::SessionReady);
    }
}
