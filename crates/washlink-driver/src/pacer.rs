//! 下发节拍器
//!
//! 家电侧处理不过来密集请求，所有出站请求先经过这里：相邻两次
//! 下发之间保证不小于最小间隔。纯状态机，时间由调用方注入，
//! 真正的发送和定时器都在会话线程里。
//!
//! 两条硬性约束：
//!
//! - FIFO：请求按到达顺序下发，永不重排、永不丢弃
//! - 每次下发（包括排队后补发的）都刷新间隔基准——补发不豁免

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::trace;
use washlink_bus::FieldRequest;

/// 排队中的请求，连同入队时刻（只存在于节拍器队列里）
#[derive(Debug)]
struct PendingRequest {
    request: FieldRequest,
    submitted_at: Instant,
}

/// 节拍器状态
#[derive(Debug)]
pub struct PacerState {
    queue: VecDeque<PendingRequest>,
    last_dispatch: Option<Instant>,
    min_spacing: Duration,
}

impl PacerState {
    pub fn new(min_spacing: Duration) -> Self {
        PacerState {
            queue: VecDeque::new(),
            last_dispatch: None,
            min_spacing,
        }
    }

    /// 距上次下发的间隔已满足
    fn gap_elapsed(&self, now: Instant) -> bool {
        match self.last_dispatch {
            None => true,
            // 与 next_deadline 对齐：恰好到点即视为满足
            Some(last) => now.saturating_duration_since(last) >= self.min_spacing,
        }
    }

    /// 提交一个请求
    ///
    /// 队列为空且间隔已满足时立即放行（返回该请求，调用方负责发送，
    /// 下发时刻按 `now` 记账）；否则入队，由后续 [`pop_due`](Self::pop_due)
    /// 按节拍补发。
    pub fn offer(&mut self, request: FieldRequest, now: Instant) -> Option<FieldRequest> {
        if self.queue.is_empty() && self.gap_elapsed(now) {
            self.last_dispatch = Some(now);
            return Some(request);
        }
        self.queue.push_back(PendingRequest {
            request,
            submitted_at: now,
        });
        None
    }

    /// 取出一个到期的排队请求
    ///
    /// 队列非空且间隔已满足时弹出队首并刷新间隔基准；一次调用至多
    /// 放行一个请求。
    pub fn pop_due(&mut self, now: Instant) -> Option<FieldRequest> {
        if self.queue.is_empty() || !self.gap_elapsed(now) {
            return None;
        }
        self.last_dispatch = Some(now);
        let pending = self.queue.pop_front()?;
        trace!(
            field = %pending.request.field,
            queued_ms = now.saturating_duration_since(pending.submitted_at).as_millis() as u64,
            "releasing queued request"
        );
        Some(pending.request)
    }

    /// 下一个补发时刻（队列为空时无定时需求）
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.queue.is_empty() {
            return None;
        }
        // 队列非空而从未下发过的情况只在构造后的首个请求前出现
        Some(match self.last_dispatch {
            Some(last) => last + self.min_spacing,
            None => Instant::now(),
        })
    }

    /// 队列中是否有未下发的请求
    pub fn has_queued(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}
