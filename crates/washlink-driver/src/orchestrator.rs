//! 字段接入编排
//!
//! 会话建立后每个字段走同一条生命周期：先读一次拿到当前值，读
//! 结清后订阅变更通知，首个通知到达后进入常态。每个字段一只
//! 可重臂的计时器：读下发时臂起、读结清时清除、订阅下发时再次
//! 臂起、首个通知清除。计时器到期只产生一次超时报告。
//!
//! 就绪门槛是一个倒数计数：字段数 + 1（建连步骤本身）。每个字段
//! 恰好结清一次——读响应、首个通知、计时器到期，先到者为准，
//! 后到者不再计数。计数归零的那一刻会话就绪。
//!
//! 纯状态机：时间由调用方注入，真正的发送、定时器和事件分发都在
//! 会话线程里。

use smallvec::SmallVec;
use std::time::{Duration, Instant};
use washlink_bus::{FieldRequest, RequestOp};
use washlink_protocol::FieldId;

/// 单个字段的接入阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// 首轮读已入队，等待节拍器放行
    AwaitingReadDispatch,
    /// 读已下发，计时中
    ReadInFlight,
    /// 读已结清，订阅已入队
    AwaitingSubscribeDispatch,
    /// 订阅已下发，等待首个通知
    SubscribeInFlight,
    /// 接入完成
    Live,
}

#[derive(Debug)]
struct FieldTracker {
    field: FieldId,
    phase: Phase,
    deadline: Option<Instant>,
    settled: bool,
}

/// 超时发生在生命周期的哪个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Read,
    Subscribe,
}

/// 处理一个输入后要求会话执行的动作
#[derive(Debug, Default)]
pub struct Outcome {
    /// 需要入队的后续请求
    pub follow_up: Option<FieldRequest>,
    /// 本次输入首次结清了该字段
    pub settled_now: bool,
    /// 就绪计数恰好在本次输入上归零
    pub all_settled: bool,
}

/// 超时扫描的单项结果
#[derive(Debug)]
pub struct Expiry {
    pub field: FieldId,
    pub kind: TimeoutKind,
    pub settled_now: bool,
    pub all_settled: bool,
    pub follow_up: Option<FieldRequest>,
}

/// 编排器状态
#[derive(Debug)]
pub struct OrchestratorState {
    trackers: Vec<FieldTracker>,
    /// 未结清计数 = 未结清字段数 + 建连步骤（0 或 1）
    pending: usize,
    setup_settled: bool,
    request_timeout: Duration,
}

impl OrchestratorState {
    /// 按接入顺序创建编排器，返回首轮读请求
    pub fn begin(order: &[FieldId], request_timeout: Duration) -> (Self, Vec<FieldRequest>) {
        let trackers = order
            .iter()
            .map(|&field| FieldTracker {
                field,
                phase: Phase::AwaitingReadDispatch,
                deadline: None,
                settled: false,
            })
            .collect();
        let reads = order.iter().map(|&f| FieldRequest::read(f)).collect();
        (
            OrchestratorState {
                trackers,
                pending: order.len() + 1,
                setup_settled: false,
                request_timeout,
            },
            reads,
        )
    }

    /// 建连步骤完成（首轮请求已全部入队）
    pub fn setup_complete(&mut self) -> Outcome {
        let mut outcome = Outcome::default();
        if !self.setup_settled {
            self.setup_settled = true;
            self.pending -= 1;
            outcome.settled_now = true;
            outcome.all_settled = self.pending == 0;
        }
        outcome
    }

    fn index_of(&self, field: FieldId) -> Option<usize> {
        self.trackers.iter().position(|t| t.field == field)
    }

    /// 节拍器放行了一个请求（会话即将实际发送）
    ///
    /// 只有接入生命周期内的读/订阅会臂起计时器；刷新读、保活读和
    /// 外部命令的下发不经过任何字段计时。
    pub fn on_dispatched(&mut self, field: FieldId, op: &RequestOp, now: Instant) {
        let timeout = self.request_timeout;
        let Some(i) = self.index_of(field) else { return };
        let t = &mut self.trackers[i];
        match op {
            RequestOp::Read if t.phase == Phase::AwaitingReadDispatch => {
                t.phase = Phase::ReadInFlight;
                t.deadline = Some(now + timeout);
            }
            RequestOp::Subscribe if t.phase == Phase::AwaitingSubscribeDispatch => {
                t.phase = Phase::SubscribeInFlight;
                t.deadline = Some(now + timeout);
            }
            _ => {}
        }
    }

    /// 收到读响应
    ///
    /// 首轮读的响应结清读阶段并跟进订阅；迟到的响应（读阶段已因
    /// 超时结清）和刷新读的响应不再触动生命周期——结清只发生一次。
    pub fn on_read_reply(&mut self, field: FieldId) -> Outcome {
        let Some(i) = self.index_of(field) else {
            return Outcome::default();
        };
        let mut outcome = Outcome::default();
        {
            let t = &mut self.trackers[i];
            if !matches!(t.phase, Phase::AwaitingReadDispatch | Phase::ReadInFlight) {
                return outcome;
            }
            t.deadline = None;
            t.phase = Phase::AwaitingSubscribeDispatch;
            outcome.follow_up = Some(FieldRequest::subscribe(field));
            if !t.settled {
                t.settled = true;
                outcome.settled_now = true;
            }
        }
        if outcome.settled_now {
            self.pending -= 1;
            outcome.all_settled = self.pending == 0;
        }
        outcome
    }

    /// 收到变更通知
    pub fn on_notification(&mut self, field: FieldId) -> Outcome {
        let Some(i) = self.index_of(field) else {
            return Outcome::default();
        };
        let mut outcome = Outcome::default();
        {
            let t = &mut self.trackers[i];
            if t.phase == Phase::SubscribeInFlight {
                t.deadline = None;
                t.phase = Phase::Live;
            }
            if !t.settled {
                t.settled = true;
                outcome.settled_now = true;
            }
        }
        if outcome.settled_now {
            self.pending -= 1;
            outcome.all_settled = self.pending == 0;
        }
        outcome
    }

    /// 扫描到期的字段计时器
    ///
    /// 读阶段到期：报告读超时、结清（若尚未结清）、照常跟进订阅。
    /// 订阅阶段到期：报告订阅超时、就绪计数不变（读阶段已结清）、
    /// 字段转入常态——订阅可能静默成功，后续通知照常接收。
    pub fn on_deadline(&mut self, now: Instant) -> SmallVec<[Expiry; 4]> {
        let mut out = SmallVec::new();
        for i in 0..self.trackers.len() {
            let field;
            let kind;
            let follow_up;
            let settled_now;
            {
                let t = &mut self.trackers[i];
                let Some(d) = t.deadline else { continue };
                if now < d {
                    continue;
                }
                t.deadline = None;
                field = t.field;
                match t.phase {
                    Phase::ReadInFlight => {
                        kind = TimeoutKind::Read;
                        t.phase = Phase::AwaitingSubscribeDispatch;
                        follow_up = Some(FieldRequest::subscribe(field));
                    }
                    Phase::SubscribeInFlight => {
                        kind = TimeoutKind::Subscribe;
                        t.phase = Phase::Live;
                        follow_up = None;
                    }
                    _ => continue,
                }
                settled_now = if !t.settled {
                    t.settled = true;
                    true
                } else {
                    false
                };
            }
            if settled_now {
                self.pending -= 1;
            }
            out.push(Expiry {
                field,
                kind,
                settled_now,
                all_settled: settled_now && self.pending == 0,
                follow_up,
            });
        }
        out
    }

    /// 最近的字段计时器到期时刻
    pub fn next_deadline(&self) -> Option<Instant> {
        self.trackers.iter().filter_map(|t| t.deadline).min()
    }

    /// 就绪计数已归零
    pub fn is_ready(&self) -> bool {
        self.pending == 0
    }

    /// 剩余未结清计数
    pub fn pending(&self) -> usize {
        self.pending
    }
}
