//! 会话线程
//!
//! 一台家电一个会话，两条线程：
//!
//! - RX 泵线程：阻塞在总线接收上，把事件转发进会话通道
//! - 会话线程：单一 `select` 循环，串起节拍器、编排器、命令处理
//!   和事件分发；所有定时（下发节拍、字段计时器、周期刷新、保活）
//!   折算成同一个 select 超时，不另开定时器线程
//!
//! 探测规则：设备通告后先经节拍器读一次运行模式，值为 11 的是
//! 总线偶发的占位设备，拒绝并等待下一个通告；其余值视为真机，
//! 随即按配置顺序接入全部字段。

use crate::command::SessionCommand;
use crate::config::SessionConfig;
use crate::error::DriverError;
use crate::event::{FieldSample, TelemetryEvent};
use crate::orchestrator::{OrchestratorState, TimeoutKind};
use crate::pacer::PacerState;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, trace, warn};
use washlink_bus::{BusError, BusEvent, DeviceInfo, FieldRequest, RequestOp, RxBus, SplittableBus, TxBus};
use washlink_protocol::{codec, FieldId, RawValue};

/// 会话缓存的字段槽位数
const FIELD_SLOTS: usize = FieldId::ALL.len();

/// RX 泵检查退出标志的周期
const PUMP_TICK: Duration = Duration::from_millis(100);

/// 无定时需求时的空转唤醒周期（用于退出标志轮询）
const IDLE_TICK: Duration = Duration::from_millis(500);

// ============================================================================
// 统计计数
// ============================================================================

/// 会话统计（原子计数器，任意线程可读）
#[derive(Debug, Default)]
pub struct SessionStats {
    pub reads_dispatched: AtomicU64,
    pub writes_dispatched: AtomicU64,
    pub subscribes_dispatched: AtomicU64,
    pub replies_received: AtomicU64,
    pub notifications_received: AtomicU64,
    pub timeouts: AtomicU64,
    pub decode_failures: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatsSnapshot {
    pub reads_dispatched: u64,
    pub writes_dispatched: u64,
    pub subscribes_dispatched: u64,
    pub replies_received: u64,
    pub notifications_received: u64,
    pub timeouts: u64,
    pub decode_failures: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            reads_dispatched: self.reads_dispatched.load(Ordering::Relaxed),
            writes_dispatched: self.writes_dispatched.load(Ordering::Relaxed),
            subscribes_dispatched: self.subscribes_dispatched.load(Ordering::Relaxed),
            replies_received: self.replies_received.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// 共享上下文
// ============================================================================

/// 会话共享状态（无锁快照）
pub struct SessionContext {
    latest: [ArcSwapOption<FieldSample>; FIELD_SLOTS],
    device: ArcSwapOption<DeviceInfo>,
    ready: AtomicBool,
    stats: SessionStats,
}

impl SessionContext {
    fn new() -> Self {
        SessionContext {
            latest: std::array::from_fn(|_| ArcSwapOption::empty()),
            device: ArcSwapOption::empty(),
            ready: AtomicBool::new(false),
            stats: SessionStats::default(),
        }
    }

    fn store_sample(&self, sample: FieldSample) {
        let slot = sample.field.index();
        self.latest[slot].store(Some(Arc::new(sample)));
    }

    pub fn sample(&self, field: FieldId) -> Option<Arc<FieldSample>> {
        self.latest[field.index()].load_full()
    }

    pub fn device(&self) -> Option<DeviceInfo> {
        self.device.load_full().map(|d| *d)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

// ============================================================================
// 对外会话句柄
// ============================================================================

/// 带超时的线程 join
///
/// 会话收尾不能被一条卡死的工作线程拖住；等不到就放弃。
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        // 看门狗线程代为 join，超时后放弃等待（进程退出时由 OS 清理）
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "session worker did not exit within the join deadline",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "session worker panicked before it could be joined",
            ))),
        }
    }
}

/// 家电遥测会话（对外 API）
///
/// 创建即启动：RX 泵与会话线程随构造拉起，Drop 时先关命令通道再
/// 依次 join。句柄方法全部非阻塞；需要等响应的封装在上层客户端。
pub struct ApplianceSession {
    /// 命令通道发送端
    ///
    /// Drop 时必须在 join 之前真正关闭，否则会话线程可能收不到
    /// `Disconnected` 而卡住退出。
    cmd_tx: ManuallyDrop<Sender<SessionCommand>>,
    ctx: Arc<SessionContext>,
    session_thread: Option<JoinHandle<()>>,
    rx_thread: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl ApplianceSession {
    /// 在给定总线上启动会话
    pub fn new<B>(bus: B, config: SessionConfig) -> Result<Self, DriverError>
    where
        B: SplittableBus,
        B::Rx: 'static,
        B::Tx: 'static,
    {
        let (rx, tx) = bus.split()?;
        let (cmd_tx, cmd_rx) = unbounded();
        let (bus_event_tx, bus_event_rx) = unbounded();
        let ctx = Arc::new(SessionContext::new());
        let is_running = Arc::new(AtomicBool::new(true));

        let pump_running = is_running.clone();
        let rx_thread = std::thread::Builder::new()
            .name("washlink-rx".into())
            .spawn(move || rx_pump(rx, bus_event_tx, pump_running))
            .map_err(|e| DriverError::SessionThread(e.to_string()))?;

        let loop_ctx = ctx.clone();
        let loop_running = is_running.clone();
        let session_thread = std::thread::Builder::new()
            .name("washlink-session".into())
            .spawn(move || {
                SessionLoop::new(tx, loop_ctx, config).run(bus_event_rx, cmd_rx, loop_running);
            })
            .map_err(|e| DriverError::SessionThread(e.to_string()))?;

        Ok(ApplianceSession {
            cmd_tx: ManuallyDrop::new(cmd_tx),
            ctx,
            session_thread: Some(session_thread),
            rx_thread: Some(rx_thread),
            is_running,
        })
    }

    /// 链式构造入口
    pub fn builder() -> crate::builder::SessionBuilder {
        crate::builder::SessionBuilder::new()
    }

    fn send_command(&self, cmd: SessionCommand) -> Result<(), DriverError> {
        self.cmd_tx.send(cmd).map_err(|_| DriverError::ChannelClosed)
    }

    /// 请求读一个字段（响应走事件流，经节拍器排队）
    pub fn read(&self, field: FieldId) -> Result<(), DriverError> {
        self.send_command(SessionCommand::Read(field))
    }

    /// 写一个字段（值须已编码；编码校验在协议层）
    pub fn write(&self, field: FieldId, value: RawValue) -> Result<(), DriverError> {
        self.send_command(SessionCommand::Write(field, value))
    }

    /// 挂载事件订阅者
    ///
    /// 晚到的订阅者会立即补收 `ApplianceSelected`/`SessionReady`
    /// （若会话已跨过相应阶段），不会错过建连状态。
    pub fn subscribe(&self) -> Result<Receiver<TelemetryEvent>, DriverError> {
        let (tx, rx) = unbounded();
        self.send_command(SessionCommand::Subscribe(tx))?;
        Ok(rx)
    }

    /// 立即触发一轮全量读
    pub fn refresh_now(&self) -> Result<(), DriverError> {
        self.send_command(SessionCommand::RefreshNow)
    }

    /// 字段的最新样本（无锁读取）
    pub fn get_sample(&self, field: FieldId) -> Option<Arc<FieldSample>> {
        self.ctx.sample(field)
    }

    /// 全部已有样本，注册表顺序
    pub fn get_all_samples(&self) -> Vec<Arc<FieldSample>> {
        FieldId::ALL
            .iter()
            .filter_map(|&f| self.ctx.sample(f))
            .collect()
    }

    /// 会话绑定的设备信息
    pub fn get_device(&self) -> Option<DeviceInfo> {
        self.ctx.device()
    }

    /// 全部字段是否已结清
    pub fn is_ready(&self) -> bool {
        self.ctx.is_ready()
    }

    /// 统计快照
    pub fn get_stats(&self) -> SessionStatsSnapshot {
        self.ctx.stats().snapshot()
    }
}

impl Drop for ApplianceSession {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        // 先关命令通道再 join，保证会话线程能观察到 Disconnected
        unsafe {
            ManuallyDrop::drop(&mut self.cmd_tx);
        }

        let join_timeout = Duration::from_secs(2);

        if let Some(handle) = self.session_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "session thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }

        if let Some(handle) = self.rx_thread.take()
            && handle.join_timeout(join_timeout).is_err()
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}

// ============================================================================
// RX 泵
// ============================================================================

fn rx_pump<R: RxBus>(mut rx: R, forward: Sender<BusEvent>, is_running: Arc<AtomicBool>) {
    loop {
        if !is_running.load(Ordering::Acquire) {
            break;
        }
        match rx.receive_timeout(PUMP_TICK) {
            Ok(event) => {
                if forward.send(event).is_err() {
                    break;
                }
            }
            Err(BusError::Timeout) => continue,
            Err(e) if e.is_fatal() => {
                error!("bus receive failed: {e}");
                break;
            }
            Err(e) => {
                warn!("bus receive error: {e}");
            }
        }
    }
    debug!("RX pump exiting");
    // forward 在此丢弃，会话线程随即观察到总线侧断开
}

// ============================================================================
// 会话循环
// ============================================================================

struct SessionLoop<T: TxBus> {
    tx: T,
    ctx: Arc<SessionContext>,
    config: SessionConfig,
    pacer: PacerState,
    orch: Option<OrchestratorState>,
    adopted: Option<DeviceInfo>,
    /// 正在探测的设备及探测截止时刻
    probing: Option<(DeviceInfo, Instant)>,
    /// 探测排队中的后续通告
    pending_announcements: VecDeque<DeviceInfo>,
    subscribers: Vec<Sender<TelemetryEvent>>,
    next_refresh: Option<Instant>,
    next_keep_alive: Option<Instant>,
    /// 循环退出原因（总线故障时由 dispatch 设置）
    closed_reason: Option<String>,
}

impl<T: TxBus> SessionLoop<T> {
    fn new(tx: T, ctx: Arc<SessionContext>, config: SessionConfig) -> Self {
        let pacer = PacerState::new(config.min_spacing());
        SessionLoop {
            tx,
            ctx,
            config,
            pacer,
            orch: None,
            adopted: None,
            probing: None,
            pending_announcements: VecDeque::new(),
            subscribers: Vec::new(),
            next_refresh: None,
            next_keep_alive: None,
            closed_reason: None,
        }
    }

    fn run(
        mut self,
        events: Receiver<BusEvent>,
        commands: Receiver<SessionCommand>,
        is_running: Arc<AtomicBool>,
    ) {
        info!(
            min_spacing_ms = self.config.min_spacing_ms,
            request_timeout_ms = self.config.request_timeout_ms,
            "session loop started"
        );
        loop {
            if !is_running.load(Ordering::Acquire) {
                self.finish("session stopped", &is_running);
                return;
            }
            let timeout = self.select_timeout();
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => {
                        if !self.handle_bus_event(event) {
                            let reason = self.closed_reason.take().unwrap_or_else(|| "bus send failed".to_string());
                            self.finish(&reason, &is_running);
                            return;
                        }
                    }
                    Err(_) => {
                        self.finish("bus disconnected", &is_running);
                        return;
                    }
                },
                recv(commands) -> msg => match msg {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            let reason = self.closed_reason.take().unwrap_or_else(|| "session shut down".to_string());
                            self.finish(&reason, &is_running);
                            return;
                        }
                    }
                    Err(_) => {
                        self.finish("all session handles dropped", &is_running);
                        return;
                    }
                },
                default(timeout) => {
                    if !self.handle_tick(Instant::now()) {
                        let reason = self.closed_reason.take().unwrap_or_else(|| "bus send failed".to_string());
                        self.finish(&reason, &is_running);
                        return;
                    }
                }
            }
        }
    }

    /// 把全部定时需求折算成一个 select 超时
    fn select_timeout(&self) -> Duration {
        let mut deadline: Option<Instant> = None;
        let mut merge = |d: Option<Instant>| {
            if let Some(t) = d {
                deadline = Some(deadline.map_or(t, |cur| cur.min(t)));
            }
        };
        merge(self.pacer.next_deadline());
        merge(self.orch.as_ref().and_then(OrchestratorState::next_deadline));
        merge(self.probing.map(|(_, at)| at));
        merge(self.next_refresh);
        merge(self.next_keep_alive);
        match deadline {
            Some(d) => d.saturating_duration_since(Instant::now()),
            None => IDLE_TICK,
        }
    }

    fn emit(&mut self, event: TelemetryEvent) {
        self.subscribers.retain(|s| s.send(event.clone()).is_ok());
    }

    /// 提交请求：节拍器放行则立即发送，否则排队等补发
    fn enqueue(&mut self, request: FieldRequest, now: Instant) -> bool {
        match self.pacer.offer(request, now) {
            Some(due) => self.dispatch(due, now),
            None => true,
        }
    }

    /// 实际发送一个已放行的请求
    fn dispatch(&mut self, request: FieldRequest, now: Instant) -> bool {
        if let Some(orch) = &mut self.orch {
            orch.on_dispatched(request.field, &request.op, now);
        }
        let counter = match request.op {
            RequestOp::Read => &self.ctx.stats.reads_dispatched,
            RequestOp::Write(_) => &self.ctx.stats.writes_dispatched,
            RequestOp::Subscribe => &self.ctx.stats.subscribes_dispatched,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        trace!(field = %request.field, op = request.op_name(), "dispatching request");
        if let Err(e) = self.tx.send(request) {
            error!("bus send failed: {e}");
            self.closed_reason = Some(format!("bus send failed: {e}"));
            return false;
        }
        true
    }

    fn handle_bus_event(&mut self, event: BusEvent) -> bool {
        let now = Instant::now();
        match event {
            BusEvent::Announced(info) => self.handle_announcement(info, now),
            BusEvent::ReadReply { field, value } => {
                self.ctx.stats.replies_received.fetch_add(1, Ordering::Relaxed);
                // 探测期间的运行模式读响应由探测逻辑独占
                if self.adopted.is_none()
                    && field == FieldId::OperatingMode
                    && self.probing.is_some()
                {
                    return self.resolve_probe(value, now);
                }
                self.process_value(field, value, false, now)
            }
            BusEvent::FieldChanged { field, value } => {
                self.ctx
                    .stats
                    .notifications_received
                    .fetch_add(1, Ordering::Relaxed);
                self.process_value(field, value, true, now)
            }
        }
    }

    fn handle_announcement(&mut self, info: DeviceInfo, now: Instant) -> bool {
        debug!(
            address = %info.address_text(),
            version = %info.version_text(),
            "appliance announced"
        );
        self.emit(TelemetryEvent::ApplianceAnnounced { info });
        if self.adopted.is_some() {
            debug!("ignoring announcement, session already bound");
            return true;
        }
        if self.probing.is_some() {
            self.pending_announcements.push_back(info);
            return true;
        }
        self.start_probe(info, now)
    }

    fn start_probe(&mut self, info: DeviceInfo, now: Instant) -> bool {
        debug!(address = %info.address_text(), "probing announced appliance");
        self.probing = Some((info, now + self.config.request_timeout()));
        self.enqueue(FieldRequest::read(FieldId::OperatingMode), now)
    }

    fn resolve_probe(&mut self, value: RawValue, now: Instant) -> bool {
        let Some((info, _)) = self.probing.take() else {
            return true;
        };
        match value.as_integer() {
            Some(11) => {
                warn!(
                    address = %info.address_text(),
                    "probe returned invalid-connection sentinel, rejecting appliance"
                );
                self.emit(TelemetryEvent::ApplianceRejected { info, mode: 11 });
                self.probe_next_pending(now)
            }
            _ => self.adopt(info, now),
        }
    }

    fn probe_next_pending(&mut self, now: Instant) -> bool {
        match self.pending_announcements.pop_front() {
            Some(next) => self.start_probe(next, now),
            None => true,
        }
    }

    fn adopt(&mut self, info: DeviceInfo, now: Instant) -> bool {
        info!(
            address = %info.address_text(),
            version = %info.version_text(),
            "appliance selected"
        );
        self.adopted = Some(info);
        self.ctx.device.store(Some(Arc::new(info)));
        self.emit(TelemetryEvent::ApplianceSelected { info });

        let (orch, reads) = OrchestratorState::begin(
            &self.config.adoption_order,
            self.config.request_timeout(),
        );
        self.orch = Some(orch);
        for request in reads {
            if !self.enqueue(request, now) {
                return false;
            }
        }
        let outcome = match &mut self.orch {
            Some(orch) => orch.setup_complete(),
            None => return true,
        };
        if outcome.all_settled {
            self.mark_ready();
        }
        if let Some(interval) = self.config.refresh_interval() {
            self.next_refresh = Some(now + interval);
        }
        if let Some(interval) = self.config.keep_alive() {
            self.next_keep_alive = Some(now + interval);
        }
        true
    }

    fn mark_ready(&mut self) {
        self.ctx.ready.store(true, Ordering::Release);
        info!("all fields settled, session ready");
        self.emit(TelemetryEvent::SessionReady);
    }

    /// 解码入站值、更新缓存、推进接入生命周期
    fn process_value(
        &mut self,
        field: FieldId,
        raw: RawValue,
        is_notification: bool,
        now: Instant,
    ) -> bool {
        let outcome = match &mut self.orch {
            Some(orch) if is_notification => orch.on_notification(field),
            Some(orch) => orch.on_read_reply(field),
            None => Default::default(),
        };
        match codec::decode(field, &raw) {
            Ok(record) => {
                self.ctx.store_sample(FieldSample {
                    field,
                    record: record.clone(),
                    raw: raw.clone(),
                    received_at: SystemTime::now(),
                });
                let event = if is_notification {
                    TelemetryEvent::FieldChanged { field, record, raw }
                } else {
                    TelemetryEvent::FieldRead { field, record, raw }
                };
                self.emit(event);
            }
            Err(error) => {
                self.ctx.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                warn!(field = %field, %error, "failed to decode field value");
                self.emit(TelemetryEvent::DecodeFailed { field, error });
            }
        }
        if let Some(request) = outcome.follow_up
            && !self.enqueue(request, now)
        {
            return false;
        }
        if outcome.all_settled {
            self.mark_ready();
        }
        true
    }

    fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        let now = Instant::now();
        match cmd {
            SessionCommand::Read(field) => self.enqueue(FieldRequest::read(field), now),
            SessionCommand::Write(field, value) => {
                self.enqueue(FieldRequest::write(field, value), now)
            }
            SessionCommand::Subscribe(sender) => {
                // 补发关键状态，晚到的订阅者不错过建连事件
                if let Some(info) = self.adopted {
                    let _ = sender.send(TelemetryEvent::ApplianceSelected { info });
                }
                if self.ctx.is_ready() {
                    let _ = sender.send(TelemetryEvent::SessionReady);
                }
                self.subscribers.push(sender);
                true
            }
            SessionCommand::RefreshNow => self.run_refresh(now, true),
            SessionCommand::Shutdown => false,
        }
    }

    fn handle_tick(&mut self, now: Instant) -> bool {
        // 节拍器补发
        while let Some(request) = self.pacer.pop_due(now) {
            if !self.dispatch(request, now) {
                return false;
            }
        }

        // 字段计时器
        let expiries = match &mut self.orch {
            Some(orch) => orch.on_deadline(now),
            None => SmallVec::new(),
        };
        for expiry in expiries {
            self.ctx.stats.timeouts.fetch_add(1, Ordering::Relaxed);
            warn!(field = %expiry.field, "timed out waiting for response");
            let event = match expiry.kind {
                TimeoutKind::Read => TelemetryEvent::ReadTimedOut {
                    field: expiry.field,
                },
                TimeoutKind::Subscribe => TelemetryEvent::SubscribeTimedOut {
                    field: expiry.field,
                },
            };
            self.emit(event);
            if let Some(request) = expiry.follow_up
                && !self.enqueue(request, now)
            {
                return false;
            }
            if expiry.all_settled {
                self.mark_ready();
            }
        }

        // 探测超时：放掉当前候选，轮到下一个通告
        if let Some((info, deadline)) = self.probing
            && now >= deadline
        {
            warn!(
                address = %info.address_text(),
                "timed out waiting for probe response"
            );
            self.probing = None;
            if !self.probe_next_pending(now) {
                return false;
            }
        }

        // 周期全量刷新
        if let Some(at) = self.next_refresh
            && now >= at
        {
            if let Some(interval) = self.config.refresh_interval() {
                self.next_refresh = Some(now + interval);
            }
            if !self.run_refresh(now, false) {
                return false;
            }
        }

        // 保活读
        if let Some(at) = self.next_keep_alive
            && now >= at
        {
            if let Some(interval) = self.config.keep_alive() {
                self.next_keep_alive = Some(now + interval);
            }
            if self.adopted.is_some()
                && !self.enqueue(FieldRequest::read(FieldId::DoorCount), now)
            {
                return false;
            }
        }

        true
    }

    /// 一轮全量读。常规轮在队列非空时整轮跳过，避免在家电侧
    /// 堆积请求；`forced`（外部命令）不受此限。
    fn run_refresh(&mut self, now: Instant, forced: bool) -> bool {
        if self.adopted.is_none() {
            return true;
        }
        if !forced && self.pacer.has_queued() {
            debug!(
                queued = self.pacer.queue_len(),
                "skipping refresh round, dispatch queue busy"
            );
            return true;
        }
        debug!("refreshing all fields");
        let fields: Vec<FieldId> = self.config.adoption_order.clone();
        for field in fields {
            if !self.enqueue(FieldRequest::read(field), now) {
                return false;
            }
        }
        true
    }

    fn finish(&mut self, reason: &str, is_running: &AtomicBool) {
        info!(reason, "session closed");
        self.emit(TelemetryEvent::SessionClosed {
            reason: reason.to_string(),
        });
        is_running.store(false, Ordering::Release);
    }
}

// ============================================================================
// 测试
// ============================================================================
