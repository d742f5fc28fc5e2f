//! 模拟洗碗机后端
//!
//! 两个层次：
//!
//! - [`MockBus`] / [`MockBusController`]：可脚本化的总线对，控制端
//!   精确注入事件、检查请求，用于驱动层的确定性测试。
//! - [`SimulatedDishwasher`]：线程驱动的整机模拟，带字段状态表、
//!   读响应、订阅通知和设备通告时序，应用在无硬件环境下跑完整
//!   会话。可配置先通告一台探测返回 11 的占位设备，复现真实
//!   总线的已知怪癖。

use crate::{
    ApplianceBus, BusError, BusEvent, DeviceInfo, FieldRequest, RequestOp, RxBus, SplittableBus,
    TxBus,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use rand::Rng;
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use washlink_protocol::{FieldId, RawValue};

// ============================================================================
// 可脚本化总线对
// ============================================================================

/// 通道背书的总线适配器，与 [`MockBusController`] 成对创建
pub struct MockBus {
    events: Receiver<BusEvent>,
    requests: Sender<FieldRequest>,
    receive_timeout: Duration,
}

/// [`MockBus`] 的控制端：注入事件、取出请求
pub struct MockBusController {
    events: Sender<BusEvent>,
    requests: Receiver<FieldRequest>,
}

/// 创建一对相互连接的总线与控制端
pub fn pair() -> (MockBus, MockBusController) {
    let (event_tx, event_rx) = unbounded();
    let (request_tx, request_rx) = unbounded();
    (
        MockBus {
            events: event_rx,
            requests: request_tx,
            receive_timeout: Duration::from_secs(1),
        },
        MockBusController {
            events: event_tx,
            requests: request_rx,
        },
    )
}

impl ApplianceBus for MockBus {
    fn send(&mut self, request: FieldRequest) -> Result<(), BusError> {
        self.requests
            .send(request)
            .map_err(|_| BusError::Disconnected)
    }

    fn receive(&mut self) -> Result<BusEvent, BusError> {
        match self.events.recv_timeout(self.receive_timeout) {
            Ok(event) => Ok(event),
            Err(RecvTimeoutError::Timeout) => Err(BusError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Disconnected),
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }

    fn try_receive(&mut self) -> Result<Option<BusEvent>, BusError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BusError::Disconnected),
        }
    }
}

/// [`MockBus`] 的接收半边
pub struct MockRxBus {
    events: Receiver<BusEvent>,
}

/// [`MockBus`] 的发送半边
pub struct MockTxBus {
    requests: Sender<FieldRequest>,
}

impl RxBus for MockRxBus {
    fn receive(&mut self) -> Result<BusEvent, BusError> {
        self.events.recv().map_err(|_| BusError::Disconnected)
    }

    fn receive_timeout(&mut self, timeout: Duration) -> Result<BusEvent, BusError> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(event),
            Err(RecvTimeoutError::Timeout) => Err(BusError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Disconnected),
        }
    }
}

impl TxBus for MockTxBus {
    fn send(&mut self, request: FieldRequest) -> Result<(), BusError> {
        self.requests
            .send(request)
            .map_err(|_| BusError::Disconnected)
    }
}

impl SplittableBus for MockBus {
    type Rx = MockRxBus;
    type Tx = MockTxBus;

    fn split(self) -> Result<(MockRxBus, MockTxBus), BusError> {
        Ok((
            MockRxBus {
                events: self.events,
            },
            MockTxBus {
                requests: self.requests,
            },
        ))
    }
}

impl MockBusController {
    /// 注入设备通告，返回对端是否仍然存活
    pub fn announce(&self, info: DeviceInfo) -> bool {
        self.events.send(BusEvent::Announced(info)).is_ok()
    }

    /// 注入读响应
    pub fn push_read_reply(&self, field: FieldId, value: RawValue) -> bool {
        self.events
            .send(BusEvent::ReadReply { field, value })
            .is_ok()
    }

    /// 注入变更通知
    pub fn push_change(&self, field: FieldId, value: RawValue) -> bool {
        self.events
            .send(BusEvent::FieldChanged { field, value })
            .is_ok()
    }

    /// 取下一个请求，超时返回 None
    pub fn next_request(&self, timeout: Duration) -> Option<FieldRequest> {
        self.requests.recv_timeout(timeout).ok()
    }

    /// 非阻塞取请求
    pub fn try_request(&self) -> Option<FieldRequest> {
        self.requests.try_recv().ok()
    }

    /// 取走当前积压的全部请求
    pub fn drain_requests(&self) -> Vec<FieldRequest> {
        let mut out = Vec::new();
        while let Ok(req) = self.requests.try_recv() {
            out.push(req);
        }
        out
    }
}

// ============================================================================
// 整机模拟
// ============================================================================

/// 模拟洗碗机的时序配置
#[derive(Debug, Clone)]
pub struct SimulatorProfile {
    /// 首次设备通告前的延迟
    pub announce_delay: Duration,
    /// 先通告一台探测返回 11 的占位设备
    pub bogus_device_first: bool,
    /// 占位设备之后到真实设备通告的间隔
    pub bogus_retry_delay: Duration,
    /// 高频字段的周期性通知间隔
    pub notify_interval: Duration,
    /// 读响应延迟（模拟家电处理时间）
    pub reply_delay: Duration,
    /// 订阅后立即推送一次当前值
    pub publish_on_subscribe: bool,
}

impl Default for SimulatorProfile {
    fn default() -> Self {
        SimulatorProfile {
            announce_delay: Duration::from_millis(50),
            bogus_device_first: false,
            bogus_retry_delay: Duration::from_millis(200),
            notify_interval: Duration::from_secs(1),
            reply_delay: Duration::from_millis(10),
            publish_on_subscribe: true,
        }
    }
}

/// 模拟洗碗机的外部操控命令
enum SimCommand {
    SetField(FieldId, RawValue),
    OpenDoor,
}

/// 线程驱动的模拟洗碗机
///
/// 持有控制通道：测试或演示可在会话运行中改写字段、开关门。
/// Drop 时结束后台线程。
pub struct SimulatedDishwasher {
    commands: Sender<SimCommand>,
    shutdown: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SimulatedDishwasher {
    /// 启动模拟洗碗机，返回连到它的总线
    pub fn spawn(profile: SimulatorProfile) -> (MockBus, SimulatedDishwasher) {
        let (bus, ctrl) = pair();
        let (command_tx, command_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("washlink-sim".into())
            .spawn(move || run_simulator(profile, ctrl, command_rx, shutdown_rx))
            .ok();
        (
            bus,
            SimulatedDishwasher {
                commands: command_tx,
                shutdown: shutdown_tx,
                handle,
            },
        )
    }

    /// 改写一个字段的当前值（已订阅则同时推送变更通知）
    pub fn set_field(&self, field: FieldId, value: RawValue) -> bool {
        self.commands.send(SimCommand::SetField(field, value)).is_ok()
    }

    /// 开关一次门（门计数 +1）
    pub fn open_door(&self) -> bool {
        self.commands.send(SimCommand::OpenDoor).is_ok()
    }
}

impl Drop for SimulatedDishwasher {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// 真实设备的通告信息
const REAL_DEVICE: DeviceInfo = DeviceInfo {
    address: 0xC4,
    version: [0, 2, 5, 1],
};

/// 占位设备：探测 operatingMode 会返回 11
const BOGUS_DEVICE: DeviceInfo = DeviceInfo {
    address: 0xFF,
    version: [0, 0, 0, 0],
};

/// 即使无变化也周期性上报的字段
const CHATTY_FIELDS: [FieldId; 5] = [
    FieldId::OperatingMode,
    FieldId::CycleState,
    FieldId::CycleStatus,
    FieldId::DoorCount,
    FieldId::AnalogData,
];

/// 全部字段的出厂状态
fn initial_value(field: FieldId) -> RawValue {
    match field {
        FieldId::UserConfiguration => RawValue::bytes(&[0x00, 0xA5, 0x20]),
        FieldId::OperatingMode => RawValue::Integer(2),
        FieldId::CycleState => RawValue::Integer(10),
        FieldId::CycleStatus => RawValue::tuple(&[0, 0, 0, 0, 0]),
        FieldId::DoorCount => RawValue::Integer(42),
        FieldId::CycleData0 => {
            RawValue::tuple(&[210, 105, 152, 141, 89, 3201, 5_300_000, 1, 97])
        }
        FieldId::CycleData1 => {
            RawValue::tuple(&[209, 102, 149, 138, 102, 2987, 5_295_000, 1, 88])
        }
        // 被中断的循环：温度与浊度都停在无数据哨兵上
        FieldId::CycleData2 => RawValue::tuple(&[208, 255, 0, 0, 65535, 0, 5_290_100, 0, 12]),
        FieldId::CycleData3 => {
            RawValue::tuple(&[207, 98, 150, 140, 95, 3405, 5_285_400, 1, 101])
        }
        FieldId::CycleData4 => {
            RawValue::tuple(&[206, 100, 148, 137, 110, 3120, 5_280_000, 1, 93])
        }
        FieldId::Reminders => RawValue::Integer(1),
        FieldId::CycleCounts => RawValue::tuple(&[212, 205, 7]),
        FieldId::Error => RawValue::tuple(&[0, 0]),
        FieldId::Rates => RawValue::tuple(&[48, 12]),
        FieldId::ContinuousCycle => RawValue::tuple(&[0, 0]),
        FieldId::AnalogData => RawValue::bytes(&[0x00, 0x12, 0x05, 0x7F, 0x33, 0x00, 0x68]),
        FieldId::DryDrainCounters => RawValue::tuple(&[0, 3]),
        FieldId::Personality => RawValue::tuple(&[4, 1]),
        FieldId::DisabledFeatures => RawValue::Integer(0),
        FieldId::ControlLock => RawValue::Integer(0xAA),
    }
}

fn run_simulator(
    profile: SimulatorProfile,
    ctrl: MockBusController,
    commands: Receiver<SimCommand>,
    shutdown: Receiver<()>,
) {
    let mut table: HashMap<FieldId, RawValue> = FieldId::ALL
        .iter()
        .map(|&f| (f, initial_value(f)))
        .collect();
    let mut subscribed: Vec<FieldId> = Vec::new();
    let mut rng = rand::thread_rng();

    let started = Instant::now();
    let mut bogus_live = false;
    let mut real_live = false;
    let mut announce_at = Some(started + profile.announce_delay);
    let mut real_announce_at: Option<Instant> = None;
    let mut next_notify: Option<Instant> = None;

    loop {
        let mut deadline: Option<Instant> = None;
        for t in [announce_at, real_announce_at, next_notify].into_iter().flatten() {
            deadline = Some(deadline.map_or(t, |d: Instant| d.min(t)));
        }
        let timeout = deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));

        crossbeam_channel::select! {
            recv(shutdown) -> _ => {
                debug!("simulator shutting down");
                return;
            }
            recv(commands) -> msg => {
                let Ok(cmd) = msg else { return };
                match cmd {
                    SimCommand::SetField(field, value) => {
                        table.insert(field, value.clone());
                        if real_live && subscribed.contains(&field) {
                            if !ctrl.push_change(field, value) {
                                return;
                            }
                        }
                    }
                    SimCommand::OpenDoor => {
                        let count = table
                            .get(&FieldId::DoorCount)
                            .and_then(RawValue::as_integer)
                            .unwrap_or(0)
                            .wrapping_add(1);
                        table.insert(FieldId::DoorCount, RawValue::Integer(count));
                        if real_live && subscribed.contains(&FieldId::DoorCount) {
                            if !ctrl.push_change(FieldId::DoorCount, RawValue::Integer(count)) {
                                return;
                            }
                        }
                    }
                }
            }
            recv(ctrl.requests) -> msg => {
                let Ok(req) = msg else { return };
                trace!(field = %req.field, op = req.op_name(), "simulator request");
                if !profile.reply_delay.is_zero() {
                    thread::sleep(profile.reply_delay);
                }
                // 占位设备阶段：任何读都回无效连接哨兵
                if bogus_live && !real_live {
                    if matches!(req.op, RequestOp::Read) {
                        if !ctrl.push_read_reply(req.field, RawValue::Integer(11)) {
                            return;
                        }
                    }
                    continue;
                }
                if !real_live {
                    continue;
                }
                match req.op {
                    RequestOp::Read => {
                        let value = table
                            .get(&req.field)
                            .cloned()
                            .unwrap_or(RawValue::Integer(0));
                        if !ctrl.push_read_reply(req.field, value) {
                            return;
                        }
                    }
                    RequestOp::Write(value) => {
                        // 家电侧静默接受写入，不做范围校验
                        table.insert(req.field, value.clone());
                        if subscribed.contains(&req.field) {
                            if !ctrl.push_change(req.field, value) {
                                return;
                            }
                        }
                    }
                    RequestOp::Subscribe => {
                        if !subscribed.contains(&req.field) {
                            subscribed.push(req.field);
                        }
                        if profile.publish_on_subscribe {
                            let value = table
                                .get(&req.field)
                                .cloned()
                                .unwrap_or(RawValue::Integer(0));
                            if !ctrl.push_change(req.field, value) {
                                return;
                            }
                        }
                    }
                }
            }
            default(timeout) => {
                let now = Instant::now();
                if announce_at.is_some_and(|t| now >= t) {
                    announce_at = None;
                    if profile.bogus_device_first {
                        debug!("simulator announcing bogus device");
                        if !ctrl.announce(BOGUS_DEVICE) {
                            return;
                        }
                        bogus_live = true;
                        real_announce_at = Some(now + profile.bogus_retry_delay);
                    } else {
                        debug!("simulator announcing dishwasher");
                        if !ctrl.announce(REAL_DEVICE) {
                            return;
                        }
                        real_live = true;
                        next_notify = Some(now + profile.notify_interval);
                    }
                }
                if real_announce_at.is_some_and(|t| now >= t) {
                    real_announce_at = None;
                    bogus_live = false;
                    debug!("simulator announcing dishwasher");
                    if !ctrl.announce(REAL_DEVICE) {
                        return;
                    }
                    real_live = true;
                    next_notify = Some(now + profile.notify_interval);
                }
                if next_notify.is_some_and(|t| now >= t) {
                    next_notify = Some(now + profile.notify_interval);
                    for field in CHATTY_FIELDS {
                        if !subscribed.contains(&field) {
                            continue;
                        }
                        let value = match field {
                            FieldId::DoorCount => {
                                let mut count = table
                                    .get(&field)
                                    .and_then(RawValue::as_integer)
                                    .unwrap_or(0);
                                if rng.gen_bool(0.15) {
                                    count = count.wrapping_add(1);
                                }
                                let v = RawValue::Integer(count);
                                table.insert(field, v.clone());
                                v
                            }
                            FieldId::AnalogData => {
                                let mut bytes = table
                                    .get(&field)
                                    .and_then(|v| v.as_bytes().map(<[u8]>::to_vec))
                                    .unwrap_or_default();
                                if !bytes.is_empty() {
                                    let idx = rng.gen_range(0..bytes.len());
                                    bytes[idx] = rng.r#gen();
                                }
                                let v = RawValue::bytes(&bytes);
                                table.insert(field, v.clone());
                                v
                            }
                            // 其余高频字段原样重发（真机同款行为）
                            _ => table
                                .get(&field)
                                .cloned()
                                .unwrap_or(RawValue::Integer(0)),
                        };
                        if !ctrl.push_change(field, value) {
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod mock_bus_tests {
    use super::*;

    #[test]
    fn test_pair_roundtrip() {
        let (mut bus, ctrl) = pair();
        bus.send(FieldRequest::read(FieldId::DoorCount)).unwrap();
        let req = ctrl.next_request(Duration::from_millis(100)).unwrap();
        assert_eq!(req, FieldRequest::read(FieldId::DoorCount));

        ctrl.push_read_reply(FieldId::DoorCount, RawValue::Integer(7));
        let event = bus.receive().unwrap();
        assert_eq!(
            event,
            BusEvent::ReadReply {
                field: FieldId::DoorCount,
                value: RawValue::Integer(7)
            }
        );
    }

    #[test]
    fn test_receive_timeout() {
        let (mut bus, _ctrl) = pair();
        bus.set_receive_timeout(Duration::from_millis(10));
        assert!(matches!(bus.receive(), Err(BusError::Timeout)));
    }

    #[test]
    fn test_disconnected_when_controller_dropped() {
        let (mut bus, ctrl) = pair();
        drop(ctrl);
        assert!(matches!(bus.receive(), Err(BusError::Disconnected)));
        assert!(matches!(
            bus.send(FieldRequest::read(FieldId::DoorCount)),
            Err(BusError::Disconnected)
        ));
    }

    #[test]
    fn test_split_halves_keep_working() {
        let (bus, ctrl) = pair();
        let (mut rx, mut tx) = bus.split().unwrap();
        tx.send(FieldRequest::subscribe(FieldId::CycleStatus)).unwrap();
        assert!(ctrl.next_request(Duration::from_millis(100)).is_some());
        ctrl.push_change(FieldId::CycleStatus, RawValue::tuple(&[0, 0, 0, 0, 0]));
        assert!(rx.receive_timeout(Duration::from_millis(100)).is_ok());
    }
}

#[cfg(test)]
mod simulator_tests {
    use super::*;

    fn quick_profile() -> SimulatorProfile {
        SimulatorProfile {
            announce_delay: Duration::from_millis(5),
            bogus_retry_delay: Duration::from_millis(20),
            notify_interval: Duration::from_millis(50),
            reply_delay: Duration::ZERO,
            ..SimulatorProfile::default()
        }
    }

    #[test]
    fn test_announces_and_serves_reads() {
        let (mut bus, _sim) = SimulatedDishwasher::spawn(quick_profile());
        bus.set_receive_timeout(Duration::from_secs(1));

        let event = bus.receive().unwrap();
        assert_eq!(event, BusEvent::Announced(REAL_DEVICE));

        bus.send(FieldRequest::read(FieldId::OperatingMode)).unwrap();
        let event = bus.receive().unwrap();
        assert_eq!(
            event,
            BusEvent::ReadReply {
                field: FieldId::OperatingMode,
                value: RawValue::Integer(2)
            }
        );
    }

    #[test]
    fn test_bogus_device_probe_returns_invalid_connection() {
        let mut profile = quick_profile();
        profile.bogus_device_first = true;
        let (mut bus, _sim) = SimulatedDishwasher::spawn(profile);
        bus.set_receive_timeout(Duration::from_secs(1));

        let event = bus.receive().unwrap();
        assert_eq!(event, BusEvent::Announced(BOGUS_DEVICE));

        bus.send(FieldRequest::read(FieldId::OperatingMode)).unwrap();
        let event = bus.receive().unwrap();
        assert_eq!(
            event,
            BusEvent::ReadReply {
                field: FieldId::OperatingMode,
                value: RawValue::Integer(11)
            }
        );

        // 真实设备随后通告
        let event = bus.receive().unwrap();
        assert_eq!(event, BusEvent::Announced(REAL_DEVICE));
    }

    #[test]
    fn test_subscribe_publishes_snapshot() {
        let (mut bus, _sim) = SimulatedDishwasher::spawn(quick_profile());
        bus.set_receive_timeout(Duration::from_secs(1));
        let _ = bus.receive().unwrap(); // announce

        bus.send(FieldRequest::subscribe(FieldId::ControlLock)).unwrap();
        let event = bus.receive().unwrap();
        assert_eq!(
            event,
            BusEvent::FieldChanged {
                field: FieldId::ControlLock,
                value: RawValue::Integer(0xAA)
            }
        );
    }

    #[test]
    fn test_write_updates_and_notifies() {
        let (mut bus, _sim) = SimulatedDishwasher::spawn(quick_profile());
        bus.set_receive_timeout(Duration::from_secs(1));
        let _ = bus.receive().unwrap(); // announce

        bus.send(FieldRequest::subscribe(FieldId::ControlLock)).unwrap();
        let _ = bus.receive().unwrap(); // snapshot

        bus.send(FieldRequest::write(
            FieldId::ControlLock,
            RawValue::Integer(0x55),
        ))
        .unwrap();
        let event = bus.receive().unwrap();
        assert_eq!(
            event,
            BusEvent::FieldChanged {
                field: FieldId::ControlLock,
                value: RawValue::Integer(0x55)
            }
        );

        bus.send(FieldRequest::read(FieldId::ControlLock)).unwrap();
        let event = bus.receive().unwrap();
        assert_eq!(
            event,
            BusEvent::ReadReply {
                field: FieldId::ControlLock,
                value: RawValue::Integer(0x55)
            }
        );
    }

    #[test]
    fn test_open_door_bumps_count() {
        let (mut bus, sim) = SimulatedDishwasher::spawn(quick_profile());
        bus.set_receive_timeout(Duration::from_secs(1));
        let _ = bus.receive().unwrap(); // announce

        assert!(sim.open_door());
        bus.send(FieldRequest::read(FieldId::DoorCount)).unwrap();
        // open_door 与 read 并发，计数为 42 或 43 之一
        let event = bus.receive().unwrap();
        match event {
            BusEvent::ReadReply {
                field: FieldId::DoorCount,
                value: RawValue::Integer(n),
            } => assert!(n == 42 || n == 43),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
