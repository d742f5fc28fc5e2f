//! 阻塞式会话封装
//!
//! [`ApplianceSession`](washlink_driver::ApplianceSession) 的方法全部
//! 即发即走，响应走事件流。控制台这类逐条交互的调用方要的是
//! "发出去、等到这个字段的回音再返回"，本模块把等待封装起来：
//! 每次调用临时挂一个订阅（先订阅后下发，事件不会漏），在自己的
//! 截止时间内扫描事件流。
//!
//! 注意超时从**提交**起算：请求在节拍器队列里的滞留也消耗预算，
//! 队列深时调用方应给出更宽松的超时。

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use washlink_bus::DeviceInfo;
use washlink_driver::{ApplianceSession, DriverError, FieldSample, TelemetryEvent};
use washlink_protocol::{codec, FieldId, FieldRecord};

/// 阻塞式客户端
///
/// 持有会话所有权；克隆语义不提供，跨线程共享请直接用
/// [`subscribe`](Self::subscribe) 拿事件流。
pub struct SessionClient {
    session: ApplianceSession,
}

impl SessionClient {
    pub fn new(session: ApplianceSession) -> Self {
        SessionClient { session }
    }

    /// 底层会话
    pub fn session(&self) -> &ApplianceSession {
        &self.session
    }

    /// 等待全部字段结清
    ///
    /// 已就绪时立即返回；否则阻塞到就绪信号或超时。
    pub fn wait_ready(&self, timeout: Duration) -> Result<(), DriverError> {
        if self.session.is_ready() {
            return Ok(());
        }
        // 晚挂的订阅会补收就绪信号，这里没有先检查后订阅的窗口
        let events = self.session.subscribe()?;
        let deadline = Instant::now() + timeout;
        loop {
            match recv_until(&events, deadline)? {
                TelemetryEvent::SessionReady => return Ok(()),
                TelemetryEvent::SessionClosed { .. } => return Err(DriverError::ChannelClosed),
                _ => continue,
            }
        }
    }

    /// 读一个字段并等待它的读响应
    ///
    /// 返回的样本同时带解码记录和原始值（`raw <field>` 展示用）。
    /// 同字段的变更通知不算数，只有读响应才结束等待。
    pub fn read_field(
        &self,
        field: FieldId,
        timeout: Duration,
    ) -> Result<FieldSample, DriverError> {
        let events = self.session.subscribe()?;
        self.session.read(field)?;
        let deadline = Instant::now() + timeout;
        loop {
            match recv_until(&events, deadline)? {
                TelemetryEvent::FieldRead {
                    field: f,
                    record,
                    raw,
                } if f == field => {
                    return Ok(FieldSample {
                        field,
                        record,
                        raw,
                        received_at: SystemTime::now(),
                    });
                }
                TelemetryEvent::DecodeFailed { field: f, error } if f == field => {
                    return Err(DriverError::Protocol(error));
                }
                TelemetryEvent::SessionClosed { .. } => return Err(DriverError::ChannelClosed),
                _ => continue,
            }
        }
    }

    /// 写数值可写字段（范围校验在编码层）
    pub fn write_number(&self, field: FieldId, value: u32) -> Result<(), DriverError> {
        let raw = codec::encode_scalar(field, value)?;
        self.session.write(field, raw)
    }

    /// 写结构化记录（个性化、用户配置）
    pub fn write_record(&self, field: FieldId, record: &FieldRecord) -> Result<(), DriverError> {
        let raw = codec::encode(field, record)?;
        self.session.write(field, raw)
    }

    /// 挂载事件订阅
    pub fn subscribe(&self) -> Result<Receiver<TelemetryEvent>, DriverError> {
        self.session.subscribe()
    }

    /// 立即触发一轮全量读
    pub fn refresh_now(&self) -> Result<(), DriverError> {
        self.session.refresh_now()
    }

    /// 字段最新样本（缓存，不触发总线请求）
    pub fn latest(&self, field: FieldId) -> Option<Arc<FieldSample>> {
        self.session.get_sample(field)
    }

    pub fn device(&self) -> Option<DeviceInfo> {
        self.session.get_device()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }
}

/// 在截止时间内取下一个事件
fn recv_until(
    events: &Receiver<TelemetryEvent>,
    deadline: Instant,
) -> Result<TelemetryEvent, DriverError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(DriverError::Timeout);
    }
    match events.recv_timeout(remaining) {
        Ok(event) => Ok(event),
        Err(RecvTimeoutError::Timeout) => Err(DriverError::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(DriverError::ChannelClosed),
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(all(test, feature = "mock"))]
mod client_tests {
    use super::*;
    use washlink_bus::mock;
    use washlink_bus::FieldRequest;
    use washlink_driver::{SessionBuilder, SessionConfig};
    use washlink_protocol::RawValue;

    fn scripted_client(order: &[FieldId]) -> (SessionClient, mock::MockBusController) {
        let (bus, ctrl) = mock::pair();
        let session = SessionBuilder::new()
            .config(SessionConfig {
                min_spacing_ms: 5,
                request_timeout_ms: 2_000,
                refresh_interval_ms: 0,
                keep_alive_ms: None,
                adoption_order: order.to_vec(),
            })
            .start(bus)
            .unwrap();
        (SessionClient::new(session), ctrl)
    }

    fn adopt(ctrl: &mock::MockBusController) {
        ctrl.announce(DeviceInfo {
            address: 0x2A,
            version: [1, 0, 3, 0],
        });
        let probe = ctrl.next_request(Duration::from_secs(2)).unwrap();
        assert_eq!(probe, FieldRequest::read(FieldId::OperatingMode));
        ctrl.push_read_reply(FieldId::OperatingMode, RawValue::Integer(2));
    }

    #[test]
    fn test_wait_ready_then_read_field() {
        let (client, ctrl) = scripted_client(&[]);
        adopt(&ctrl);
        client.wait_ready(Duration::from_secs(2)).unwrap();

        // 后台应答线程：等读请求到达再回值
        let answer = std::thread::spawn(move || {
            loop {
                let req = ctrl.next_request(Duration::from_secs(2)).unwrap();
                if req == FieldRequest::read(FieldId::DoorCount) {
                    ctrl.push_read_reply(FieldId::DoorCount, RawValue::Integer(7));
                    return ctrl;
                }
            }
        });
        let sample = client
            .read_field(FieldId::DoorCount, Duration::from_secs(2))
            .unwrap();
        assert_eq!(sample.record, FieldRecord::DoorCount(7));
        assert_eq!(sample.raw, RawValue::Integer(7));
        answer.join().unwrap();
    }

    #[test]
    fn test_read_field_times_out_without_reply() {
        let (client, ctrl) = scripted_client(&[]);
        adopt(&ctrl);
        client.wait_ready(Duration::from_secs(2)).unwrap();

        let result = client.read_field(FieldId::DoorCount, Duration::from_millis(200));
        assert!(matches!(result, Err(DriverError::Timeout)));
        // 请求仍然发出去了，只是无人应答
        let mut seen = false;
        while let Some(req) = ctrl.try_request() {
            seen |= req == FieldRequest::read(FieldId::DoorCount);
        }
        assert!(seen);
    }

    #[test]
    fn test_write_number_rejects_read_only_field() {
        let (client, ctrl) = scripted_client(&[]);
        adopt(&ctrl);
        client.wait_ready(Duration::from_secs(2)).unwrap();

        let result = client.write_number(FieldId::DoorCount, 3);
        assert!(matches!(result, Err(DriverError::Protocol(_))));
        // 被编码层拒绝的写不会触碰总线
        std::thread::sleep(Duration::from_millis(50));
        assert!(ctrl.try_request().is_none());
    }

    #[test]
    fn test_write_number_reaches_bus() {
        let (client, ctrl) = scripted_client(&[]);
        adopt(&ctrl);
        client.wait_ready(Duration::from_secs(2)).unwrap();

        client.write_number(FieldId::ControlLock, 0x55).unwrap();
        let req = ctrl.next_request(Duration::from_secs(2)).unwrap();
        assert_eq!(
            req,
            FieldRequest::write(FieldId::ControlLock, RawValue::Integer(0x55))
        );
    }
}
