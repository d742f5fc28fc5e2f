//! 会话对外广播的遥测事件

use std::time::SystemTime;
use washlink_bus::DeviceInfo;
use washlink_protocol::{FieldId, FieldRecord, ProtocolError, RawValue};

/// 会话事件流
///
/// 订阅者（控制台、转发器、监视器）通过通道接收；每个订阅者拿到
/// 独立克隆，慢订阅者不会拖住会话线程。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// 总线上出现设备通告（尚未探测）
    ApplianceAnnounced { info: DeviceInfo },

    /// 探测发现占位设备（运行模式 11），已忽略
    ApplianceRejected { info: DeviceInfo, mode: u32 },

    /// 会话绑定了这台家电
    ApplianceSelected { info: DeviceInfo },

    /// 读响应解码完成
    FieldRead {
        field: FieldId,
        record: FieldRecord,
        raw: RawValue,
    },

    /// 变更通知解码完成
    FieldChanged {
        field: FieldId,
        record: FieldRecord,
        raw: RawValue,
    },

    /// 收到的值形状与字段不符
    DecodeFailed {
        field: FieldId,
        error: ProtocolError,
    },

    /// 读阶段超时（字段照常进入订阅阶段）
    ReadTimedOut { field: FieldId },

    /// 订阅阶段超时（订阅可能静默成功，后续通知照常上报）
    SubscribeTimedOut { field: FieldId },

    /// 全部字段结清，会话就绪
    SessionReady,

    /// 会话结束
    SessionClosed { reason: String },
}

impl TelemetryEvent {
    /// 事件涉及的字段（会话级事件返回 None）
    pub fn field(&self) -> Option<FieldId> {
        match self {
            TelemetryEvent::FieldRead { field, .. }
            | TelemetryEvent::FieldChanged { field, .. }
            | TelemetryEvent::DecodeFailed { field, .. }
            | TelemetryEvent::ReadTimedOut { field }
            | TelemetryEvent::SubscribeTimedOut { field } => Some(*field),
            _ => None,
        }
    }
}

/// 单个字段的最新样本（会话上下文缓存的单元）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSample {
    pub field: FieldId,
    /// 解码后的结构化记录
    pub record: FieldRecord,
    /// 总线原始值
    pub raw: RawValue,
    /// 样本到达的墙钟时刻
    pub received_at: SystemTime,
}
