//! 总线报文单元
//!
//! 驱动层与总线适配器之间交换的最小单元：出站为字段请求
//! （读/写/订阅），入站为总线事件（设备通告/读响应/变更通知）。
//! 这里不做语义解释，载荷一律是 [`RawValue`]。

use washlink_protocol::{FieldId, RawValue};

// ============================================================================
// 设备信息
// ============================================================================

/// 总线上通告的设备标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// 总线地址
    pub address: u32,
    /// 固件版本号（四段）
    pub version: [u8; 4],
}

impl DeviceInfo {
    /// 版本号显示形式，如 `"0.2.5.1"`
    pub fn version_text(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.version[0], self.version[1], self.version[2], self.version[3]
        )
    }

    /// 地址显示形式（小写十六进制，无前缀）
    pub fn address_text(&self) -> String {
        format!("{:x}", self.address)
    }
}

// ============================================================================
// 出站请求
// ============================================================================

/// 字段请求的操作类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOp {
    /// 单次读取，期待一个 [`BusEvent::ReadReply`]
    Read,
    /// 写入，无应答（家电侧静默接受或忽略）
    Write(RawValue),
    /// 订阅变更通知，此后该字段经由 [`BusEvent::FieldChanged`] 上报
    Subscribe,
}

/// 发往家电的单个字段请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequest {
    pub field: FieldId,
    pub op: RequestOp,
}

impl FieldRequest {
    pub fn read(field: FieldId) -> Self {
        FieldRequest {
            field,
            op: RequestOp::Read,
        }
    }

    pub fn write(field: FieldId, value: RawValue) -> Self {
        FieldRequest {
            field,
            op: RequestOp::Write(value),
        }
    }

    pub fn subscribe(field: FieldId) -> Self {
        FieldRequest {
            field,
            op: RequestOp::Subscribe,
        }
    }

    /// 请求种类的日志用短名
    pub fn op_name(&self) -> &'static str {
        match self.op {
            RequestOp::Read => "read",
            RequestOp::Write(_) => "write",
            RequestOp::Subscribe => "subscribe",
        }
    }
}

// ============================================================================
// 入站事件
// ============================================================================

/// 总线适配器上报的事件
///
/// 读响应与变更通知携带相同的载荷形状，但驱动层对二者的处理
/// 完全不同（前者结清一次显式读，后者驱动订阅生命周期），
/// 因此在总线边界上就分开。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// 新设备在总线上通告自己（真实设备或总线偶发的占位设备）
    Announced(DeviceInfo),
    /// 对先前某次读请求的响应
    ReadReply { field: FieldId, value: RawValue },
    /// 已订阅字段的变更通知
    FieldChanged { field: FieldId, value: RawValue },
}
