//! 会话命令定义
//!
//! 外部句柄通过命令通道驱动会话线程；所有出站请求仍然统一经过
//! 节拍器，命令不能绕开下发间隔。

use crate::event::TelemetryEvent;
use crossbeam_channel::Sender;
use washlink_protocol::{FieldId, RawValue};

/// 发往会话线程的命令
#[derive(Debug)]
pub enum SessionCommand {
    /// 读一个字段（响应走事件流）
    Read(FieldId),

    /// 写一个字段（值已由调用方编码）
    Write(FieldId, RawValue),

    /// 挂载一个事件订阅者
    Subscribe(Sender<TelemetryEvent>),

    /// 立即触发一轮全量读（绕过"队列非空则跳过"规则）
    RefreshNow,

    /// 结束会话
    Shutdown,
}
