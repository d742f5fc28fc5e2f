//! 驱动层错误类型定义

use thiserror::Error;
use washlink_bus::BusError;
use washlink_protocol::ProtocolError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 总线适配层错误
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 命令通道已关闭（会话线程已退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 会话线程启动失败
    #[error("Session thread error: {0}")]
    SessionThread(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
