//! # Washlink Bus Adapter Layer
//!
//! 家电串行总线的硬件抽象层，提供统一的总线接口抽象。
//!
//! 物理传输（串口、网关）由具体适配器实现；本层只定义报文单元
//! 和收发契约。`mock` 特性内置一台模拟洗碗机，驱动层和应用在
//! 无硬件环境下跑完整会话。

use std::time::Duration;
use thiserror::Error;

pub mod wire;

pub use wire::{BusEvent, DeviceInfo, FieldRequest, RequestOp};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBus, MockBusController, SimulatedDishwasher, SimulatorProfile};

/// 总线适配层统一错误类型
#[derive(Error, Debug)]
pub enum BusError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] BusDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Bus disconnected")]
    Disconnected,
}

impl BusError {
    /// 错误是否不可恢复（会话应当终止而非重试）
    pub fn is_fatal(&self) -> bool {
        match self {
            BusError::Device(e) => e.is_fatal(),
            BusError::Disconnected => true,
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    InvalidPayload,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct BusDeviceError {
    pub kind: BusDeviceErrorKind,
    pub message: String,
}

impl BusDeviceError {
    pub fn new(kind: BusDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            BusDeviceErrorKind::NoDevice
                | BusDeviceErrorKind::AccessDenied
                | BusDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for BusDeviceError {
    fn from(message: String) -> Self {
        Self::new(BusDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for BusDeviceError {
    fn from(message: &str) -> Self {
        Self::new(BusDeviceErrorKind::Unknown, message)
    }
}

/// 总线适配器的收发契约
///
/// 发送永不阻塞等待应答；应答（若有）从接收侧作为事件上报。
pub trait ApplianceBus {
    fn send(&mut self, request: FieldRequest) -> Result<(), BusError>;
    fn receive(&mut self) -> Result<BusEvent, BusError>;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<BusEvent, BusError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    fn try_receive(&mut self) -> Result<Option<BusEvent>, BusError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(event) => Ok(Some(event)),
            Err(BusError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub trait RxBus: Send {
    fn receive(&mut self) -> Result<BusEvent, BusError>;
    fn receive_timeout(&mut self, timeout: Duration) -> Result<BusEvent, BusError>;
}

pub trait TxBus: Send {
    fn send(&mut self, request: FieldRequest) -> Result<(), BusError>;
}

/// 可拆分为独立收/发半边的适配器（收发分属不同线程时用）
pub trait SplittableBus: ApplianceBus {
    type Rx: RxBus;
    type Tx: TxBus;
    fn split(self) -> Result<(Self::Rx, Self::Tx), BusError>;
}
