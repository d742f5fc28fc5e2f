//! # Washlink SDK - 统一入口
//!
//! 一次引入整条遥测栈：
//!
//! - [`protocol`] - 字段注册表、记录解码、原始值形状
//! - [`bus`] - 串行总线抽象与 mock 总线（`mock` feature）
//! - [`driver`] - 会话本体：探测、节拍、接入编排、事件流
//! - [`client`] - 阻塞封装、遥测中继、活性监视
//! - [`tools`] - 展示层纯函数（字段描述、时长/时间戳格式）
//!
//! ## 快速上手
//!
//! ```no_run
//! use washlink_sdk::bus::SplittableBus;
//! use washlink_sdk::prelude::*;
//!
//! fn bring_up<B>(bus: B) -> Result<SessionClient, DriverError>
//! where
//!     B: SplittableBus,
//!     B::Rx: 'static,
//!     B::Tx: 'static,
//! {
//!     let session = SessionBuilder::new()
//!         .min_spacing(std::time::Duration::from_millis(500))
//!         .start(bus)?;
//!     let client = SessionClient::new(session);
//!     client.wait_ready(std::time::Duration::from_secs(30))?;
//!     Ok(client)
//! }
//! ```

pub use washlink_bus as bus;
pub use washlink_client as client;
pub use washlink_driver as driver;
pub use washlink_protocol as protocol;
pub use washlink_tools as tools;

/// 常用类型一揽子导入
pub mod prelude {
    pub use crate::bus::{BusEvent, DeviceInfo, FieldRequest, RequestOp};
    pub use crate::client::{RelayCache, RelayConnection, SessionClient, SessionMonitor};
    pub use crate::driver::{
        ApplianceSession, DriverError, FieldSample, SessionBuilder, SessionConfig, TelemetryEvent,
    };
    pub use crate::protocol::{FieldId, FieldRecord, ProtocolError, RawValue};
}
