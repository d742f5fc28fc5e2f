//! 洗碗机遥测驱动
//!
//! 在总线抽象之上实现会话语义：
//!
//! - 设备探测与接入（拒绝占位设备，按配置顺序读入全部字段）
//! - 下发节拍（FIFO + 最小间隔，永不丢请求）
//! - 字段生命周期编排（读 → 订阅 → 在线，单计时器可复位）
//! - 事件分发与最新值缓存（无锁快照）
//!
//! 入口是 [`SessionBuilder`]，典型用法：
//!
//! ```
//! use std::time::Duration;
//! use washlink_bus::SplittableBus;
//! use washlink_driver::{DriverError, SessionBuilder};
//!
//! fn watch<B>(bus: B) -> Result<(), DriverError>
//! where
//!     B: SplittableBus,
//!     B::Rx: 'static,
//!     B::Tx: 'static,
//! {
//!     let session = SessionBuilder::new()
//!         .min_spacing(Duration::from_millis(500))
//!         .start(bus)?;
//!     for event in session.subscribe()? {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod orchestrator;
pub mod pacer;
pub mod session;

pub use builder::SessionBuilder;
pub use command::SessionCommand;
pub use config::SessionConfig;
pub use error::DriverError;
pub use event::{FieldSample, TelemetryEvent};
pub use orchestrator::{Expiry, OrchestratorState, Outcome, TimeoutKind};
pub use pacer::PacerState;
pub use session::{ApplianceSession, SessionStats, SessionStatsSnapshot};
