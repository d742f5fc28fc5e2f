//! 客户端层
//!
//! 驱动会话之上的三件套：
//!
//! - [`client`]: 阻塞式封装——发请求、在事件流上等响应，适合
//!   控制台这类逐条交互的调用方
//! - [`relay`]: 遥测中继——末值缓存、下行线格式编码与 TCP 连接，
//!   重连时缓存原样重放
//! - [`monitor`]: 活性监视——家电静默与字段陈旧的旁路观测
//!
//! 会话本体（线程、节拍、编排）在
//! [`washlink_driver`]，需要底层控制时直接用
//! [`SessionClient::session`](client::SessionClient::session) 拿句柄。

pub mod client;
pub mod monitor;
pub mod relay;

pub use client::SessionClient;
pub use monitor::{FieldActivity, SessionMonitor};
pub use relay::{encode_message, unix_millis, RelayCache, RelayConnection, RelayError};
