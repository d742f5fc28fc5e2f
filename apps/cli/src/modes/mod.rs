//! 运行模式
//!
//! - One-shot 模式：每条子命令独立起会话，跑完即退
//! - REPL 模式：交互式洗碗机控制台

pub mod oneshot;
pub mod repl;
