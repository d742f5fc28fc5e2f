//! 子命令定义

pub mod config;

pub use config::{CliConfig, ConfigCommand};
