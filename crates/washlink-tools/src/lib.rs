//! 渲染与格式化
//!
//! 控制台和守护进程共享的纯函数层：字段记录的人类可读描述、
//! 时长/时间戳/温度的展示格式。只依赖协议层，不触碰会话状态。
//!
//! ## 包含模块
//!
//! - `render` - 字段记录 → 展示文本（逐字段的描述函数）
//! - `timestamp` - 时长、家电纪元时间戳与温度的格式化

pub mod render;
pub mod timestamp;

pub use render::{describe_integer, describe_raw, describe_record};
pub use timestamp::{
    describe_cycle_timestamp, describe_duration, describe_temp_f, wall_clock_text,
};
