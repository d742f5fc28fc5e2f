//! # Washlink Protocol
//!
//! 洗碗机串行总线字段编解码（无硬件依赖）
//!
//! ## 模块
//!
//! - `fields`: 字段标识与元数据表
//! - `constants`: 协议常量定义
//! - `status`: 状态类字段解码（运行模式、循环状态、位掩码）
//! - `config`: 用户配置与个性化字段（可写，含打包位域）
//! - `cycle`: 循环历史与计数类复合记录
//! - `codec`: 字段名 → 解码/编码的统一分发表
//!
//! ## 解码策略
//!
//! 解码永不因"未识别的值"失败：家电可能上报未文档化的状态值，
//! 系统必须保持可观测。只有原始值的**形状**（长度、类型）与字段
//! 结构要求不符时才返回 [`ProtocolError::MalformedRecord`]。

pub mod codec;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod fields;
pub mod status;

// 重新导出常用类型
pub use codec::*;
pub use config::*;
pub use constants::*;
pub use cycle::*;
pub use fields::*;
pub use status::*;

use smallvec::SmallVec;
use std::fmt;

/// 总线原始值的统一抽象
///
/// # 设计目的
///
/// `RawValue` 是协议层和总线层之间的中间抽象：
/// - **层次解耦**：编解码不依赖底层总线实现（真实适配器/模拟器）
/// - **统一接口**：上层通过 `decode`/`encode` 使用统一的值类型
/// - **未定型**：在总线边界上不做语义解释，具体含义由字段决定
///
/// # 在架构中的位置
///
/// ```text
/// Bus Layer (washlink-bus)
///     ↓ 读响应 / 变更通知携带 RawValue
/// RawValue (此类型)
///     ↓ codec::decode(field, raw) 解码 / codec::encode(field, record) 编码
/// Protocol Layer (washlink-protocol)
/// ```
///
/// # 三种形状
///
/// - `Integer`: 标量字段（运行模式、门计数、位掩码等）
/// - `Bytes`: 字节序列（用户配置 3 字节、模拟量诊断数据）
/// - `Tuple`: 有序整数元组（循环快照 9 元、个性化 2 元等）
///
/// # 示例
///
/// ```rust
/// use washlink_protocol::RawValue;
///
/// let scalar = RawValue::Integer(2);
/// let packed = RawValue::bytes(&[0x01, 0x85, 0x04]);
/// let tuple = RawValue::tuple(&[5, 0]);
///
/// assert_eq!(scalar.as_integer(), Some(2));
/// assert_eq!(packed.as_bytes(), Some(&[0x01, 0x85, 0x04][..]));
/// assert_eq!(tuple.as_tuple(), Some(&[5, 0][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RawValue {
    /// 单个无符号整数
    Integer(u32),

    /// 原始字节序列（长度由字段决定）
    Bytes(SmallVec<[u8; 8]>),

    /// 有序整数元组（元数由字段决定）
    Tuple(SmallVec<[u32; 9]>),
}

impl RawValue {
    /// 从字节切片创建
    pub fn bytes(data: &[u8]) -> Self {
        RawValue::Bytes(SmallVec::from_slice(data))
    }

    /// 从整数切片创建元组
    pub fn tuple(data: &[u32]) -> Self {
        RawValue::Tuple(SmallVec::from_slice(data))
    }

    /// 获取整数值（非整数形状返回 None）
    pub fn as_integer(&self) -> Option<u32> {
        match self {
            RawValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// 获取字节切片（非字节形状返回 None）
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RawValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// 获取元组切片（非元组形状返回 None）
    pub fn as_tuple(&self) -> Option<&[u32]> {
        match self {
            RawValue::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// 形状描述，用于错误信息（如 `"integer"`、`"3-byte sequence"`）
    pub fn shape_text(&self) -> String {
        match self {
            RawValue::Integer(_) => "integer".to_string(),
            RawValue::Bytes(b) => format!("{}-byte sequence", b.len()),
            RawValue::Tuple(t) => format!("{}-element tuple", t.len()),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Integer(v) => write!(f, "{v}"),
            RawValue::Bytes(b) => write!(f, "{b:?}"),
            RawValue::Tuple(t) => write!(f, "{t:?}"),
        }
    }
}

use thiserror::Error;

/// 协议编解码错误类型
///
/// 注意区分两类解码情形：值形状错误（`MalformedRecord`，显式失败）
/// 与值未识别（不报错，解码为带原始值的 Unknown 记录）。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 原始值形状与字段结构要求不符
    #[error("Malformed record for field {field}: expected {expected}, got {actual}")]
    MalformedRecord {
        field: FieldId,
        expected: String,
        actual: String,
    },

    /// 写入的子字段值超出合法打包范围（提交总线前拒绝）
    #[error("Value {value} out of range for {field}.{sub_field} (valid 0..={max})")]
    EncodeRange {
        field: FieldId,
        sub_field: &'static str,
        value: u32,
        max: u32,
    },

    /// 字段只读，无编码路径
    #[error("Field {field} is read-only")]
    ReadOnly { field: FieldId },

    /// 记录类型与目标字段不匹配
    #[error("Record type does not match field {field}")]
    RecordMismatch { field: FieldId },

    /// 未注册的字段名
    #[error("Field not recognised: \"{0}\"")]
    UnknownField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_accessors() {
        assert_eq!(RawValue::Integer(7).as_integer(), Some(7));
        assert_eq!(RawValue::Integer(7).as_bytes(), None);
        assert_eq!(RawValue::bytes(&[1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
        assert_eq!(RawValue::tuple(&[4, 5]).as_tuple(), Some(&[4, 5][..]));
        assert_eq!(RawValue::tuple(&[4, 5]).as_integer(), None);
    }

    #[test]
    fn test_raw_value_shape_text() {
        assert_eq!(RawValue::Integer(0).shape_text(), "integer");
        assert_eq!(RawValue::bytes(&[0, 0, 0]).shape_text(), "3-byte sequence");
        assert_eq!(
            RawValue::tuple(&[1, 2, 3, 4, 5]).shape_text(),
            "5-element tuple"
        );
    }

    #[test]
    fn test_error_display_names_field() {
        let err = ProtocolError::ReadOnly {
            field: FieldId::DoorCount,
        };
        assert_eq!(err.to_string(), "Field doorCount is read-only");
    }

    #[test]
    fn test_encode_range_display() {
        let err = ProtocolError::EncodeRange {
            field: FieldId::UserConfiguration,
            sub_field: "delay_start",
            value: 9,
            max: 3,
        };
        assert_eq!(
            err.to_string(),
            "Value 9 out of range for userConfiguration.delay_start (valid 0..=3)"
        );
    }
}
