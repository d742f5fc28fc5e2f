//! 字段编解码分发表
//!
//! 每个字段名映射到一个固定的描述符形状（标量枚举、位掩码、打包
//! 多字节、复合元组、原始透传），映射在编译期固定。解码先按
//! [`FieldShape`](crate::FieldShape) 校验原始值形状，形状不符显式
//! 失败；形状相符但值未识别时解码为携带原值的 Unknown 记录。
//!
//! 编码只对可写字段存在，且打包字段的子字段范围在这里（经由记录
//! 类型）校验完毕后才会产出负载——越界写入永远到不了总线。

use crate::{
    BitmaskRecord, ContinuousCycle, ControlLock, CycleCounts, CycleSnapshot, CycleState,
    CycleStatus, DryDrainCounters, ErrorStatus, FieldId, FlowRates, OperatingMode, Personality,
    ProtocolError, RawValue, UserConfiguration, DISABLED_FEATURE_BITS, REMINDER_BITS,
};

// ============================================================================
// 解码记录
// ============================================================================

/// 字段解码结果的封闭集合
///
/// 变体与 [`FieldId`] 一一对应（五个循环槽共享 `CycleSnapshot`）。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum FieldRecord {
    UserConfiguration(UserConfiguration),
    OperatingMode(OperatingMode),
    CycleState(CycleState),
    CycleStatus(CycleStatus),
    DoorCount(u32),
    CycleSnapshot(CycleSnapshot),
    Reminders(BitmaskRecord),
    CycleCounts(CycleCounts),
    Error(ErrorStatus),
    Rates(FlowRates),
    ContinuousCycle(ContinuousCycle),
    AnalogData(Vec<u8>),
    DryDrainCounters(DryDrainCounters),
    Personality(Personality),
    DisabledFeatures(BitmaskRecord),
    ControlLock(ControlLock),
}

// ============================================================================
// 形状校验
// ============================================================================

fn malformed(field: FieldId, raw: &RawValue) -> ProtocolError {
    ProtocolError::MalformedRecord {
        field,
        expected: field.shape().expected_text(),
        actual: raw.shape_text(),
    }
}

fn expect_integer(field: FieldId, raw: &RawValue) -> Result<u32, ProtocolError> {
    raw.as_integer().ok_or_else(|| malformed(field, raw))
}

fn expect_bytes<'a>(
    field: FieldId,
    raw: &'a RawValue,
    len: usize,
) -> Result<&'a [u8], ProtocolError> {
    match raw.as_bytes() {
        Some(b) if b.len() == len => Ok(b),
        _ => Err(malformed(field, raw)),
    }
}

fn expect_any_bytes<'a>(field: FieldId, raw: &'a RawValue) -> Result<&'a [u8], ProtocolError> {
    raw.as_bytes().ok_or_else(|| malformed(field, raw))
}

fn expect_tuple<'a>(
    field: FieldId,
    raw: &'a RawValue,
    len: usize,
) -> Result<&'a [u32], ProtocolError> {
    match raw.as_tuple() {
        Some(t) if t.len() == len => Ok(t),
        _ => Err(malformed(field, raw)),
    }
}

// ============================================================================
// 解码分发
// ============================================================================

/// 将字段的原始总线值解码为结构化记录
///
/// 纯函数：结果只取决于 `(field, raw)`，无隐藏状态、无部分结果。
/// 形状不符返回 [`ProtocolError::MalformedRecord`]；形状相符的
/// 未识别值解码为 Unknown 记录，永不失败。
pub fn decode(field: FieldId, raw: &RawValue) -> Result<FieldRecord, ProtocolError> {
    match field {
        FieldId::UserConfiguration => {
            let b = expect_bytes(field, raw, 3)?;
            Ok(FieldRecord::UserConfiguration(UserConfiguration::from_bytes([b[0], b[1], b[2]])))
        }
        FieldId::OperatingMode => Ok(FieldRecord::OperatingMode(OperatingMode::from(
            expect_integer(field, raw)?,
        ))),
        FieldId::CycleState => Ok(FieldRecord::CycleState(CycleState::from(expect_integer(
            field, raw,
        )?))),
        FieldId::CycleStatus => Ok(FieldRecord::CycleStatus(CycleStatus::from_tuple(
            expect_tuple(field, raw, 5)?,
        ))),
        FieldId::DoorCount => Ok(FieldRecord::DoorCount(expect_integer(field, raw)?)),
        FieldId::CycleData0
        | FieldId::CycleData1
        | FieldId::CycleData2
        | FieldId::CycleData3
        | FieldId::CycleData4 => Ok(FieldRecord::CycleSnapshot(CycleSnapshot::from_tuple(
            expect_tuple(field, raw, 9)?,
        ))),
        FieldId::Reminders => Ok(FieldRecord::Reminders(BitmaskRecord::from_raw(
            expect_integer(field, raw)?,
            &REMINDER_BITS,
        ))),
        FieldId::CycleCounts => Ok(FieldRecord::CycleCounts(CycleCounts::from_tuple(
            expect_tuple(field, raw, 3)?,
        ))),
        FieldId::Error => Ok(FieldRecord::Error(ErrorStatus::from_tuple(expect_tuple(
            field, raw, 2,
        )?))),
        FieldId::Rates => Ok(FieldRecord::Rates(FlowRates::from_tuple(expect_tuple(
            field, raw, 2,
        )?))),
        FieldId::ContinuousCycle => Ok(FieldRecord::ContinuousCycle(ContinuousCycle::from_tuple(
            expect_tuple(field, raw, 2)?,
        ))),
        FieldId::AnalogData => Ok(FieldRecord::AnalogData(
            expect_any_bytes(field, raw)?.to_vec(),
        )),
        FieldId::DryDrainCounters => Ok(FieldRecord::DryDrainCounters(
            DryDrainCounters::from_tuple(expect_tuple(field, raw, 2)?),
        )),
        FieldId::Personality => Ok(FieldRecord::Personality(Personality::from_tuple(
            expect_tuple(field, raw, 2)?,
        ))),
        FieldId::DisabledFeatures => Ok(FieldRecord::DisabledFeatures(BitmaskRecord::from_raw(
            expect_integer(field, raw)?,
            &DISABLED_FEATURE_BITS,
        ))),
        FieldId::ControlLock => Ok(FieldRecord::ControlLock(ControlLock::from(expect_integer(
            field, raw,
        )?))),
    }
}

// ============================================================================
// 编码分发
// ============================================================================

/// 将结构化记录编码为总线原始值
///
/// 只有可写字段存在编码路径；打包字段的子字段范围校验失败时
/// 返回 [`ProtocolError::EncodeRange`]，负载不会产出。
pub fn encode(field: FieldId, record: &FieldRecord) -> Result<RawValue, ProtocolError> {
    if !field.is_writable() {
        return Err(ProtocolError::ReadOnly { field });
    }
    match (field, record) {
        (FieldId::UserConfiguration, FieldRecord::UserConfiguration(cfg)) => {
            Ok(RawValue::bytes(&cfg.to_bytes()?))
        }
        (FieldId::Personality, FieldRecord::Personality(p)) => Ok(RawValue::tuple(&p.to_tuple())),
        (FieldId::OperatingMode, FieldRecord::OperatingMode(m)) => {
            Ok(RawValue::Integer(u32::from(*m)))
        }
        (FieldId::CycleState, FieldRecord::CycleState(s)) => Ok(RawValue::Integer(u32::from(*s))),
        (FieldId::ControlLock, FieldRecord::ControlLock(l)) => Ok(RawValue::Integer(u32::from(*l))),
        (FieldId::DisabledFeatures, FieldRecord::DisabledFeatures(rec))
        | (FieldId::Reminders, FieldRecord::Reminders(rec)) => Ok(RawValue::Integer(rec.raw)),
        _ => Err(ProtocolError::RecordMismatch { field }),
    }
}

/// 将裸整数编码为可写标量字段的总线值
///
/// 对应控制台的 `set <field> <n>`：按原样透传，不做取值校验——
/// 与家电侧的实际写入语义一致（调试用途，操作者自担风险）。
pub fn encode_scalar(field: FieldId, value: u32) -> Result<RawValue, ProtocolError> {
    if !field.is_numeric_writable() {
        return Err(ProtocolError::ReadOnly { field });
    }
    Ok(RawValue::Integer(value))
}

// ============================================================================
// 测试
// ============================================================================



#[cfg(test)]
mod bit_classification_law_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// 任意整数解码位掩码字段：每个置位要么是已知标签要么是未知位号，
        /// 置位总数与分类总数一致——没有位被静默丢弃
        #[test]
        fn every_set_bit_is_classified(raw in any::<u32>()) {
            for field in [FieldId::DisabledFeatures, FieldId::Reminders] {
                let rec = decode(field, &RawValue::Integer(raw)).unwrap();
                let mask = match rec {
                    FieldRecord::DisabledFeatures(m) | FieldRecord::Reminders(m) => m,
                    other => panic!("unexpected record: {other:?}"),
                };
                prop_assert_eq!(mask.flags.len(), raw.count_ones() as usize);
                let mut rebuilt = 0u32;
                for flag in &mask.flags {
                    rebuilt |= 1 << flag.bit();
                }
                prop_assert_eq!(rebuilt, raw);
            }
        }
    }
}
