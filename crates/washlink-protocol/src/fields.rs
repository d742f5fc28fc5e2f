//! 字段标识与元数据表
//!
//! 家电在总线上暴露的每个寄存器对应一个 [`FieldId`]。表在编译期固定，
//! 进程生命周期内不变。每个字段携带三类元数据：
//!
//! - 线上名称（`wire_name`，与总线驱动约定的 camelCase 键）
//! - 结构形状（[`FieldShape`]，解码前的形状校验依据）
//! - 可写性（是否存在编码路径）

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// 字段标识
// ============================================================================

/// 洗碗机暴露的全部字段
///
/// 变体顺序即注册表顺序（控制台 `help`/`all` 的遍历顺序）。
/// 订阅优先级另见 [`FieldId::RELAY_PRIORITY`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum FieldId {
    /// 用户配置（3 字节打包位域，可写）
    UserConfiguration,
    /// 运行模式
    OperatingMode,
    /// 循环阶段
    CycleState,
    /// 循环状态（当前循环、步骤进度）
    CycleStatus,
    /// 门开合计数
    DoorCount,
    /// 循环历史环形缓冲槽 0
    CycleData0,
    /// 循环历史环形缓冲槽 1
    CycleData1,
    /// 循环历史环形缓冲槽 2
    CycleData2,
    /// 循环历史环形缓冲槽 3
    CycleData3,
    /// 循环历史环形缓冲槽 4
    CycleData4,
    /// 提醒位掩码（上报不可靠，最坏情况下只能轮询）
    Reminders,
    /// 循环计数统计
    CycleCounts,
    /// 故障状态
    Error,
    /// 注水/排水速率
    Rates,
    /// 连续循环测试配置
    ContinuousCycle,
    /// 模拟量诊断数据（持续上报大量无效数据）
    AnalogData,
    /// 干排水失败计数（无变化也持续上报）
    DryDrainCounters,
    /// UI 个性化配置（基本不变化，可写）
    Personality,
    /// 被禁用的功能位掩码
    DisabledFeatures,
    /// 控制面板锁定状态
    ControlLock,
}

/// 字段的结构形状
///
/// 解码前先按形状校验原始值，形状不符返回
/// [`ProtocolError::MalformedRecord`]；形状相符但值未识别时
/// 解码为 Unknown 记录，永不失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// 单个整数
    Integer,
    /// 固定长度字节序列
    Bytes(usize),
    /// 任意长度字节序列
    VariableBytes,
    /// 固定元数的整数元组
    Tuple(usize),
}

impl FieldShape {
    /// 形状的文字描述，用于错误信息
    pub fn expected_text(&self) -> String {
        match self {
            FieldShape::Integer => "integer".to_string(),
            FieldShape::Bytes(n) => format!("{n}-byte sequence"),
            FieldShape::VariableBytes => "byte sequence".to_string(),
            FieldShape::Tuple(n) => format!("{n}-element tuple"),
        }
    }
}

impl FieldId {
    /// 全部字段，注册表顺序
    pub const ALL: [FieldId; 20] = [
        FieldId::UserConfiguration,
        FieldId::OperatingMode,
        FieldId::CycleState,
        FieldId::CycleStatus,
        FieldId::DoorCount,
        FieldId::CycleData0,
        FieldId::CycleData1,
        FieldId::CycleData2,
        FieldId::CycleData3,
        FieldId::CycleData4,
        FieldId::Reminders,
        FieldId::CycleCounts,
        FieldId::Error,
        FieldId::Rates,
        FieldId::ContinuousCycle,
        FieldId::AnalogData,
        FieldId::DryDrainCounters,
        FieldId::Personality,
        FieldId::DisabledFeatures,
        FieldId::ControlLock,
    ];

    /// 实时转发的订阅优先级顺序
    ///
    /// 家电的协议限制：每次上电后，只有**最先订阅的九个**字段会推送
    /// 变更通知，其余字段只能读取。因此订阅顺序是有意义的——把最需要
    /// 实时性的字段排在前面（配置、循环历史、运行状态），把基本不变
    /// 或只会推送噪声的字段排在后面。
    pub const RELAY_PRIORITY: [FieldId; 20] = [
        FieldId::UserConfiguration,
        FieldId::CycleData0,
        FieldId::CycleData1,
        FieldId::CycleData2,
        FieldId::CycleData3,
        FieldId::CycleData4,
        FieldId::OperatingMode,
        FieldId::CycleState,
        FieldId::CycleStatus,
        FieldId::DoorCount,
        FieldId::Reminders,
        FieldId::CycleCounts,
        FieldId::Error,
        FieldId::Rates,
        FieldId::ContinuousCycle,
        FieldId::AnalogData,
        FieldId::DryDrainCounters,
        FieldId::Personality,
        FieldId::DisabledFeatures,
        FieldId::ControlLock,
    ];

    /// 可通过 `set <field> <n>` 写入裸整数的字段（控制台顺序）
    pub const NUMERIC_WRITABLE: [FieldId; 5] = [
        FieldId::OperatingMode,
        FieldId::DisabledFeatures,
        FieldId::Reminders,
        FieldId::ControlLock,
        FieldId::CycleState,
    ];

    /// 总线上的字段名
    pub fn wire_name(&self) -> &'static str {
        match self {
            FieldId::UserConfiguration => "userConfiguration",
            FieldId::OperatingMode => "operatingMode",
            FieldId::CycleState => "cycleState",
            FieldId::CycleStatus => "cycleStatus",
            FieldId::DoorCount => "doorCount",
            FieldId::CycleData0 => "cycleData0",
            FieldId::CycleData1 => "cycleData1",
            FieldId::CycleData2 => "cycleData2",
            FieldId::CycleData3 => "cycleData3",
            FieldId::CycleData4 => "cycleData4",
            FieldId::Reminders => "reminders",
            FieldId::CycleCounts => "cycleCounts",
            FieldId::Error => "error",
            FieldId::Rates => "rates",
            FieldId::ContinuousCycle => "continuousCycle",
            FieldId::AnalogData => "analogData",
            FieldId::DryDrainCounters => "dryDrainCounters",
            FieldId::Personality => "personality",
            FieldId::DisabledFeatures => "disabledFeatures",
            FieldId::ControlLock => "controlLock",
        }
    }

    /// 字段的结构形状
    pub fn shape(&self) -> FieldShape {
        match self {
            FieldId::UserConfiguration => FieldShape::Bytes(3),
            FieldId::OperatingMode
            | FieldId::CycleState
            | FieldId::DoorCount
            | FieldId::Reminders
            | FieldId::DisabledFeatures
            | FieldId::ControlLock => FieldShape::Integer,
            FieldId::CycleStatus => FieldShape::Tuple(5),
            FieldId::CycleData0
            | FieldId::CycleData1
            | FieldId::CycleData2
            | FieldId::CycleData3
            | FieldId::CycleData4 => FieldShape::Tuple(9),
            FieldId::CycleCounts => FieldShape::Tuple(3),
            FieldId::Error
            | FieldId::Rates
            | FieldId::ContinuousCycle
            | FieldId::DryDrainCounters
            | FieldId::Personality => FieldShape::Tuple(2),
            FieldId::AnalogData => FieldShape::VariableBytes,
        }
    }

    /// 是否存在编码路径（标量可写字段与两个复合可写字段）
    pub fn is_writable(&self) -> bool {
        self.is_numeric_writable()
            || matches!(self, FieldId::UserConfiguration | FieldId::Personality)
    }

    /// 是否允许裸整数写入（控制台 `set <field> <n>`）
    pub fn is_numeric_writable(&self) -> bool {
        FieldId::NUMERIC_WRITABLE.contains(self)
    }

    /// 注册表内的槽位下标（`ALL[field.index()] == field`）
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for FieldId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldId::ALL
            .iter()
            .copied()
            .find(|field| field.wire_name() == s)
            .ok_or_else(|| ProtocolError::UnknownField(s.to_string()))
    }
}
