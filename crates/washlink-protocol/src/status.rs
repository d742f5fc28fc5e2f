//! 状态类字段解码
//!
//! 标量枚举（运行模式、循环阶段）、位掩码（禁用功能、提醒）以及
//! 循环状态元组。所有枚举通过 `catch_all` 保留未识别的原始值，
//! 解码永不失败。

// ============================================================================
// 运行模式
// ============================================================================

/// 运行模式 (`operatingMode`)
///
/// 值含义：
/// - 0: 低功耗待机
/// - 1: 上电
/// - 2: 待机
/// - 3: 延迟启动
/// - 4: 暂停
/// - 5: 循环运行中
/// - 6: 循环结束
/// - 7: 固件下载模式
/// - 8: 传感器检查模式
/// - 9: 负载激活模式
/// - 11: 无效连接哨兵——总线驱动偶发上报的占位设备会返回该值，
///   会话建立时用它探测并丢弃假设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum OperatingMode {
    LowPower = 0,
    PowerUp = 1,
    Standby = 2,
    DelayStart = 3,
    Pause = 4,
    CycleActive = 5,
    EndOfCycle = 6,
    DownloadMode = 7,
    SensorCheckMode = 8,
    LoadActivationMode = 9,
    InvalidConnection = 11,
    #[num_enum(catch_all)]
    Unknown(u32),
}

impl OperatingMode {
    /// 已知状态的显示标签（未识别值返回 None，由渲染层兜底）
    pub fn label(&self) -> Option<&'static str> {
        match self {
            OperatingMode::LowPower => Some("Low Power"),
            OperatingMode::PowerUp => Some("Power Up"),
            OperatingMode::Standby => Some("Standby"),
            OperatingMode::DelayStart => Some("Delay Start"),
            OperatingMode::Pause => Some("Pause"),
            OperatingMode::CycleActive => Some("Cycle Active"),
            OperatingMode::EndOfCycle => Some("End of Cycle"),
            OperatingMode::DownloadMode => Some("Download Mode"),
            OperatingMode::SensorCheckMode => Some("Sensor Check Mode"),
            OperatingMode::LoadActivationMode => {
                Some("Load Activation Mode")
            }
            OperatingMode::InvalidConnection => {
                Some("11 (try restarting, this usually indicates an invalid connection)")
            }
            OperatingMode::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod operating_mode_tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(OperatingMode::from(2), OperatingMode::Standby);
        assert_eq!(OperatingMode::from(5), OperatingMode::CycleActive);
        assert_eq!(OperatingMode::from(11), OperatingMode::InvalidConnection);
    }

    #[test]
    fn test_unknown_value_preserved() {
        assert_eq!(OperatingMode::from(10), OperatingMode::Unknown(10));
        assert_eq!(OperatingMode::from(250), OperatingMode::Unknown(250));
        assert_eq!(u32::from(OperatingMode::Unknown(250)), 250);
    }

    #[test]
    fn test_labels() {
        assert_eq!(OperatingMode::Standby.label(), Some("Standby"));
        assert_eq!(OperatingMode::Unknown(10).label(), None);
    }
}

// ============================================================================
// 循环阶段
// ============================================================================

/// 循环阶段 (`cycleState`)
///
/// 值含义：
/// - 1: 预洗
/// - 2: 感应
/// - 3: 主洗
/// - 4: 烘干
/// - 5: 高温消毒
/// - 6: 浊度传感器校准
/// - 7: 分流器校准
/// - 8: 暂停
/// - 9: 漂洗
/// - 10: 循环空闲
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum CycleState {
    PreWash = 1,
    Sensing = 2,
    MainWash = 3,
    Drying = 4,
    Sanitizing = 5,
    TurbidityCalibration = 6,
    DiverterCalibration = 7,
    Pause = 8,
    Rinsing = 9,
    CycleInactive = 10,
    #[num_enum(catch_all)]
    Unknown(u32),
}

impl CycleState {
    /// 已知阶段的显示标签
    pub fn label(&self) -> Option<&'static str> {
        match self {
            CycleState::PreWash => Some("PreWash"),
            CycleState::Sensing => Some("Sensing"),
            CycleState::MainWash => Some("MainWash"),
            CycleState::Drying => Some("Drying"),
            CycleState::Sanitizing => Some("Sanitizing"),
            CycleState::TurbidityCalibration => Some("Turbidity Calibration"),
            CycleState::DiverterCalibration => Some("Diverter Calibration"),
            CycleState::Pause => Some("Pause"),
            CycleState::Rinsing => Some("Rinsing"),
            CycleState::CycleInactive => Some("Cycle Inactive"),
            CycleState::Unknown(_) => None,
        }
    }
}


// ============================================================================
// 循环状态
// ============================================================================

/// 当前运行的洗涤循环 (`cycleStatus` 的首元素)
///
/// 注意与 [`crate::CycleSelection`]（用户配置里的循环**选择**）编码不同：
/// 这里是面板上报的运行中循环标识，取值离散。
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum WashCycle {
    Inactive = 0,
    Autosense = 1,
    Heavy = 3,
    Normal = 6,
    Light = 11,
    #[num_enum(catch_all)]
    Unknown(u32),
}

impl WashCycle {
    /// 已知循环的显示标签
    pub fn label(&self) -> Option<&'static str> {
        match self {
            WashCycle::Inactive => Some("inactive"),
            WashCycle::Autosense => Some("autosense"),
            WashCycle::Heavy => Some("heavy"),
            WashCycle::Normal => Some("normal"),
            WashCycle::Light => Some("light"),
            WashCycle::Unknown(_) => None,
        }
    }
}

/// 循环状态 (`cycleStatus`)
///
/// 原始形状：5 元整数元组
/// `[cycleRunning, activeCycle, activeCycleStep, stepsExecuted, stepsEstimated]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CycleStatus {
    pub cycle: WashCycle,
    pub active_cycle: u32,
    pub active_cycle_step: u32,
    pub steps_executed: u32,
    pub steps_estimated: u32,
}

impl CycleStatus {
    /// 从总线元组解码（调用方已校验元数）
    pub fn from_tuple(t: &[u32]) -> Self {
        CycleStatus {
            cycle: WashCycle::from(t[0]),
            active_cycle: t[1],
            active_cycle_step: t[2],
            steps_executed: t[3],
            steps_estimated: t[4],
        }
    }
}


// ============================================================================
// 位掩码字段
// ============================================================================

/// 禁用功能位表 (`disabledFeatures`)，按位序
pub const DISABLED_FEATURE_BITS: [&str; 6] = [
    "Heated Dry",   // bit 0
    "Boost",        // bit 1
    "Sanitize",     // bit 2
    "Wash Zones",   // bit 3
    "Steam",        // bit 4
    "Bottle Blast", // bit 5
];

/// 提醒位表 (`reminders`)，按位序
pub const REMINDER_BITS: [&str; 3] = [
    "Clean Filter",  // bit 0
    "Add Rinse Aid", // bit 1
    "Sanitized",     // bit 2
];

/// 位掩码中单个置位的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BitLabel {
    /// 位表内的已知位
    Known { bit: u8, label: String },
    /// 超出位表的未知位，保留位号
    Unknown { bit: u8 },
}

impl BitLabel {
    pub fn bit(&self) -> u8 {
        match self {
            BitLabel::Known { bit, .. } => *bit,
            BitLabel::Unknown { bit } => *bit,
        }
    }
}

/// 位掩码字段的解码结果
///
/// 每个置位要么命中位表成为 `Known`，要么成为携带位号的 `Unknown`——
/// 任何置位都不会被静默丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitmaskRecord {
    /// 原始掩码值
    pub raw: u32,
    /// 置位的分类，按位序
    pub flags: Vec<BitLabel>,
}

impl BitmaskRecord {
    /// 按位表解码掩码
    pub fn from_raw(raw: u32, table: &[&str]) -> Self {
        let mut flags = Vec::new();
        for bit in 0..32u8 {
            if raw & (1 << bit) == 0 {
                continue;
            }
            match table.get(bit as usize) {
                Some(label) => flags.push(BitLabel::Known {
                    bit,
                    label: (*label).to_string(),
                }),
                None => flags.push(BitLabel::Unknown { bit }),
            }
        }
        BitmaskRecord { raw, flags }
    }

    /// 没有任何置位
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[cfg(test)]
mod bitmask_tests {
    use super::*;

    #[test]
    fn test_known_bits() {
        let rec = BitmaskRecord::from_raw(0x05, &DISABLED_FEATURE_BITS);
        assert_eq!(rec.flags.len(), 2);
        assert_eq!(
            rec.flags[0],
            BitLabel::Known {
                bit: 0,
                label: "Heated Dry".to_string()
            }
        );
        assert_eq!(
            rec.flags[1],
            BitLabel::Known {
                bit: 2,
                label: "Sanitize".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_bit_not_dropped() {
        let rec = BitmaskRecord::from_raw(0x41, &DISABLED_FEATURE_BITS);
        assert_eq!(rec.flags.len(), 2);
        assert_eq!(rec.flags[1], BitLabel::Unknown { bit: 6 });
    }

    #[test]
    fn test_empty_mask() {
        let rec = BitmaskRecord::from_raw(0, &REMINDER_BITS);
        assert!(rec.is_empty());
        assert_eq!(rec.raw, 0);
    }

    #[test]
    fn test_every_set_bit_classified() {
        // 任意掩码：置位数 == 分类数，且位号一一对应
        for raw in [0x01u32, 0xFF, 0x8000_0001, 0xFFFF_FFFF, 0x1234_5678] {
            let rec = BitmaskRecord::from_raw(raw, &REMINDER_BITS);
            assert_eq!(rec.flags.len(), raw.count_ones() as usize);
            for flag in &rec.flags {
                assert_ne!(raw & (1u32 << flag.bit()), 0);
            }
        }
    }
}

// ============================================================================
// 控制面板锁定
// ============================================================================

/// 控制面板锁定状态 (`controlLock`)
///
/// 魔数编码：0x55 锁定，0xAA 解锁。
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ControlLock {
    Locked = 0x55,
    Unlocked = 0xAA,
    #[num_enum(catch_all)]
    Unknown(u32),
}

impl ControlLock {
    /// 已知状态的显示标签
    pub fn label(&self) -> Option<&'static str> {
        match self {
            ControlLock::Locked => Some("Locked"),
            ControlLock::Unlocked => Some("Unlocked"),
            ControlLock::Unknown(_) => None,
        }
    }
}
