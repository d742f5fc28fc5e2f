//! 用户配置与个性化字段
//!
//! `userConfiguration` 是 3 字节打包位域，每个字节按固定位区间拆分
//! 为多个独立子字段；编码是精确逆操作，并在提交总线前校验子字段
//! 取值范围。`personality` 是 2 元元组的可写复合字段。
//!
//! 注意：协议位序为 LSB first（位 0 为最低位），与 bilge 默认一致。

use crate::{FieldId, ProtocolError};
use bilge::prelude::*;

// ============================================================================
// 打包字节位域（线上布局）
// ============================================================================

/// 用户配置 Byte 0
///
/// - Bit 0-3: 延迟启动档位（合法值 0-3）
/// - Bit 4-5: 洗区选择
/// - Bit 6: 演示模式
/// - Bit 7: 静音（连按五次 Heated Dry 切换）
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy)]
struct ConfigByte0 {
    delay_start: u4, // Bit 0-3: 延迟启动
    zone: u2,        // Bit 4-5: 洗区
    demo_mode: bool, // Bit 6: 演示模式
    mute: bool,      // Bit 7: 静音
}

/// 用户配置 Byte 1
///
/// - Bit 0: 蒸汽
/// - Bit 1: 面板 UI 锁定
/// - Bit 2-3: 烘干选项（合法值 0-1）
/// - Bit 4-6: 洗涤温度（合法值 0-2）
/// - Bit 7: 漂洗剂（连按五次 Steam 切换）
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy)]
struct ConfigByte1 {
    steam: bool,     // Bit 0: 蒸汽
    ui_locked: bool, // Bit 1: UI 锁定
    dry_options: u2, // Bit 2-3: 烘干选项
    wash_temp: u3,   // Bit 4-6: 洗涤温度
    rinse_aid: bool, // Bit 7: 漂洗剂
}

/// 用户配置 Byte 2
///
/// - Bit 0: 奶瓶喷射
/// - Bit 1-4: 循环选择（合法值 0-3）
/// - Bit 5: 漏水检测
/// - Bit 6: 安息日模式（长按 Start 和 Wash Temp 五秒切换）
/// - Bit 7: 保留位
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy)]
struct ConfigByte2 {
    bottle_blast: bool, // Bit 0: 奶瓶喷射
    cycle: u4,          // Bit 1-4: 循环选择
    leak_detect: bool,  // Bit 5: 漏水检测
    sabbath: bool,      // Bit 6: 安息日模式
    spare: bool,        // Bit 7: 保留位
}

// ============================================================================
// 子字段枚举
// ============================================================================

/// 延迟启动档位
///
/// 线上占 4 位，但文档化取值只有 0-3；4-15 解码保留原值，编码拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DelayStart {
    None = 0,
    TwoHours = 1,
    FourHours = 2,
    EightHours = 3,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl DelayStart {
    /// 显示标签（None 与未知值不显示）
    pub fn label(&self) -> Option<&'static str> {
        match self {
            DelayStart::None => None,
            DelayStart::TwoHours => Some("2h"),
            DelayStart::FourHours => Some("4h"),
            DelayStart::EightHours => Some("8h"),
            DelayStart::Unknown(_) => None,
        }
    }
}

/// 烘干选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DryOptions {
    IdleDry = 0,
    HeatedDry = 1,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl DryOptions {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            DryOptions::IdleDry => Some("Idle Dry"),
            DryOptions::HeatedDry => Some("Heated Dry"),
            DryOptions::Unknown(_) => None,
        }
    }
}

/// 洗涤温度
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum WashTemperature {
    Normal = 0,
    Boost = 1,
    Sanitize = 2,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl WashTemperature {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            WashTemperature::Normal => Some("Normal"),
            WashTemperature::Boost => Some("Boost"),
            WashTemperature::Sanitize => Some("Sanitize"),
            WashTemperature::Unknown(_) => None,
        }
    }
}

/// 循环选择（用户配置里的选择项）
///
/// 注意与 [`crate::WashCycle`]（`cycleStatus` 上报的运行中循环）编码不同。
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CycleSelection {
    Autosense = 0,
    Heavy = 1,
    Normal = 2,
    Light = 3,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl CycleSelection {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            CycleSelection::Autosense => Some("Autosense"),
            CycleSelection::Heavy => Some("Heavy"),
            CycleSelection::Normal => Some("Normal"),
            CycleSelection::Light => Some("Light"),
            CycleSelection::Unknown(_) => None,
        }
    }
}

// ============================================================================
// 用户配置记录
// ============================================================================

/// 用户配置 (`userConfiguration`)
///
/// 原始形状：3 字节序列。解码把每个字节拆为独立子字段；
/// [`UserConfiguration::to_bytes`] 是精确逆操作，越界子字段在
/// 提交总线前被 [`ProtocolError::EncodeRange`] 拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct UserConfiguration {
    pub delay_start: DelayStart,
    /// 洗区选择（0 表示未选）
    pub zone: u8,
    pub demo_mode: bool,
    pub mute: bool,
    pub steam: bool,
    pub ui_locked: bool,
    pub dry_options: DryOptions,
    pub wash_temp: WashTemperature,
    pub rinse_aid: bool,
    pub bottle_blast: bool,
    pub cycle: CycleSelection,
    pub leak_detect: bool,
    pub sabbath: bool,
    /// Byte 2 的保留位（0x80）
    pub reserved: bool,
}

impl UserConfiguration {
    /// 从 3 字节线上布局解码（调用方已校验长度）
    pub fn from_bytes(data: [u8; 3]) -> Self {
        let b0 = ConfigByte0::from(data[0]);
        let b1 = ConfigByte1::from(data[1]);
        let b2 = ConfigByte2::from(data[2]);
        UserConfiguration {
            delay_start: DelayStart::from(b0.delay_start().value()),
            zone: b0.zone().value(),
            demo_mode: b0.demo_mode(),
            mute: b0.mute(),
            steam: b1.steam(),
            ui_locked: b1.ui_locked(),
            dry_options: DryOptions::from(b1.dry_options().value()),
            wash_temp: WashTemperature::from(b1.wash_temp().value()),
            rinse_aid: b1.rinse_aid(),
            bottle_blast: b2.bottle_blast(),
            cycle: CycleSelection::from(b2.cycle().value()),
            leak_detect: b2.leak_detect(),
            sabbath: b2.sabbath(),
            reserved: b2.spare(),
        }
    }

    /// 编码回 3 字节线上布局，先校验全部子字段取值范围
    pub fn to_bytes(&self) -> Result<[u8; 3], ProtocolError> {
        let delay = check_range("delay_start", u8::from(self.delay_start), 3)?;
        let zone = check_range("zone", self.zone, 3)?;
        let dry = check_range("dry_options", u8::from(self.dry_options), 1)?;
        let temp = check_range("wash_temp", u8::from(self.wash_temp), 2)?;
        let cycle = check_range("cycle", u8::from(self.cycle), 3)?;

        let b0 = ConfigByte0::new(u4::new(delay), u2::new(zone), self.demo_mode, self.mute);
        let b1 = ConfigByte1::new(
            self.steam,
            self.ui_locked,
            u2::new(dry),
            u3::new(temp),
            self.rinse_aid,
        );
        let b2 = ConfigByte2::new(
            self.bottle_blast,
            u4::new(cycle),
            self.leak_detect,
            self.sabbath,
            self.reserved,
        );
        Ok([u8::from(b0), u8::from(b1), u8::from(b2)])
    }
}

fn check_range(sub_field: &'static str, value: u8, max: u8) -> Result<u8, ProtocolError> {
    if value > max {
        return Err(ProtocolError::EncodeRange {
            field: FieldId::UserConfiguration,
            sub_field,
            value: value as u32,
            max: max as u32,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod user_configuration_tests {
    use super::*;

    #[test]
    fn test_decode_example_write() {
        // 蒸汽 + 加热烘干 + 高温消毒 + 漂洗剂；漏水检测
        let cfg = UserConfiguration::from_bytes([0x00, 0xA5, 0x20]);
        assert_eq!(cfg.delay_start, DelayStart::None);
        assert_eq!(cfg.zone, 0);
        assert!(!cfg.demo_mode);
        assert!(cfg.steam);
        assert!(!cfg.ui_locked);
        assert_eq!(cfg.dry_options, DryOptions::HeatedDry);
        assert_eq!(cfg.wash_temp, WashTemperature::Sanitize);
        assert!(cfg.rinse_aid);
        assert!(!cfg.bottle_blast);
        assert_eq!(cfg.cycle, CycleSelection::Autosense);
        assert!(cfg.leak_detect);
        assert!(!cfg.sabbath);
        assert!(!cfg.reserved);
    }

    #[test]
    fn test_decode_byte0_subfields() {
        let cfg = UserConfiguration::from_bytes([0x01 | 0x20 | 0x40 | 0x80, 0x00, 0x00]);
        assert_eq!(cfg.delay_start, DelayStart::TwoHours);
        assert_eq!(cfg.zone, 2);
        assert!(cfg.demo_mode);
        assert!(cfg.mute);
    }

    #[test]
    fn test_decode_unknown_subfield_preserved() {
        // delay 位域取 9：超出文档化范围但形状合法，解码保留原值
        let cfg = UserConfiguration::from_bytes([0x09, 0x00, 0x00]);
        assert_eq!(cfg.delay_start, DelayStart::Unknown(9));
    }

    #[test]
    fn test_encode_rejects_unknown_delay() {
        let cfg = UserConfiguration {
            delay_start: DelayStart::Unknown(9),
            ..default_config()
        };
        let err = cfg.to_bytes().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::EncodeRange {
                field: FieldId::UserConfiguration,
                sub_field: "delay_start",
                value: 9,
                max: 3,
            }
        );
    }

    #[test]
    fn test_encode_rejects_out_of_range_zone() {
        let cfg = UserConfiguration {
            zone: 4,
            ..default_config()
        };
        assert!(matches!(
            cfg.to_bytes(),
            Err(ProtocolError::EncodeRange {
                sub_field: "zone",
                value: 4,
                max: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_encode_rejects_unknown_wash_temp() {
        let cfg = UserConfiguration {
            wash_temp: WashTemperature::Unknown(5),
            ..default_config()
        };
        assert!(matches!(
            cfg.to_bytes(),
            Err(ProtocolError::EncodeRange {
                sub_field: "wash_temp",
                value: 5,
                max: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_encode_rejects_unknown_dry_options() {
        let cfg = UserConfiguration {
            dry_options: DryOptions::Unknown(3),
            ..default_config()
        };
        assert!(matches!(
            cfg.to_bytes(),
            Err(ProtocolError::EncodeRange {
                sub_field: "dry_options",
                value: 3,
                max: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_encode_rejects_unknown_cycle() {
        let cfg = UserConfiguration {
            cycle: CycleSelection::Unknown(9),
            ..default_config()
        };
        assert!(matches!(
            cfg.to_bytes(),
            Err(ProtocolError::EncodeRange {
                sub_field: "cycle",
                value: 9,
                max: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_roundtrip_example() {
        let cfg = UserConfiguration {
            delay_start: DelayStart::FourHours,
            zone: 1,
            demo_mode: false,
            mute: true,
            steam: true,
            ui_locked: false,
            dry_options: DryOptions::HeatedDry,
            wash_temp: WashTemperature::Boost,
            rinse_aid: true,
            bottle_blast: true,
            cycle: CycleSelection::Light,
            leak_detect: false,
            sabbath: true,
            reserved: false,
        };
        let bytes = cfg.to_bytes().unwrap();
        assert_eq!(UserConfiguration::from_bytes(bytes), cfg);
    }

    fn default_config() -> UserConfiguration {
        UserConfiguration {
            delay_start: DelayStart::None,
            zone: 0,
            demo_mode: false,
            mute: false,
            steam: false,
            ui_locked: false,
            dry_options: DryOptions::IdleDry,
            wash_temp: WashTemperature::Normal,
            rinse_aid: false,
            bottle_blast: false,
            cycle: CycleSelection::Autosense,
            leak_detect: false,
            sabbath: false,
            reserved: false,
        }
    }
}


// ============================================================================
// UI 个性化
// ============================================================================

/// 个性化配置来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum PersonalitySource {
    BootloadParametric = 0,
    AnalogDigital = 1,
    #[num_enum(catch_all)]
    Unknown(u32),
}

impl PersonalitySource {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            PersonalitySource::BootloadParametric => Some("Bootload Parametric"),
            PersonalitySource::AnalogDigital => Some("A/D"),
            PersonalitySource::Unknown(_) => None,
        }
    }
}

/// UI 个性化 (`personality`)
///
/// 原始形状：2 元元组 `[personality, source]`。
/// personality 取 0-14 为具体配置，15 表示无 UI 个性化
/// （UI 板可能是硬连线的）。写入按原始整数透传，不做范围校验。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Personality {
    pub personality: u32,
    pub source: PersonalitySource,
}

/// personality 的"无 UI 个性化"取值
pub const PERSONALITY_NONE: u32 = 15;

impl Personality {
    /// 从总线元组解码（调用方已校验元数）
    pub fn from_tuple(t: &[u32]) -> Self {
        Personality {
            personality: t[0],
            source: PersonalitySource::from(t[1]),
        }
    }

    /// 编码回 2 元元组
    pub fn to_tuple(&self) -> [u32; 2] {
        [self.personality, u32::from(self.source)]
    }
}

#[cfg(test)]
mod personality_tests {
    use super::*;

    #[test]
    fn test_from_tuple() {
        let p = Personality::from_tuple(&[3, 1]);
        assert_eq!(p.personality, 3);
        assert_eq!(p.source, PersonalitySource::AnalogDigital);
    }

    #[test]
    fn test_none_sentinel() {
        let p = Personality::from_tuple(&[PERSONALITY_NONE, 0]);
        assert_eq!(p.personality, 15);
        assert_eq!(p.source, PersonalitySource::BootloadParametric);
    }

    #[test]
    fn test_roundtrip() {
        let p = Personality {
            personality: 7,
            source: PersonalitySource::AnalogDigital,
        };
        assert_eq!(Personality::from_tuple(&p.to_tuple()), p);
    }

    #[test]
    fn test_unknown_source_preserved() {
        let p = Personality::from_tuple(&[0, 9]);
        assert_eq!(p.source, PersonalitySource::Unknown(9));
        assert_eq!(p.to_tuple(), [0, 9]);
    }
}
