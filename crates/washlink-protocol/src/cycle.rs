//! 循环历史与计数类复合记录
//!
//! `cycleData0`-`cycleData4` 是五个环形缓冲槽，共用同一种复合解码；
//! 槽的身份由字段名承载，记录本身不含槽号。若干原始哨兵值解码为
//! 显式的"尚无数据"状态，而不是数值区间。

use crate::constants::{
    NTU_NO_DATA_MAX, NTU_NO_DATA_MIN, TEMP_NO_DATA_MAX_F, TEMP_NO_DATA_MIN_F,
};

// ============================================================================
// 循环快照（环形缓冲槽）
// ============================================================================

/// 循环温度范围
///
/// 原始哨兵 `min=255, max=0` 表示该循环尚未采到温度，
/// 解码为显式 `NoData` 而不是 "255..0"。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemperatureRange {
    NoData,
    Fahrenheit { min: u32, max: u32 },
}

/// 循环浊度范围（哨兵 `min=65535, max=0` 表示尚无数据）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TurbidityRange {
    NoData,
    Ntu { min: u32, max: u32 },
}

/// 循环完成标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum CycleCompletion {
    Incomplete = 0,
    Completed = 1,
    #[num_enum(catch_all)]
    Unknown(u32),
}

/// 循环快照 (`cycleData0`-`cycleData4`)
///
/// 原始形状：9 元整数元组
/// `[cycleNumber, minTempF, maxTempF, finalTempF, minNTU, maxNTU,
///   cycleTime, completed, durationMinutes]`
///
/// `cycle_time_minutes` 是自协议纪元
/// （[`crate::constants::CYCLE_EPOCH_MS`]）起的分钟数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CycleSnapshot {
    /// 循环序号（0 表示槽未被写过）
    pub cycle_number: u32,
    pub temperature: TemperatureRange,
    /// 最终循环水温（华氏度；0 表示未记录）
    pub final_temp_f: Option<u32>,
    pub turbidity: TurbidityRange,
    /// 循环起始时间，自纪元起的分钟数
    pub cycle_time_minutes: u32,
    pub completion: CycleCompletion,
    pub duration_minutes: u32,
}

impl CycleSnapshot {
    /// 从总线元组解码（调用方已校验元数）
    pub fn from_tuple(t: &[u32]) -> Self {
        let temperature = if t[1] == TEMP_NO_DATA_MIN_F && t[2] == TEMP_NO_DATA_MAX_F {
            TemperatureRange::NoData
        } else {
            TemperatureRange::Fahrenheit { min: t[1], max: t[2] }
        };
        let turbidity = if t[4] == NTU_NO_DATA_MIN && t[5] == NTU_NO_DATA_MAX {
            TurbidityRange::NoData
        } else {
            TurbidityRange::Ntu { min: t[4], max: t[5] }
        };
        CycleSnapshot {
            cycle_number: t[0],
            temperature,
            final_temp_f: if t[3] == 0 { None } else { Some(t[3]) },
            turbidity,
            cycle_time_minutes: t[6],
            completion: CycleCompletion::from(t[7]),
            duration_minutes: t[8],
        }
    }
}

#[cfg(test)]
mod cycle_snapshot_tests {
    use super::*;

    #[test]
    fn test_temperature_sentinel_decodes_to_no_data() {
        let snap = CycleSnapshot::from_tuple(&[1, 255, 0, 0, 100, 200, 0, 0, 0]);
        assert_eq!(snap.temperature, TemperatureRange::NoData);
    }

    #[test]
    fn test_temperature_range() {
        let snap = CycleSnapshot::from_tuple(&[1, 90, 140, 0, 100, 200, 0, 0, 0]);
        assert_eq!(
            snap.temperature,
            TemperatureRange::Fahrenheit { min: 90, max: 140 }
        );
    }

    #[test]
    fn test_partial_sentinel_is_not_no_data() {
        // 只有 min=255 且 max=0 同时成立才是哨兵
        let snap = CycleSnapshot::from_tuple(&[1, 255, 10, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            snap.temperature,
            TemperatureRange::Fahrenheit { min: 255, max: 10 }
        );
    }

    #[test]
    fn test_turbidity_sentinel() {
        let snap = CycleSnapshot::from_tuple(&[1, 90, 140, 0, 65535, 0, 0, 0, 0]);
        assert_eq!(snap.turbidity, TurbidityRange::NoData);
    }

    #[test]
    fn test_final_temp_zero_means_absent() {
        let snap = CycleSnapshot::from_tuple(&[1, 90, 140, 0, 10, 20, 0, 0, 0]);
        assert_eq!(snap.final_temp_f, None);
        let snap = CycleSnapshot::from_tuple(&[1, 90, 140, 120, 10, 20, 0, 0, 0]);
        assert_eq!(snap.final_temp_f, Some(120));
    }

    #[test]
    fn test_completion_values() {
        let snap = CycleSnapshot::from_tuple(&[1, 90, 140, 0, 10, 20, 0, 1, 95]);
        assert_eq!(snap.completion, CycleCompletion::Completed);
        let snap = CycleSnapshot::from_tuple(&[1, 90, 140, 0, 10, 20, 0, 7, 95]);
        assert_eq!(snap.completion, CycleCompletion::Unknown(7));
    }
}

// ============================================================================
// 计数与速率
// ============================================================================

/// 循环计数统计 (`cycleCounts`)
///
/// 原始形状：3 元元组 `[started, completed, reset]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleCounts {
    pub started: u32,
    pub completed: u32,
    pub reset: u32,
}

impl CycleCounts {
    pub fn from_tuple(t: &[u32]) -> Self {
        CycleCounts {
            started: t[0],
            completed: t[1],
            reset: t[2],
        }
    }
}

/// 注水/排水速率 (`rates`)
///
/// 原始形状：2 元元组 `[fillRate, drainRate]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FlowRates {
    pub fill_rate: u32,
    pub drain_rate: u32,
}

impl FlowRates {
    pub fn from_tuple(t: &[u32]) -> Self {
        FlowRates {
            fill_rate: t[0],
            drain_rate: t[1],
        }
    }
}

/// 连续循环测试配置 (`continuousCycle`)
///
/// 原始形状：2 元元组 `[cycleToRun, cyclesRemaining]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ContinuousCycle {
    pub cycle_to_run: u32,
    pub cycles_remaining: u32,
}

impl ContinuousCycle {
    pub fn from_tuple(t: &[u32]) -> Self {
        ContinuousCycle {
            cycle_to_run: t[0],
            cycles_remaining: t[1],
        }
    }
}

/// 故障状态 (`error`)
///
/// 原始形状：2 元元组 `[errorId, errorState]`。
/// `error_state == 0` 表示故障已清除（`error_id` 保留最后一次故障号）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ErrorStatus {
    pub error_id: u32,
    pub error_state: u32,
}

impl ErrorStatus {
    pub fn from_tuple(t: &[u32]) -> Self {
        ErrorStatus {
            error_id: t[0],
            error_state: t[1],
        }
    }

    /// 故障已清除
    pub fn is_cleared(&self) -> bool {
        self.error_state == 0
    }
}

/// 干排水失败计数 (`dryDrainCounters`)
///
/// 原始形状：2 元元组 `[failedCount, limit]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DryDrainCounters {
    pub failed_count: u32,
    pub limit: u32,
}

impl DryDrainCounters {
    pub fn from_tuple(t: &[u32]) -> Self {
        DryDrainCounters {
            failed_count: t[0],
            limit: t[1],
        }
    }
}

#[cfg(test)]
mod counter_tests {
    use super::*;

    #[test]
    fn test_cycle_counts() {
        let counts = CycleCounts::from_tuple(&[120, 118, 2]);
        assert_eq!(counts.started, 120);
        assert_eq!(counts.completed, 118);
        assert_eq!(counts.reset, 2);
    }

    #[test]
    fn test_error_cleared() {
        assert!(ErrorStatus::from_tuple(&[13, 0]).is_cleared());
        assert!(!ErrorStatus::from_tuple(&[13, 2]).is_cleared());
    }

    #[test]
    fn test_flow_rates() {
        let rates = FlowRates::from_tuple(&[42, 17]);
        assert_eq!(rates.fill_rate, 42);
        assert_eq!(rates.drain_rate, 17);
    }
}
