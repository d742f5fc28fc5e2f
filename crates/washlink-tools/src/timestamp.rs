//! 时长、时间戳与温度的展示格式
//!
//! 协议里的循环时间戳是自家电纪元
//! （[`CYCLE_EPOCH_MS`]）起的分钟数，展示时折算为 UTC 民用日期。
//! 温度线上用华氏度，展示时转摄氏并保留一位小数。

use chrono::{DateTime, Utc};
use std::time::SystemTime;
use washlink_protocol::CYCLE_EPOCH_MS;

/// 把秒数格式化成 `1d 2h 3m` 样式
///
/// `include_seconds` 为假时分钟按就近取整，且始终显示分钟段
/// （零时长显示为 `0m`）；为真时补上秒段，分钟向下取整。
/// 小时段对天数取模、分钟段对小时取模，进位不回写——
/// 59 分 30 秒在不含秒的模式下显示为 `0m`，与面板口径一致。
pub fn describe_duration(total_seconds: u64, include_seconds: bool) -> String {
    let seconds = total_seconds % 60;
    let minutes = if include_seconds {
        (total_seconds / 60) % 60
    } else {
        ((total_seconds + 30) / 60) % 60
    };
    let hours = (total_seconds / 3600) % 24;
    let days = total_seconds / 86400;

    let mut result = String::new();
    if days > 0 {
        result.push_str(&format!("{days}d"));
    }
    if !result.is_empty() || hours > 0 {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(&format!("{hours}h"));
    }
    if !result.is_empty() || minutes > 0 || !include_seconds {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(&format!("{minutes}m"));
    }
    if include_seconds {
        if !result.is_empty() {
            result.push(' ');
        }
        result.push_str(&format!("{seconds}s"));
    }
    result
}

/// 家电纪元起的秒数 → `on YYYY-MM-DD at HH:MM`（UTC）
pub fn describe_cycle_timestamp(seconds_since_cycle_epoch: u64) -> String {
    let unix_secs = (seconds_since_cycle_epoch + CYCLE_EPOCH_MS / 1000) as i64;
    match DateTime::from_timestamp(unix_secs, 0) {
        Some(at) => at.format("on %Y-%m-%d at %H:%M").to_string(),
        // chrono 可表示范围之外，协议值不会走到这里
        None => format!("at unix {unix_secs}"),
    }
}

/// 华氏度 → `NN.N℃`
pub fn describe_temp_f(fahrenheit: u32) -> String {
    format!("{:.1}℃", (fahrenheit as f64 - 32.0) * 5.0 / 9.0)
}

/// 墙钟时刻 → `YYYY-MM-DD HH:MM:SS`（UTC，日志前缀用）
pub fn wall_clock_text(at: SystemTime) -> String {
    DateTime::<Utc>::from(at)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod duration_tests {
    use super::*;

    #[test]
    fn test_zero_without_seconds_shows_minutes() {
        assert_eq!(describe_duration(0, false), "0m");
    }

    #[test]
    fn test_zero_with_seconds() {
        assert_eq!(describe_duration(0, true), "0s");
    }

    #[test]
    fn test_minutes_round_to_nearest_without_seconds() {
        assert_eq!(describe_duration(90, false), "2m");
        assert_eq!(describe_duration(89, false), "1m");
    }

    #[test]
    fn test_minutes_truncate_with_seconds() {
        assert_eq!(describe_duration(90, true), "1m 30s");
    }

    #[test]
    fn test_full_breakdown() {
        assert_eq!(describe_duration(90_061, true), "1d 1h 1m 1s");
        assert_eq!(describe_duration(3_900, false), "1h 5m");
    }

    #[test]
    fn test_seconds_only_skips_empty_minutes() {
        assert_eq!(describe_duration(45, true), "45s");
    }

    #[test]
    fn test_hours_segment_appears_when_days_present() {
        // 天数非零时小时段即使为 0 也显示
        assert_eq!(describe_duration(86_400 + 120, false), "1d 0h 2m");
    }
}

#[cfg(test)]
mod timestamp_tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_cycle_epoch_origin() {
        // 纪元零点：2016-05-06 21:22:58 UTC
        assert_eq!(describe_cycle_timestamp(0), "on 2016-05-06 at 21:22");
    }

    #[test]
    fn test_cycle_epoch_offset_minutes() {
        assert_eq!(describe_cycle_timestamp(120), "on 2016-05-06 at 21:24");
    }

    #[test]
    fn test_wall_clock_format() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(wall_clock_text(at), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_wall_clock_epoch_origin() {
        assert_eq!(wall_clock_text(UNIX_EPOCH), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_wall_clock_leap_day() {
        // 2016 闰年 2 月末
        let at = UNIX_EPOCH + Duration::from_secs(1_456_704_000);
        assert_eq!(wall_clock_text(at), "2016-02-29 00:00:00");
    }

    #[test]
    fn test_temp_conversion() {
        assert_eq!(describe_temp_f(32), "0.0℃");
        assert_eq!(describe_temp_f(140), "60.0℃");
        assert_eq!(describe_temp_f(100), "37.8℃");
    }
}
