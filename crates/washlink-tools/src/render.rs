//! 字段记录的人类可读描述
//!
//! 控制台逐行展示用的纯格式化函数：每种记录一个 `describe_*`，
//! [`describe_record`] 按变体分发。未识别的原始值一律带原值展示，
//! 不吞掉任何信息。

use washlink_protocol::{
    BitLabel, BitmaskRecord, ContinuousCycle, ControlLock, CycleCompletion, CycleCounts,
    CycleSnapshot, CycleState, CycleStatus, DryDrainCounters, ErrorStatus, FieldRecord,
    FlowRates, OperatingMode, Personality, RawValue, TemperatureRange, TurbidityRange,
    UserConfiguration, PERSONALITY_NONE,
};

use crate::timestamp::{describe_cycle_timestamp, describe_duration, describe_temp_f};

/// 整数的调试展示：十进制带十六进制/二进制补充，零显示为 `nil`
pub fn describe_integer(value: u32) -> String {
    if value != 0 {
        format!("{value} (0x{value:x}, 0b{value:b})")
    } else {
        "nil".to_string()
    }
}

/// 原始值的调试展示（`raw <field>` 用）
pub fn describe_raw(raw: &RawValue) -> String {
    match raw {
        RawValue::Integer(value) => describe_integer(*value),
        RawValue::Bytes(bytes) => {
            let parts: Vec<String> = bytes.iter().map(|b| describe_integer(*b as u32)).collect();
            format!("[{}]", parts.join(", "))
        }
        RawValue::Tuple(values) => {
            let parts: Vec<String> = values.iter().map(|v| describe_integer(*v)).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

/// 解码记录的展示文本
pub fn describe_record(record: &FieldRecord) -> String {
    match record {
        FieldRecord::UserConfiguration(cfg) => describe_user_configuration(cfg),
        FieldRecord::OperatingMode(mode) => describe_operating_mode(*mode),
        FieldRecord::CycleState(state) => describe_cycle_state(*state),
        FieldRecord::CycleStatus(status) => describe_cycle_status(status),
        FieldRecord::DoorCount(count) => describe_door_count(*count),
        FieldRecord::CycleSnapshot(snapshot) => describe_cycle_snapshot(snapshot),
        FieldRecord::Reminders(record) => describe_reminders(record),
        FieldRecord::CycleCounts(counts) => describe_cycle_counts(counts),
        FieldRecord::Error(error) => describe_error(error),
        FieldRecord::Rates(rates) => describe_rates(rates),
        FieldRecord::ContinuousCycle(cc) => describe_continuous_cycle(cc),
        FieldRecord::AnalogData(data) => describe_analog_data(data),
        FieldRecord::DryDrainCounters(counters) => describe_dry_drain_counters(counters),
        FieldRecord::Personality(personality) => describe_personality(personality),
        FieldRecord::DisabledFeatures(record) => describe_disabled_features(record),
        FieldRecord::ControlLock(lock) => describe_control_lock(*lock),
    }
}

pub fn describe_operating_mode(mode: OperatingMode) -> String {
    match mode.label() {
        Some(label) => label.to_string(),
        None => format!("<unknown: {}>", describe_integer(u32::from(mode))),
    }
}

pub fn describe_cycle_state(state: CycleState) -> String {
    match state.label() {
        Some(label) => label.to_string(),
        None => format!("<unknown: {}>", describe_integer(u32::from(state))),
    }
}

pub fn describe_cycle_status(status: &CycleStatus) -> String {
    let mut parts = Vec::new();
    match status.cycle.label() {
        Some(label) => parts.push(label.to_string()),
        None => parts.push(format!("cycleRunning={}", u32::from(status.cycle))),
    }
    parts.push(format!("activeCycle={}", status.active_cycle));
    parts.push(format!("activeCycleStep={}", status.active_cycle_step));
    if status.steps_estimated >= status.steps_executed {
        parts.push(format!(
            "[{}{}]",
            "#".repeat(status.steps_executed as usize),
            ".".repeat((status.steps_estimated - status.steps_executed) as usize)
        ));
    }
    parts.push(format!(
        "{}/{} steps",
        status.steps_executed, status.steps_estimated
    ));
    parts.join(", ")
}

pub fn describe_door_count(count: u32) -> String {
    format!("door opened and closed {count} times")
}

pub fn describe_cycle_counts(counts: &CycleCounts) -> String {
    format!(
        "completed {} of {} cycles, reset {} cycles",
        counts.completed, counts.started, counts.reset
    )
}

pub fn describe_rates(rates: &FlowRates) -> String {
    format!("fillRate={}, drainRate={}", rates.fill_rate, rates.drain_rate)
}

pub fn describe_dry_drain_counters(counters: &DryDrainCounters) -> String {
    format!(
        "dry drain failed {} times, limit: {}",
        counters.failed_count, counters.limit
    )
}

/// 模拟量原始帧：每字节两位十六进制，零字节显示为 `..`
pub fn describe_analog_data(data: &[u8]) -> String {
    let mut s = String::new();
    for octet in data {
        if *octet == 0 {
            s.push_str(" ..");
        } else {
            s.push_str(&format!(" {octet:02x}"));
        }
    }
    s
}

pub fn describe_disabled_features(record: &BitmaskRecord) -> String {
    describe_bitmask(record, "feature", "all features enabled")
}

pub fn describe_reminders(record: &BitmaskRecord) -> String {
    describe_bitmask(record, "reminder", "no reminders")
}

fn describe_bitmask(record: &BitmaskRecord, unknown_noun: &str, empty_text: &str) -> String {
    if record.is_empty() {
        return empty_text.to_string();
    }
    let parts: Vec<String> = record
        .flags
        .iter()
        .map(|flag| match flag {
            BitLabel::Known { label, .. } => label.clone(),
            BitLabel::Unknown { bit } => format!("<unknown {unknown_noun} with bit {bit}>"),
        })
        .collect();
    parts.join(", ")
}

pub fn describe_user_configuration(cfg: &UserConfiguration) -> String {
    let mut parts = Vec::new();
    if let Some(label) = cfg.delay_start.label() {
        parts.push(format!("Delay Start: {label}"));
    }
    if cfg.zone != 0 {
        parts.push(format!("Zone: {}", cfg.zone));
    }
    if cfg.demo_mode {
        parts.push("Demo Mode".to_string());
    }
    if cfg.mute {
        parts.push("Mute".to_string());
    }
    if cfg.steam {
        parts.push("Steam".to_string());
    }
    if cfg.ui_locked {
        parts.push("UI Locked".to_string());
    }
    match cfg.dry_options.label() {
        Some(label) => parts.push(format!("Dry Options: {label}")),
        None => parts.push(format!(
            "Dry Options <unknown value {}>",
            u8::from(cfg.dry_options)
        )),
    }
    match cfg.wash_temp.label() {
        Some(label) => parts.push(format!("Wash Temp: {label}")),
        None => parts.push(format!(
            "Wash Temp: <unknown value {}>",
            u8::from(cfg.wash_temp)
        )),
    }
    if cfg.rinse_aid {
        parts.push("Rinse Aid Enabled".to_string());
    }
    if cfg.bottle_blast {
        parts.push("Bottle Blast".to_string());
    }
    match cfg.cycle.label() {
        Some(label) => parts.push(format!("Cycle: {label}")),
        None => parts.push(format!("Cycle: <unknown cycle {}>", u8::from(cfg.cycle))),
    }
    if cfg.leak_detect {
        parts.push("Leak Detect Enabled".to_string());
    }
    if cfg.sabbath {
        parts.push("Sabbath Mode Enabled".to_string());
    }
    if cfg.reserved {
        parts.push("<reserved bit 0x800000 set>".to_string());
    }
    parts.join(", ")
}

pub fn describe_control_lock(lock: ControlLock) -> String {
    match lock.label() {
        Some(label) => label.to_string(),
        None => describe_integer(u32::from(lock)),
    }
}

pub fn describe_personality(personality: &Personality) -> String {
    let mut parts = Vec::new();
    if personality.personality == PERSONALITY_NONE {
        parts.push("no UI personality (UI board may be hard-wired)".to_string());
    } else if personality.personality < PERSONALITY_NONE {
        parts.push(format!("UI personality={}", personality.personality));
    } else {
        parts.push(format!("personality={}", personality.personality));
    }
    match personality.source.label() {
        Some(label) => parts.push(format!("source={label}")),
        None => parts.push(format!("source={}", u32::from(personality.source))),
    }
    parts.join(", ")
}

pub fn describe_error(error: &ErrorStatus) -> String {
    if error.is_cleared() {
        format!("cleared (was error {})", error.error_id)
    } else {
        format!("error {}; state {}", error.error_id, error.error_state)
    }
}

pub fn describe_continuous_cycle(cc: &ContinuousCycle) -> String {
    // 历史口径：间隔一栏直接把剩余循环数当秒数折算
    format!(
        "cycle number {}, {} cycles remaining, {} between cycles",
        cc.cycle_to_run,
        cc.cycles_remaining,
        describe_duration(cc.cycles_remaining as u64, false)
    )
}

pub fn describe_cycle_snapshot(snapshot: &CycleSnapshot) -> String {
    let mut parts = Vec::new();
    if snapshot.cycle_number != 0 {
        parts.push(format!("number={}", snapshot.cycle_number));
    }
    match snapshot.temperature {
        TemperatureRange::NoData => parts.push("no temperature data yet".to_string()),
        TemperatureRange::Fahrenheit { min, max } => parts.push(format!(
            "temp={}..{}",
            describe_temp_f(min),
            describe_temp_f(max)
        )),
    }
    if let Some(final_temp) = snapshot.final_temp_f {
        parts.push(format!("finalTemp={}", describe_temp_f(final_temp)));
    }
    match snapshot.turbidity {
        TurbidityRange::NoData => parts.push("no turbidity data yet".to_string()),
        TurbidityRange::Ntu { min, max } => parts.push(format!("turbidity={min}..{max} NTU")),
    }
    let started_secs = snapshot.cycle_time_minutes as u64 * 60;
    parts.push(format!("started {}", describe_cycle_timestamp(started_secs)));
    match snapshot.completion {
        CycleCompletion::Incomplete => parts.push("incomplete".to_string()),
        CycleCompletion::Completed => {
            let completed_secs = started_secs + snapshot.duration_minutes as u64 * 60;
            parts.push(format!(
                "completed {}",
                describe_cycle_timestamp(completed_secs)
            ));
        }
        CycleCompletion::Unknown(value) => parts.push(format!(
            "completed=<unrecognized value {}>",
            describe_integer(value)
        )),
    }
    parts.push(format!(
        "duration={}",
        describe_duration(snapshot.duration_minutes as u64 * 60, false)
    ));
    parts.join(", ")
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod render_tests {
    use super::*;
    use washlink_protocol::{
        CycleSelection, DelayStart, DryOptions, PersonalitySource, WashCycle, WashTemperature,
        DISABLED_FEATURE_BITS, REMINDER_BITS,
    };

    #[test]
    fn test_describe_integer_nonzero() {
        assert_eq!(describe_integer(42), "42 (0x2a, 0b101010)");
    }

    #[test]
    fn test_describe_integer_zero_is_nil() {
        assert_eq!(describe_integer(0), "nil");
    }

    #[test]
    fn test_describe_raw_tuple() {
        let raw = RawValue::tuple(&[13, 0]);
        assert_eq!(describe_raw(&raw), "[13 (0xd, 0b1101), nil]");
    }

    #[test]
    fn test_cycle_status_with_progress_bar() {
        let status = CycleStatus {
            cycle: WashCycle::Normal,
            active_cycle: 2,
            active_cycle_step: 4,
            steps_executed: 3,
            steps_estimated: 10,
        };
        assert_eq!(
            describe_cycle_status(&status),
            "normal, activeCycle=2, activeCycleStep=4, [###.......], 3/10 steps"
        );
    }

    #[test]
    fn test_cycle_status_unknown_cycle_and_no_bar() {
        let status = CycleStatus {
            cycle: WashCycle::Unknown(7),
            active_cycle: 0,
            active_cycle_step: 0,
            steps_executed: 5,
            steps_estimated: 3,
        };
        // 估计步数小于已执行步数时不画进度条
        assert_eq!(
            describe_cycle_status(&status),
            "cycleRunning=7, activeCycle=0, activeCycleStep=0, 5/3 steps"
        );
    }

    #[test]
    fn test_cycle_counts_text() {
        let counts = CycleCounts {
            started: 120,
            completed: 118,
            reset: 2,
        };
        assert_eq!(
            describe_cycle_counts(&counts),
            "completed 118 of 120 cycles, reset 2 cycles"
        );
    }

    #[test]
    fn test_analog_data_zero_octets_collapse() {
        assert_eq!(describe_analog_data(&[0x00, 0x0f, 0xa0]), " .. 0f a0");
    }

    #[test]
    fn test_disabled_features_empty_mask() {
        let record = BitmaskRecord::from_raw(0, &DISABLED_FEATURE_BITS);
        assert_eq!(describe_disabled_features(&record), "all features enabled");
    }

    #[test]
    fn test_disabled_features_known_and_unknown_bits() {
        let record = BitmaskRecord::from_raw(0x43, &DISABLED_FEATURE_BITS);
        assert_eq!(
            describe_disabled_features(&record),
            "Heated Dry, Boost, <unknown feature with bit 6>"
        );
    }

    #[test]
    fn test_reminders_empty_mask() {
        let record = BitmaskRecord::from_raw(0, &REMINDER_BITS);
        assert_eq!(describe_reminders(&record), "no reminders");
    }

    #[test]
    fn test_user_configuration_typical() {
        let cfg = UserConfiguration {
            delay_start: DelayStart::TwoHours,
            zone: 0,
            demo_mode: false,
            mute: false,
            steam: true,
            ui_locked: false,
            dry_options: DryOptions::HeatedDry,
            wash_temp: WashTemperature::Sanitize,
            rinse_aid: true,
            bottle_blast: false,
            cycle: CycleSelection::Autosense,
            leak_detect: true,
            sabbath: false,
            reserved: false,
        };
        assert_eq!(
            describe_user_configuration(&cfg),
            "Delay Start: 2h, Steam, Dry Options: Heated Dry, Wash Temp: Sanitize, \
             Rinse Aid Enabled, Cycle: Autosense, Leak Detect Enabled"
        );
    }

    #[test]
    fn test_user_configuration_unknown_subfields() {
        let cfg = UserConfiguration {
            delay_start: DelayStart::None,
            zone: 0,
            demo_mode: false,
            mute: false,
            steam: false,
            ui_locked: false,
            dry_options: DryOptions::Unknown(3),
            wash_temp: WashTemperature::Unknown(5),
            rinse_aid: false,
            bottle_blast: false,
            cycle: CycleSelection::Unknown(9),
            leak_detect: false,
            sabbath: false,
            reserved: true,
        };
        assert_eq!(
            describe_user_configuration(&cfg),
            "Dry Options <unknown value 3>, Wash Temp: <unknown value 5>, \
             Cycle: <unknown cycle 9>, <reserved bit 0x800000 set>"
        );
    }

    #[test]
    fn test_control_lock_labels() {
        assert_eq!(describe_control_lock(ControlLock::Locked), "Locked");
        assert_eq!(describe_control_lock(ControlLock::Unlocked), "Unlocked");
        assert_eq!(
            describe_control_lock(ControlLock::Unknown(3)),
            "3 (0x3, 0b11)"
        );
    }

    #[test]
    fn test_personality_none_sentinel() {
        let p = Personality {
            personality: PERSONALITY_NONE,
            source: PersonalitySource::BootloadParametric,
        };
        assert_eq!(
            describe_personality(&p),
            "no UI personality (UI board may be hard-wired), source=Bootload Parametric"
        );
    }

    #[test]
    fn test_personality_concrete() {
        let p = Personality {
            personality: 3,
            source: PersonalitySource::AnalogDigital,
        };
        assert_eq!(describe_personality(&p), "UI personality=3, source=A/D");
    }

    #[test]
    fn test_error_cleared_and_active() {
        assert_eq!(
            describe_error(&ErrorStatus {
                error_id: 13,
                error_state: 0
            }),
            "cleared (was error 13)"
        );
        assert_eq!(
            describe_error(&ErrorStatus {
                error_id: 13,
                error_state: 2
            }),
            "error 13; state 2"
        );
    }

    #[test]
    fn test_continuous_cycle_interval_quirk() {
        let cc = ContinuousCycle {
            cycle_to_run: 3,
            cycles_remaining: 120,
        };
        assert_eq!(
            describe_continuous_cycle(&cc),
            "cycle number 3, 120 cycles remaining, 2m between cycles"
        );
    }

    #[test]
    fn test_cycle_snapshot_no_data_sentinels() {
        let snapshot = CycleSnapshot::from_tuple(&[0, 255, 0, 0, 65535, 0, 0, 0, 0]);
        assert_eq!(
            describe_cycle_snapshot(&snapshot),
            "no temperature data yet, no turbidity data yet, \
             started on 2016-05-06 at 21:22, incomplete, duration=0m"
        );
    }

    #[test]
    fn test_cycle_snapshot_completed() {
        let snapshot = CycleSnapshot::from_tuple(&[7, 90, 140, 120, 10, 200, 0, 1, 95]);
        assert_eq!(
            describe_cycle_snapshot(&snapshot),
            "number=7, temp=32.2℃..60.0℃, finalTemp=48.9℃, turbidity=10..200 NTU, \
             started on 2016-05-06 at 21:22, completed on 2016-05-06 at 22:57, \
             duration=1h 35m"
        );
    }

    #[test]
    fn test_operating_mode_invalid_connection_label() {
        assert_eq!(
            describe_operating_mode(OperatingMode::InvalidConnection),
            "11 (try restarting, this usually indicates an invalid connection)"
        );
    }

    #[test]
    fn test_record_dispatch() {
        assert_eq!(
            describe_record(&FieldRecord::DoorCount(42)),
            "door opened and closed 42 times"
        );
        assert_eq!(
            describe_record(&FieldRecord::Rates(FlowRates {
                fill_rate: 48,
                drain_rate: 12
            })),
            "fillRate=48, drainRate=12"
        );
    }
}
