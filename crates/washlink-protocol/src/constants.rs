//! 协议常量定义

/// 循环时间戳纪元（Unix 毫秒）
///
/// `cycleData` 槽中的 `cycleTime` 以该纪元起的分钟数表示。
pub const CYCLE_EPOCH_MS: u64 = 1_462_569_778_000;

/// 温度"尚无数据"哨兵：最小值
pub const TEMP_NO_DATA_MIN_F: u32 = 255;

/// 温度"尚无数据"哨兵：最大值
pub const TEMP_NO_DATA_MAX_F: u32 = 0;

/// 浊度"尚无数据"哨兵：最小值
pub const NTU_NO_DATA_MIN: u32 = 65535;

/// 浊度"尚无数据"哨兵：最大值
pub const NTU_NO_DATA_MAX: u32 = 0;

/// 上电后会推送变更通知的订阅槽数量
///
/// 家电的协议限制，超出此数量的订阅只注册不推送。
pub const LIVE_UPDATE_SLOTS: usize = 9;
