//! 会话配置
//!
//! 时间参数一律以毫秒整数存储，方便直接进出 TOML。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use washlink_protocol::FieldId;

/// 会话时序与接入配置
///
/// # 默认值
///
/// - 下发间隔 500ms：家电侧处理不过来更密的请求
/// - 请求超时 10s：读阶段与订阅阶段共用
/// - 全量刷新 60s：队列非空时跳过整轮
/// - 保活读关闭：需要时设为若干秒，会话会周期性读门计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 相邻两次总线下发之间的最小间隔（毫秒）
    pub min_spacing_ms: u64,

    /// 单字段请求超时（毫秒），读阶段与订阅阶段各自独立计时
    pub request_timeout_ms: u64,

    /// 周期性全量读刷新间隔（毫秒），0 关闭
    pub refresh_interval_ms: u64,

    /// 保活读（门计数）间隔（毫秒），None 关闭
    pub keep_alive_ms: Option<u64>,

    /// 字段接入顺序
    ///
    /// 家电每次上电后只有最先订阅的九个字段会推送变更通知，顺序
    /// 决定哪些字段拿到实时性。默认注册表顺序；转发场景应换成
    /// [`FieldId::RELAY_PRIORITY`]。
    pub adoption_order: Vec<FieldId>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            min_spacing_ms: 500,
            request_timeout_ms: 10_000,
            refresh_interval_ms: 60_000,
            keep_alive_ms: None,
            adoption_order: FieldId::ALL.to_vec(),
        }
    }
}

impl SessionConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 刷新间隔，0 表示关闭
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_ms > 0).then(|| Duration::from_millis(self.refresh_interval_ms))
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        self.keep_alive_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.min_spacing(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.keep_alive(), None);
        assert_eq!(config.adoption_order, FieldId::ALL.to_vec());
    }

    #[test]
    fn test_zero_refresh_disables() {
        let config = SessionConfig {
            refresh_interval_ms: 0,
            ..SessionConfig::default()
        };
        assert_eq!(config.refresh_interval(), None);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SessionConfig =
            toml::from_str("min_spacing_ms = 250\nkeep_alive_ms = 30000\n").unwrap();
        assert_eq!(config.min_spacing_ms, 250);
        assert_eq!(config.keep_alive(), Some(Duration::from_secs(30)));
        assert_eq!(config.request_timeout_ms, 10_000);
    }

    #[test]
    fn test_adoption_order_uses_wire_names() {
        let config: SessionConfig =
            toml::from_str("adoption_order = [\"doorCount\", \"operatingMode\"]\n").unwrap();
        assert_eq!(
            config.adoption_order,
            vec![FieldId::DoorCount, FieldId::OperatingMode]
        );
    }
}
