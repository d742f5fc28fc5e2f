//! 会话构造器
//!
//! 链式调整会话配置，最后挂上总线启动。配置项含义见
//! [`SessionConfig`](crate::config::SessionConfig)。

use crate::config::SessionConfig;
use crate::error::DriverError;
use crate::session::ApplianceSession;
use std::time::Duration;
use washlink_bus::SplittableBus;
use washlink_protocol::FieldId;

/// [`ApplianceSession`] 的链式构造器
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn new() -> Self {
        SessionBuilder {
            config: SessionConfig::default(),
        }
    }

    /// 整体替换配置（通常来自 TOML）
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// 相邻两次下发之间的最小间隔
    pub fn min_spacing(mut self, spacing: Duration) -> Self {
        self.config.min_spacing_ms = spacing.as_millis() as u64;
        self
    }

    /// 单个请求的响应超时
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// 周期全量刷新间隔，`None` 关闭
    pub fn refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.refresh_interval_ms = interval.map_or(0, |d| d.as_millis() as u64);
        self
    }

    /// 保活读间隔，`None` 关闭
    pub fn keep_alive(mut self, interval: Option<Duration>) -> Self {
        self.config.keep_alive_ms = interval.map(|d| d.as_millis() as u64);
        self
    }

    /// 接入字段及顺序（默认全字段注册表顺序）
    pub fn adoption_order<I>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = FieldId>,
    {
        self.config.adoption_order = order.into_iter().collect();
        self
    }

    /// 在给定总线上启动会话
    pub fn start<B>(self, bus: B) -> Result<ApplianceSession, DriverError>
    where
        B: SplittableBus,
        B::Rx: 'static,
        B::Tx: 'static,
    {
        ApplianceSession::new(bus, self.config)
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn test_default_builder_matches_default_config() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.config, SessionConfig::default());
    }

    #[test]
    fn test_chained_overrides() {
        let builder = SessionBuilder::new()
            .min_spacing(Duration::from_millis(250))
            .request_timeout(Duration::from_secs(5))
            .refresh_interval(Some(Duration::from_secs(30)))
            .keep_alive(Some(Duration::from_secs(15)))
            .adoption_order([FieldId::DoorCount, FieldId::OperatingMode]);
        assert_eq!(builder.config.min_spacing_ms, 250);
        assert_eq!(builder.config.request_timeout_ms, 5_000);
        assert_eq!(builder.config.refresh_interval_ms, 30_000);
        assert_eq!(builder.config.keep_alive_ms, Some(15_000));
        assert_eq!(
            builder.config.adoption_order,
            vec![FieldId::DoorCount, FieldId::OperatingMode]
        );
    }

    #[test]
    fn test_refresh_interval_none_disables() {
        let builder = SessionBuilder::new().refresh_interval(None);
        assert_eq!(builder.config.refresh_interval_ms, 0);
        assert!(builder.config.refresh_interval().is_none());
    }
}
