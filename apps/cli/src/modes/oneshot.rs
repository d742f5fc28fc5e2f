//! One-shot 模式
//!
//! 每次子命令独立走一遍：起模拟洗碗机、建会话、等就绪、执行、退出。
//! 适合脚本和 CI；交互式调试用 `shell`。

use anyhow::{Context, Result};
use std::time::Duration;
use washlink_sdk::bus::{SimulatedDishwasher, SimulatorProfile};
use washlink_sdk::client::SessionClient;
use washlink_sdk::driver::{SessionBuilder, SessionConfig};
use washlink_sdk::protocol::FieldId;
use washlink_sdk::tools::{describe_raw, describe_record};

/// 就绪等待上限（探测 + 空接入，正常情况远快于此）
const READY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OneShotMode {
    client: SessionClient,
    request_timeout: Duration,
    // 会话存活期间模拟器必须在场
    _sim: SimulatedDishwasher,
}

impl OneShotMode {
    /// 起模拟器并等会话就绪
    ///
    /// 接入列表留空：one-shot 只做显式读写，不订阅变更。
    pub fn new(mut config: SessionConfig) -> Result<Self> {
        let (bus, sim) = SimulatedDishwasher::spawn(SimulatorProfile::default());
        tracing::debug!("simulated dishwasher spawned");
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        config.adoption_order = Vec::new();
        config.refresh_interval_ms = 0;

        let session = SessionBuilder::new()
            .config(config)
            .start(bus)
            .context("启动会话失败")?;
        let client = SessionClient::new(session);
        client
            .wait_ready(READY_TIMEOUT)
            .context("等待会话就绪超时")?;

        Ok(OneShotMode {
            client,
            request_timeout,
            _sim: sim,
        })
    }

    /// 读单个字段并打印
    pub fn read(&self, field: FieldId, raw: bool) -> Result<()> {
        let sample = self
            .client
            .read_field(field, self.request_timeout)
            .with_context(|| format!("读取 {field} 失败"))?;
        if raw {
            println!("{field}: {}", describe_raw(&sample.raw));
        } else {
            println!("{field}: {}", describe_record(&sample.record));
        }
        Ok(())
    }

    /// 写数值字段并回读确认
    pub fn write(&self, field: FieldId, value: u32) -> Result<()> {
        self.client
            .write_number(field, value)
            .with_context(|| format!("写入 {field} 失败"))?;
        self.read(field, false)
    }

    /// 按注册表顺序读全部字段
    pub fn read_all(&self) -> Result<()> {
        for field in FieldId::ALL {
            self.read(field, false)?;
        }
        Ok(())
    }
}
