//! 配置管理命令
//!
//! 会话参数（节拍间隔、请求超时、刷新间隔）持久化在用户配置目录的
//! TOML 文件里，`shell` 与各 one-shot 子命令启动时加载。

use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::PathBuf;
use washlink_sdk::driver::SessionConfig;

/// 配置文件路径
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("washlink");
    Ok(path)
}

fn config_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 会话参数（缺省项落回驱动默认值）
    pub session: SessionConfig,
}

impl CliConfig {
    /// 加载配置；文件不存在时返回默认配置
    pub fn load() -> Result<Self> {
        let path = config_file()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置
    pub fn save(&self) -> Result<()> {
        let dir = config_dir()?;
        fs::create_dir_all(&dir).context("创建配置目录失败")?;
        let path = config_file()?;
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(&path, content)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示当前配置
    Show,

    /// 打印配置文件路径
    Path,

    /// 设置配置项
    Set {
        /// 相邻两次总线下发之间的最小间隔（毫秒）
        #[arg(long)]
        min_spacing_ms: Option<u64>,

        /// 单字段请求超时（毫秒）
        #[arg(long)]
        request_timeout_ms: Option<u64>,

        /// 周期性全量读刷新间隔（毫秒），0 关闭
        #[arg(long)]
        refresh_interval_ms: Option<u64>,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                let config = CliConfig::load()?;
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            },

            ConfigCommand::Path => {
                println!("{}", config_file()?.display());
                Ok(())
            },

            ConfigCommand::Set {
                min_spacing_ms,
                request_timeout_ms,
                refresh_interval_ms,
            } => {
                let mut config = CliConfig::load()?;
                if let Some(spacing) = min_spacing_ms {
                    config.session.min_spacing_ms = spacing;
                    println!("min_spacing_ms = {spacing}");
                }
                if let Some(timeout) = request_timeout_ms {
                    config.session.request_timeout_ms = timeout;
                    println!("request_timeout_ms = {timeout}");
                }
                if let Some(interval) = refresh_interval_ms {
                    config.session.refresh_interval_ms = interval;
                    println!("refresh_interval_ms = {interval}");
                }
                config.save()
            },
        }
    }
}
