//! # Washlink CLI
//!
//! 洗碗机遥测控制台。
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于 CI/脚本）
//!
//! ```bash
//! # 读单个字段
//! washlink-cli read doorCount
//!
//! # 写数值字段并回读确认
//! washlink-cli write controlLock 85
//! ```
//!
//! ### REPL 模式（推荐用于调试）
//!
//! ```bash
//! $ washlink-cli shell
//! dishwasher> doorCount
//! dishwasher> raw cycleData0
//! dishwasher> set operatingMode 2
//! dishwasher> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use washlink_sdk::protocol::FieldId;

mod commands;
mod modes;

use commands::{CliConfig, ConfigCommand};
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;

/// Washlink CLI - 洗碗机遥测命令行工具
#[derive(Parser, Debug)]
#[command(name = "washlink-cli")]
#[command(about = "Interactive dishwasher console over the appliance bus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 启动交互式控制台（REPL 模式）
    Shell,

    /// 读单个字段
    Read {
        /// 字段线上名（camelCase，如 doorCount）
        field: String,

        /// 按原始值展示（不解码）
        #[arg(long)]
        raw: bool,
    },

    /// 写数值字段并回读确认
    Write {
        /// 字段线上名（仅数值可写字段）
        field: String,

        /// 要写入的整数值
        value: u32,
    },

    /// 按注册表顺序读全部字段
    All,

    /// 列出全部字段线上名
    Fields,
}

/// 解析字段名，错误信息沿用控制台措辞
fn parse_field(name: &str) -> Result<FieldId> {
    name.parse::<FieldId>()
        .map_err(|_| anyhow::anyhow!("Field not recognised: \"{name}\""))
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("washlink_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),

        Commands::Shell => {
            let config = CliConfig::load()?;
            run_repl(config.session)
        },

        Commands::Read { field, raw } => {
            // 先解析字段名，省得为一条错误信息起整套会话
            let field = parse_field(&field)?;
            let config = CliConfig::load()?;
            let mode = OneShotMode::new(config.session)?;
            mode.read(field, raw)
        },

        Commands::Write { field, value } => {
            let field = parse_field(&field)?;
            if !field.is_numeric_writable() {
                anyhow::bail!("Field is not writable: \"{field}\"");
            }
            let config = CliConfig::load()?;
            let mode = OneShotMode::new(config.session)?;
            mode.write(field, value)
        },

        Commands::All => {
            let config = CliConfig::load()?;
            let mode = OneShotMode::new(config.session)?;
            mode.read_all()
        },

        Commands::Fields => {
            for field in FieldId::ALL {
                println!("{field}");
            }
            Ok(())
        },
    }
}
