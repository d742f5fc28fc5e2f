//! 遥测桥主入口
//!
//! 常驻进程：总线侧保持洗碗机会话，下游侧把解码后的字段更新逐行
//! 转发给网络对端。单例文件锁防止重复实例抢总线节拍。

mod daemon;
mod singleton;

use clap::Parser;
use daemon::{BridgeConfig, BridgeDaemon};
use singleton::SingletonLock;
use std::process;

/// Washlink 遥测桥
///
/// 常驻进程，将洗碗机遥测经 TCP 转发给下游采集端
#[derive(Parser, Debug)]
#[command(name = "washlink_bridge")]
#[command(about = "Telemetry bridge forwarding decoded appliance updates to a network peer", long_about = None)]
#[command(version)]
struct Args {
    /// 下游 TCP 地址（覆盖配置文件）
    ///
    /// 格式: IP:PORT (例如: 127.0.0.1:2000)
    #[arg(long)]
    downstream: Option<String>,

    /// 下游重连间隔（毫秒，覆盖配置文件）
    #[arg(long)]
    reconnect_ms: Option<u64>,

    /// 锁文件路径
    ///
    /// 默认: 自动选择用户可写目录（XDG_RUNTIME_DIR 或 /tmp）
    #[arg(long)]
    lock_file: Option<String>,

    /// 日志目录（启用每日轮转的文件日志；缺省输出到 stderr）
    #[arg(long)]
    log_dir: Option<String>,
}

/// 获取默认锁文件路径
///
/// 优先使用用户可写的目录，避免权限问题：
/// 1. XDG_RUNTIME_DIR（Linux，通常为 /run/user/{uid}）
/// 2. /tmp（所有 Unix 系统）
/// 3. 用户主目录下的 .cache/washlink 目录（最后备选）
fn get_default_lock_file() -> String {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        let path = std::path::Path::new(&runtime_dir).join("washlink_bridge.lock");
        if let Some(parent) = path.parent()
            && (parent.exists() || std::fs::create_dir_all(parent).is_ok())
        {
            return path.to_string_lossy().to_string();
        }
    }

    let tmp_path = std::path::Path::new("/tmp").join("washlink_bridge.lock");
    if tmp_path.parent().map(|p| p.exists()).unwrap_or(false) {
        return tmp_path.to_string_lossy().to_string();
    }

    if let Ok(home) = std::env::var("HOME") {
        let cache_dir = std::path::Path::new(&home).join(".cache").join("washlink");
        if std::fs::create_dir_all(&cache_dir).is_ok() {
            let path = cache_dir.join("washlink_bridge.lock");
            return path.to_string_lossy().to_string();
        }
    }

    "/tmp/washlink_bridge.lock".to_string()
}

/// 初始化日志；文件模式下返回的 guard 要活到进程结束
fn init_logging(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("washlink_bridge=info".parse().unwrap());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "washlink_bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        },
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        },
    }
}

fn main() {
    let mut args = Args::parse();
    let _log_guard = init_logging(args.log_dir.as_deref());

    let lock_file = args.lock_file.take().unwrap_or_else(get_default_lock_file);
    let _lock = match SingletonLock::try_lock(&lock_file) {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("Failed to acquire singleton lock: {e}");
            eprintln!("Another instance of washlink_bridge may be running.");
            eprintln!("Lock file: {lock_file}");
            process::exit(1);
        },
    };

    let mut config = match BridgeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load bridge config: {e}");
            process::exit(1);
        },
    };
    if let Some(downstream) = args.downstream.take() {
        config.downstream = downstream;
    }
    if let Some(reconnect_ms) = args.reconnect_ms {
        config.reconnect_ms = reconnect_ms;
    }

    // Ctrl+C 走通道优雅退出，事件循环收尾后再放锁
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    }) {
        eprintln!("Failed to set signal handler: {e}");
        process::exit(1);
    }

    tracing::info!(downstream = %config.downstream, lock_file = %lock_file, "bridge starting");

    let mut bridge = match BridgeDaemon::new(config) {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!(error = %e, "failed to start bridge");
            process::exit(1);
        },
    };

    if let Err(e) = bridge.run(shutdown_rx) {
        tracing::error!(error = %e, "bridge exited with error");
        process::exit(1);
    }
    tracing::info!("bridge stopped");
}
