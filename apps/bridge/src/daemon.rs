//! 桥接核心逻辑
//!
//! 总线侧起一条遥测会话（接入顺序用实时转发优先级），下游侧维持
//! 一条 TCP 连接：每条读响应和变更通知经末值缓存编码成一行下发。
//! 下游断开只影响下游——缓存继续更新，总线侧照常收数，重连成功
//! 后先把缓存原样重放（保留首次转发时的时间戳），再续上实时流。

use crossbeam_channel::{select, Receiver};
use std::time::{Duration, Instant, SystemTime};
use washlink_sdk::bus::{SimulatedDishwasher, SimulatorProfile};
use washlink_sdk::client::{
    unix_millis, RelayCache, RelayConnection, RelayError, SessionClient, SessionMonitor,
};
use washlink_sdk::driver::{DriverError, SessionBuilder, SessionConfig, TelemetryEvent};
use washlink_sdk::protocol::FieldId;

/// 事件循环的空转巡检间隔
const TICK: Duration = Duration::from_millis(250);

/// 活性检查间隔与陈旧阈值
const LIVENESS_INTERVAL: Duration = Duration::from_secs(30);
const STALE_THRESHOLD: Duration = Duration::from_secs(120);

/// 就绪等待上限
const READY_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// 配置
// ============================================================================

/// 桥接配置
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 下游 TCP 地址
    pub downstream: String,

    /// 下游重连间隔（毫秒）
    pub reconnect_ms: u64,

    /// 下游连接超时（毫秒）
    pub connect_timeout_ms: u64,

    /// 会话参数（接入顺序默认实时转发优先级）
    pub session: SessionConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let mut session = SessionConfig::default();
        session.adoption_order = FieldId::RELAY_PRIORITY.to_vec();
        BridgeConfig {
            downstream: "127.0.0.1:2000".to_string(),
            reconnect_ms: 2_000,
            connect_timeout_ms: 3_000,
            session,
        }
    }
}

impl BridgeConfig {
    /// 从用户配置目录加载；文件不存在时返回默认配置
    pub fn load() -> Result<Self, BridgeError> {
        let Some(mut path) = dirs::config_dir() else {
            return Ok(Self::default());
        };
        path.push("washlink");
        path.push("bridge.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| BridgeError::Config(format!("{}: {e}", path.display())))
    }
}

// ============================================================================
// 错误
// ============================================================================

#[derive(Debug)]
pub enum BridgeError {
    Config(String),
    Driver(DriverError),
    Relay(RelayError),
    Io(String),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::Config(msg) => write!(f, "config error: {msg}"),
            BridgeError::Driver(e) => write!(f, "session error: {e}"),
            BridgeError::Relay(e) => write!(f, "relay error: {e}"),
            BridgeError::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e.to_string())
    }
}

impl From<DriverError> for BridgeError {
    fn from(e: DriverError) -> Self {
        BridgeError::Driver(e)
    }
}

impl From<RelayError> for BridgeError {
    fn from(e: RelayError) -> Self {
        BridgeError::Relay(e)
    }
}

// ============================================================================
// 桥接进程
// ============================================================================

/// 下游连接状态
struct Downstream {
    addr: String,
    connect_timeout: Duration,
    retry_interval: Duration,
    conn: Option<RelayConnection>,
    next_attempt: Instant,
}

impl Downstream {
    fn new(config: &BridgeConfig) -> Self {
        Downstream {
            addr: config.downstream.clone(),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            retry_interval: Duration::from_millis(config.reconnect_ms),
            conn: None,
            next_attempt: Instant::now(),
        }
    }

    /// 到点就试一次重连；成功后由调用方重放缓存
    fn try_connect(&mut self) -> Option<&mut RelayConnection> {
        if self.conn.is_none() && Instant::now() >= self.next_attempt {
            match RelayConnection::connect(&self.addr, self.connect_timeout) {
                Ok(conn) => {
                    tracing::info!(peer = %conn.peer_text(), "downstream connected");
                    self.conn = Some(conn);
                },
                Err(e) => {
                    tracing::debug!(addr = %self.addr, error = %e, "downstream unreachable");
                    self.next_attempt = Instant::now() + self.retry_interval;
                },
            }
        }
        self.conn.as_mut()
    }

    /// 发一行；失败即断开并安排重连
    fn send(&mut self, message: &str) {
        if let Some(conn) = self.conn.as_mut() {
            if let Err(e) = conn.send_line(message) {
                tracing::warn!(error = %e, "downstream write failed, dropping connection");
                self.conn = None;
                self.next_attempt = Instant::now() + self.retry_interval;
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

pub struct BridgeDaemon {
    config: BridgeConfig,
    client: SessionClient,
    monitor: SessionMonitor,
    // 会话存活期间模拟器必须在场
    _sim: SimulatedDishwasher,
}

impl BridgeDaemon {
    /// 起模拟洗碗机与会话，等接入完成
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        let (bus, sim) = SimulatedDishwasher::spawn(SimulatorProfile::default());
        let session = SessionBuilder::new()
            .config(config.session.clone())
            .start(bus)?;
        let client = SessionClient::new(session);
        let monitor = SessionMonitor::spawn(client.subscribe()?);

        tracing::info!("waiting for field adoption to settle");
        client.wait_ready(READY_TIMEOUT)?;
        match client.device() {
            Some(device) => tracing::info!(
                address = %format!("{:x}", device.address),
                version = %device.version_text(),
                "session ready"
            ),
            None => tracing::info!("session ready"),
        }

        Ok(BridgeDaemon {
            config,
            client,
            monitor,
            _sim: sim,
        })
    }

    /// 事件循环（阻塞直到 shutdown 信号或会话结束）
    pub fn run(&mut self, shutdown: Receiver<()>) -> Result<(), BridgeError> {
        let events = self.client.subscribe()?;
        let mut cache = RelayCache::new();
        let mut downstream = Downstream::new(&self.config);
        let mut next_liveness = Instant::now() + LIVENESS_INTERVAL;

        loop {
            // 重连成功时先原样重放缓存，下游拿到每个字段的末值
            let was_connected = downstream.is_connected();
            if downstream.try_connect().is_some() && !was_connected {
                let replayed = cache.len();
                let lines: Vec<String> = cache.replay().map(str::to_string).collect();
                for line in &lines {
                    downstream.send(line);
                }
                if replayed > 0 {
                    tracing::info!(entries = replayed, "replayed cached field values");
                }
            }

            select! {
                recv(shutdown) -> _ => {
                    tracing::info!("shutdown requested");
                    return Ok(());
                },

                recv(events) -> msg => {
                    let event = msg.map_err(|_| BridgeError::Driver(DriverError::ChannelClosed))?;
                    match event {
                        TelemetryEvent::FieldRead { field, record, .. }
                        | TelemetryEvent::FieldChanged { field, record, .. } => {
                            let millis = unix_millis(SystemTime::now());
                            let message = cache.record(field, millis, &record)?;
                            downstream.send(&message);
                        },

                        TelemetryEvent::DecodeFailed { field, error } => {
                            tracing::warn!(%field, %error, "dropping undecodable update");
                        },

                        TelemetryEvent::SessionClosed { reason } => {
                            tracing::error!(%reason, "session closed");
                            return Err(BridgeError::Driver(DriverError::SessionThread(reason)));
                        },

                        _ => {},
                    }
                },

                default(TICK) => {},
            }

            if Instant::now() >= next_liveness {
                next_liveness = Instant::now() + LIVENESS_INTERVAL;
                self.log_liveness();
            }
        }
    }

    fn log_liveness(&self) {
        match self.monitor.idle_for() {
            Some(idle) if idle > STALE_THRESHOLD => {
                tracing::warn!(idle_secs = idle.as_secs(), "appliance has gone quiet");
            },
            Some(_) => {
                let stale = self.monitor.stale_fields(STALE_THRESHOLD);
                if !stale.is_empty() {
                    tracing::debug!(?stale, "fields without recent updates");
                }
            },
            None => tracing::warn!("no field updates observed yet"),
        }
        let timeouts = self.monitor.timeouts();
        if timeouts > 0 {
            tracing::debug!(timeouts, "cumulative request timeouts");
        }
    }
}

// ============================================================================
// 测试
// ============================================================================
