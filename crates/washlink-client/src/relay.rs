//! 遥测中继：末值缓存与下行线格式
//!
//! 下行协议是文本行：每条更新编码成
//! `{unix 毫秒}\0{字段名}\0{记录 JSON}`，经 TCP 以换行结尾发送。
//! 缓存按字段保存**最后一条已编码消息**；下游（重）连上时先把缓存
//! 原样重放一遍（带原始时间戳），再继续转发实时更新。
//!
//! 缓存和编码在这里；套接字循环（重连节奏、断线丢弃）由守护进程
//! 自己组织。下游断连从不影响总线侧工作。

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use washlink_protocol::{FieldId, FieldRecord};

/// 中继层错误
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Relay I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Downstream address did not resolve: {0}")]
    UnresolvedAddress(String),
}

/// 把 `SystemTime` 折算成 unix 毫秒（早于纪元按 0 计）
pub fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// 编码一条下行消息（不含行尾换行）
pub fn encode_message(
    millis: u64,
    field: FieldId,
    record: &FieldRecord,
) -> Result<String, RelayError> {
    let json = serde_json::to_string(record)?;
    Ok(format!("{millis}\0{field}\0{json}"))
}

/// 末值缓存
///
/// 每个字段一个槽位，`record` 覆盖旧条目。重放顺序是注册表顺序
/// （下行协议不约定顺序）。
#[derive(Debug, Default)]
pub struct RelayCache {
    entries: [Option<String>; FieldId::ALL.len()],
}

impl RelayCache {
    pub fn new() -> Self {
        RelayCache::default()
    }

    /// 缓存一条更新，返回编码好的消息供立即转发
    pub fn record(
        &mut self,
        field: FieldId,
        millis: u64,
        record: &FieldRecord,
    ) -> Result<String, RelayError> {
        let message = encode_message(millis, field, record)?;
        self.entries[field.index()] = Some(message.clone());
        Ok(message)
    }

    /// 重放全部缓存消息（原文，含原始时间戳）
    pub fn replay(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.is_none())
    }
}

/// 与下游的一条 TCP 连接
///
/// 只负责建连和逐行发送；什么时候重连、断线期间丢弃什么，由持有
/// 者决定。
pub struct RelayConnection {
    stream: TcpStream,
}

impl RelayConnection {
    /// 带超时建连（地址每次重新解析，DNS 变更随重连生效）
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self, RelayError> {
        let resolved = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| RelayError::UnresolvedAddress(addr.to_string()))?;
        let stream = TcpStream::connect_timeout(&resolved, timeout)?;
        stream.set_nodelay(true)?;
        Ok(RelayConnection { stream })
    }

    /// 发送一条消息，补上行尾换行
    pub fn send_line(&mut self, message: &str) -> Result<(), RelayError> {
        self.stream.write_all(message.as_bytes())?;
        self.stream.write_all(b"\n")?;
        Ok(())
    }

    /// 对端地址的展示文本
    pub fn peer_text(&self) -> String {
        self.stream
            .peer_addr()
            .map_or_else(|_| "<unknown>".to_string(), |a| a.to_string())
    }
}

// ============================================================================
// 测试
// ============================================================================

#[cfg(test)]
mod relay_cache_tests {
    use super::*;
    use washlink_protocol::cycle::FlowRates;

    #[test]
    fn test_message_wire_format() {
        let message = encode_message(
            1_700_000_000_123,
            FieldId::DoorCount,
            &FieldRecord::DoorCount(42),
        )
        .unwrap();
        assert_eq!(message, "1700000000123\0doorCount\0{\"doorCount\":42}");
    }

    #[test]
    fn test_nested_record_uses_camel_case_keys() {
        let message = encode_message(
            7,
            FieldId::Rates,
            &FieldRecord::Rates(FlowRates {
                fill_rate: 48,
                drain_rate: 12,
            }),
        )
        .unwrap();
        assert_eq!(
            message,
            "7\0rates\0{\"rates\":{\"fillRate\":48,\"drainRate\":12}}"
        );
    }

    #[test]
    fn test_record_replaces_previous_entry() {
        let mut cache = RelayCache::new();
        cache
            .record(FieldId::DoorCount, 100, &FieldRecord::DoorCount(1))
            .unwrap();
        cache
            .record(FieldId::DoorCount, 200, &FieldRecord::DoorCount(2))
            .unwrap();
        assert_eq!(cache.len(), 1);
        let replayed: Vec<&str> = cache.replay().collect();
        assert_eq!(replayed, vec!["200\0doorCount\0{\"doorCount\":2}"]);
    }

    #[test]
    fn test_replay_is_verbatim_with_original_timestamp() {
        let mut cache = RelayCache::new();
        let first = cache
            .record(FieldId::DoorCount, 111, &FieldRecord::DoorCount(5))
            .unwrap();
        let second = cache
            .record(
                FieldId::ControlLock,
                222,
                &FieldRecord::ControlLock(washlink_protocol::status::ControlLock::Locked),
            )
            .unwrap();
        // 重放的内容逐字节等于当初转发的消息
        let replayed: Vec<&str> = cache.replay().collect();
        assert_eq!(replayed, vec![first.as_str(), second.as_str()]);
        assert!(replayed[0].starts_with("111\0"));
        assert!(replayed[1].starts_with("222\0"));
    }

    #[test]
    fn test_empty_cache_replays_nothing() {
        let cache = RelayCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.replay().count(), 0);
    }
}
