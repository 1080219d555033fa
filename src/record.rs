/*!
日志条目与输出载荷。

`LogEntry` 是进入队列的不可变值，由入口在调用时生成，工作线程恰好消费一次；
`LogMessage` 是交给输出目标的结构化载荷。
*/

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::Level;

/// 进程级静态标签（至少包含 `hostname`）
pub type Tags = BTreeMap<String, String>;

/// 队列中的日志条目
///
/// 创建后不可修改，只提供只读访问。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    level: Level,
    message: String,
}

impl LogEntry {
    /// 创建新的日志条目
    #[inline]
    pub fn new(level: Level, message: String) -> Self {
        Self { level, message }
    }

    /// 获取日志级别
    #[inline]
    pub fn level(&self) -> Level {
        self.level
    }

    /// 获取已渲染的消息内容
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 消费条目并返回消息内容
    #[inline]
    pub fn into_message(self) -> String {
        self.message
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// 交给输出目标的载荷
///
/// 线上格式：`{timestamp, level, message, tags}`，标签表在所有消息之间共享。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    /// RFC 3339 时间戳
    pub timestamp: String,
    /// 级别的字符串形式
    pub level: String,
    /// 消息正文
    pub message: String,
    /// 共享的只读标签表
    pub tags: Arc<Tags>,
}

impl LogMessage {
    /// 为条目构建载荷，时间戳取当前时间
    pub fn from_entry(entry: &LogEntry, tags: &Arc<Tags>) -> Self {
        Self {
            timestamp: rfc3339_now(),
            level: entry.level().as_str().to_string(),
            message: entry.message().to_string(),
            tags: Arc::clone(tags),
        }
    }

    /// 编码为 JSON 文本
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 当前本地时间，`YYYY-MM-DD HH:MM:SS`
#[inline]
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 当前本地时间，RFC 3339 格式（秒精度）
#[inline]
pub fn rfc3339_now() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> Arc<Tags> {
        let mut tags = Tags::new();
        tags.insert("hostname".to_string(), "test-host".to_string());
        Arc::new(tags)
    }

    #[test]
    fn test_entry_creation() {
        let entry = LogEntry::new(Level::Warn, "disk almost full".to_string());
        assert_eq!(entry.level(), Level::Warn);
        assert_eq!(entry.message(), "disk almost full");
        assert_eq!(entry.to_string(), "[WARN] disk almost full");
        assert_eq!(entry.into_message(), "disk almost full");
    }

    #[test]
    fn test_message_wire_shape() {
        let tags = tags();
        let entry = LogEntry::new(Level::Error, "boom".to_string());
        let message = LogMessage::from_entry(&entry, &tags);

        assert_eq!(message.level, "ERROR");
        assert!(Arc::ptr_eq(&message.tags, &tags));
        assert!(chrono::DateTime::parse_from_rfc3339(&message.timestamp).is_ok());

        let json = message.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["message"], "boom");
        assert_eq!(value["tags"]["hostname"], "test-host");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_local_timestamp_shape() {
        let ts = local_timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }
}
