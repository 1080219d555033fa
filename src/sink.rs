/*!
日志输出目标。

输出目标只需要满足两点：按级别决定是否接收（纯判断，无副作用），
以及投递一条 [`LogMessage`]，失败时返回可恢复的错误而不是崩溃。
*/

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::format::{Formatter, JsonFormatter};
use crate::record::LogMessage;
use crate::{Error, Level, Result};

/// 输出目标接口
pub trait Sink: Send + Sync {
    /// 是否接收该级别的消息
    fn accepts(&self, level: Level) -> bool;

    /// 投递一条消息
    fn deliver(&self, level: Level, message: &LogMessage) -> Result<()>;

    /// 刷新输出缓冲区（队列清空时调用）
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// 关闭输出目标（排空完成后调用）
    fn shutdown(&self) -> Result<()> {
        self.flush()
    }

    /// 用于诊断信息的名称
    fn name(&self) -> &str {
        "sink"
    }
}

/// 控制台输出目标
pub struct ConsoleSink {
    min_level: Level,
    /// 是否使用标准错误输出
    stderr: bool,
    formatter: Arc<dyn Formatter>,
}

impl ConsoleSink {
    /// 创建新的控制台输出目标（标准输出，JSON 格式）
    pub fn new(min_level: Level) -> Self {
        Self {
            min_level,
            stderr: false,
            formatter: Arc::new(JsonFormatter::new()),
        }
    }

    /// 创建使用标准错误输出的控制台输出目标
    pub fn stderr(min_level: Level) -> Self {
        Self {
            stderr: true,
            ..Self::new(min_level)
        }
    }

    /// 替换格式化器
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(Level::Debug)
    }
}

impl Sink for ConsoleSink {
    fn accepts(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn deliver(&self, _level: Level, message: &LogMessage) -> Result<()> {
        let data = self.formatter.format(message)?;
        if self.stderr {
            io::stderr().lock().write_all(&data)?;
        } else {
            io::stdout().lock().write_all(&data)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if self.stderr {
            io::stderr().flush()?;
        } else {
            io::stdout().flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// 文件输出目标（追加写入，带缓冲）
pub struct FileSink {
    min_level: Level,
    writer: Mutex<BufWriter<File>>,
    formatter: Arc<dyn Formatter>,
}

impl FileSink {
    /// 创建新的文件输出目标
    pub fn new<P: AsRef<Path>>(path: P, min_level: Level) -> Result<Self> {
        Self::with_buffer_size(path, min_level, 8 * 1024)
    }

    /// 创建带缓冲区大小的文件输出目标
    pub fn with_buffer_size<P: AsRef<Path>>(
        path: P,
        min_level: Level,
        buffer_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref();

        // 确保父目录存在
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            min_level,
            writer: Mutex::new(BufWriter::with_capacity(buffer_size, file)),
            formatter: Arc::new(JsonFormatter::new()),
        })
    }

    /// 替换格式化器
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

impl Sink for FileSink {
    fn accepts(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn deliver(&self, _level: Level, message: &LogMessage) -> Result<()> {
        let data = self.formatter.format(message)?;
        let mut writer = self.writer.lock().map_err(|_| io::Error::other("lock poisoned"))?;
        writer.write_all(&data)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().map_err(|_| io::Error::other("lock poisoned"))?;
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// 内存输出目标（用于测试和调试）
pub struct MemorySink {
    min_level: Level,
    messages: Mutex<Vec<LogMessage>>,
}

impl MemorySink {
    /// 创建接收所有级别的内存输出目标
    pub fn new() -> Self {
        Self::with_min_level(Level::Debug)
    }

    /// 创建带最低级别的内存输出目标
    pub fn with_min_level(min_level: Level) -> Self {
        Self {
            min_level,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// 已接收的消息
    pub fn messages(&self) -> Vec<LogMessage> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 已接收的消息数
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 是否尚未接收任何消息
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否有消息正文包含指定文本
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|m| m.message.contains(needle))
    }

    /// 清空缓冲区
    pub fn clear(&self) {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn accepts(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn deliver(&self, _level: Level, message: &LogMessage) -> Result<()> {
        let mut messages = self.messages.lock().map_err(|_| io::Error::other("lock poisoned"))?;
        messages.push(message.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// 空输出目标（用于性能测试）
#[derive(Default)]
pub struct NullSink;

impl NullSink {
    /// 创建新的空输出目标
    pub fn new() -> Self {
        Self
    }
}

impl Sink for NullSink {
    fn accepts(&self, _level: Level) -> bool {
        true
    }

    fn deliver(&self, _level: Level, _message: &LogMessage) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// 消息总线发布端
///
/// 具体的总线客户端由集成方提供。
pub trait Publisher: Send + Sync {
    /// 向主题发布一条负载
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<()>;

    /// 等待已发布的负载被总线确认
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// 连接是否可用
    fn is_connected(&self) -> bool {
        true
    }
}

/// 消息总线输出目标：以 JSON 格式发布到指定主题
pub struct PublisherSink {
    min_level: Level,
    subject: String,
    publisher: Arc<dyn Publisher>,
    formatter: Arc<dyn Formatter>,
}

impl PublisherSink {
    /// 默认主题
    pub const DEFAULT_SUBJECT: &'static str = "logs";

    /// 创建新的消息总线输出目标
    pub fn new(publisher: Arc<dyn Publisher>, min_level: Level) -> Self {
        Self {
            min_level,
            subject: Self::DEFAULT_SUBJECT.to_string(),
            publisher,
            formatter: Arc::new(JsonFormatter::new()),
        }
    }

    /// 设置发布主题
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// 发布主题
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Sink for PublisherSink {
    fn accepts(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn deliver(&self, _level: Level, message: &LogMessage) -> Result<()> {
        if !self.publisher.is_connected() {
            return Err(Error::Delivery(
                "publisher connection is closed or not initialized".to_string(),
            ));
        }

        let mut payload = self.formatter.format(message)?;
        if payload.last() == Some(&b'\n') {
            payload.pop();
        }
        self.publisher.publish(&self.subject, &payload)?;
        self.publisher.flush()
    }

    fn name(&self) -> &str {
        "publisher"
    }
}
