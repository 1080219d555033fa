/*!
兜底输出。

当所有输出目标都失败或都不接收某条日志时，条目最终写入兜底输出；
拒绝、溢出与投递失败的提示同样经由这里。兜底输出接收所有级别且永不失败。
*/

use std::io::{self, Write};
use std::sync::Mutex;

use crate::record::{LogMessage, local_timestamp};
use crate::sink::Sink;
use crate::{Level, Result};

/// 兜底输出接口：必须接收所有级别，且写入不能失败
pub trait FallbackSink: Send + Sync {
    /// 写入一行文本
    fn write(&self, level: Level, line: &str);

    /// 写入结构化消息，编码失败时退回消息正文
    fn write_message(&self, level: Level, message: &LogMessage) {
        match message.to_json() {
            Ok(json) => self.write(level, &json),
            Err(_) => self.write(level, &message.message),
        }
    }
}

/// 写入标准错误的兜底输出
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrFallback;

impl StderrFallback {
    /// 创建新的兜底输出
    pub fn new() -> Self {
        Self
    }
}

impl FallbackSink for StderrFallback {
    fn write(&self, level: Level, line: &str) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{} - [{}] : {}", local_timestamp(), level, line);
    }
}

/// 记录到内存的兜底输出（用于测试和嵌入场景）
#[derive(Debug, Default)]
pub struct MemoryFallback {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryFallback {
    /// 创建新的内存兜底输出
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的行
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 所有记录拼接后的文本，每行带级别标签
    pub fn contents(&self) -> String {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(level, line)| format!("[{level}] {line}\n"))
            .collect()
    }

    /// 是否有记录包含指定文本
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|(_, line)| line.contains(needle))
    }

    /// 已记录的行数
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 是否尚无记录
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FallbackSink for MemoryFallback {
    fn write(&self, level: Level, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((level, line.to_string()));
    }
}

impl Sink for StderrFallback {
    fn accepts(&self, _level: Level) -> bool {
        true
    }

    fn deliver(&self, level: Level, message: &LogMessage) -> Result<()> {
        self.write_message(level, message);
        Ok(())
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

impl Sink for MemoryFallback {
    fn accepts(&self, _level: Level) -> bool {
        true
    }

    fn deliver(&self, level: Level, message: &LogMessage) -> Result<()> {
        self.write_message(level, message);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory-fallback"
    }
}
