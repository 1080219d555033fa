//! 日志级别定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// 日志级别枚举
///
/// 按紧急程度升序排列。`Unknown` 是无法识别的级别的哨兵值，
/// 用户代码不应主动使用，但分发器必须能够正常处理它。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Level {
    /// 调试级别 - 调试信息，用于开发阶段
    #[default]
    Debug = 0,
    /// 信息级别 - 常规信息，用于生产环境
    Info = 1,
    /// 警告级别 - 警告信息，需要关注但不会影响程序运行
    Warn = 2,
    /// 错误级别 - 错误信息，需要立即处理
    Error = 3,
    /// 致命级别 - 进程无法继续运行
    Fatal = 4,
    /// 未知级别 - 无效或无法识别的级别
    Unknown = 5,
}

impl Level {
    /// 所有级别，按升序排列
    pub const ALL: [Level; 6] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Fatal,
        Level::Unknown,
    ];

    /// 获取级别的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Unknown => "UNKNOWN",
        }
    }

    /// 级别在计数数组中的下标
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// ERROR 与 FATAL：队列饱和时也不能丢弃
    #[inline]
    pub fn is_high_priority(&self) -> bool {
        matches!(self, Level::Error | Level::Fatal)
    }

    /// DEBUG、INFO 与 WARN：负载过高时可以丢弃
    #[inline]
    pub fn is_low_priority(&self) -> bool {
        matches!(self, Level::Debug | Level::Info | Level::Warn)
    }

    /// 是否需要附带调用栈
    #[inline]
    pub fn wants_backtrace(&self) -> bool {
        self.is_high_priority()
    }
}

impl TryFrom<i64> for Level {
    type Error = Error;

    /// 从数值解析级别，超出范围时返回 [`Error::InvalidLevel`]
    fn try_from(raw: i64) -> Result<Self, Error> {
        match raw {
            0 => Ok(Level::Debug),
            1 => Ok(Level::Info),
            2 => Ok(Level::Warn),
            3 => Ok(Level::Error),
            4 => Ok(Level::Fatal),
            5 => Ok(Level::Unknown),
            _ => Err(Error::InvalidLevel(raw)),
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    /// 从字符串解析级别
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            "UNKNOWN" => Ok(Level::Unknown),
            _ => Err(Error::Config(format!("unrecognized level: {s}"))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}
