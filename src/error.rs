/*!
分发器的错误处理模块。

所有错误都是可恢复的：输出目标失败只会被记录并转交兜底输出，
从不传播给提交日志的调用方。
*/

use std::io;

/// 分发器的错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O错误，如文件写入失败
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 序列化错误，如消息无法编码为 JSON
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// 输出目标报告的投递失败
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// 配置错误，如无效的配置值
    #[error("configuration error: {0}")]
    Config(String),

    /// 超出范围的日志级别
    #[error("invalid logger level {0}")]
    InvalidLevel(i64),

    /// 分发器已经停止
    #[error("dispatcher is stopped")]
    Stopped,

    /// `log` 门面已经被设置
    #[error("logger already initialized")]
    AlreadyInitialized,

    /// 后台工作线程异常退出
    #[error("dispatch worker panicked")]
    WorkerPanicked,
}

/// 结果类型别名，简化错误处理
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::AlreadyInitialized;
        assert_eq!(err.to_string(), "logger already initialized");

        let err = Error::Stopped;
        assert_eq!(err.to_string(), "dispatcher is stopped");

        let err = Error::Config("buffer_len must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: buffer_len must be positive"
        );

        let err = Error::InvalidLevel(42);
        assert_eq!(err.to_string(), "invalid logger level 42");
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = io::Error::other("disk full").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
