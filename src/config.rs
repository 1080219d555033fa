/*!
JSON 形式的声明式配置。

```rust
use logfan::Configuration;

let config = Configuration::from_json(r#"{"use_console": true, "console_level": "INFO"}"#).unwrap();
let dispatcher = config.init(None).unwrap();
dispatcher.stop().unwrap();
```
*/

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::builder::DispatcherBuilder;
use crate::dispatcher::Dispatcher;
use crate::fallback::{FallbackSink, StderrFallback};
use crate::record::Tags;
use crate::format::OutputFormat;
use crate::sink::{Publisher, PublisherSink};
use crate::{Error, Level, Result};

/// 分发器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// 缓冲长度（队列容量为其 10 倍）
    pub buffer_len: usize,
    /// 是否输出到控制台
    pub use_console: bool,
    /// 控制台最低级别
    pub console_level: Level,
    /// 控制台输出格式
    pub console_format: OutputFormat,
    /// 控制台是否写入标准错误而不是标准输出
    pub console_stderr: bool,
    /// 是否发布到消息总线
    pub use_publisher: bool,
    /// 消息总线主题
    pub publisher_subject: String,
    /// 消息总线最低级别
    pub publisher_level: Level,
    /// 附加到每条消息的标签
    pub tags: Tags,
    /// ERROR/FATAL 是否附带调用栈
    pub capture_backtraces: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            buffer_len: 100,
            use_console: false,
            console_level: Level::Debug,
            console_format: OutputFormat::Json,
            console_stderr: false,
            use_publisher: false,
            publisher_subject: PublisherSink::DEFAULT_SUBJECT.to_string(),
            publisher_level: Level::Debug,
            tags: Tags::new(),
            capture_backtraces: true,
        }
    }
}

impl Configuration {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 文本解析
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件读取
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// 检查配置值
    pub fn validate(&self) -> Result<()> {
        if self.buffer_len == 0 {
            return Err(Error::Config("buffer_len must be positive".to_string()));
        }
        if self.use_publisher && self.publisher_subject.is_empty() {
            return Err(Error::Config("publisher_subject must not be empty".to_string()));
        }
        Ok(())
    }

    /// 转换为构建器；启用了消息总线但未提供发布端时跳过该输出目标
    pub fn into_builder(self, publisher: Option<Arc<dyn Publisher>>) -> DispatcherBuilder {
        self.into_builder_with_fallback(publisher, Arc::new(StderrFallback::new()))
    }

    /// 转换为构建器，并指定兜底输出
    pub fn into_builder_with_fallback(
        self,
        publisher: Option<Arc<dyn Publisher>>,
        fallback: Arc<dyn FallbackSink>,
    ) -> DispatcherBuilder {
        let mut builder = DispatcherBuilder::new()
            .buffer_len(self.buffer_len)
            .capture_backtraces(self.capture_backtraces)
            .fallback(fallback.clone());

        for (key, value) in self.tags {
            builder = builder.tag(key, value);
        }

        if self.use_console {
            builder = if self.console_stderr {
                builder.with_stderr_output(self.console_level, self.console_format)
            } else {
                builder.with_console_output_formatted(self.console_level, self.console_format)
            };
        }

        if self.use_publisher {
            match publisher {
                Some(publisher) => {
                    let sink = PublisherSink::new(publisher, self.publisher_level)
                        .with_subject(self.publisher_subject);
                    builder = builder.sink(Arc::new(sink));
                }
                None => fallback.write(
                    Level::Warn,
                    "[FALLBACK] publisher output requested but no publisher supplied, skipping",
                ),
            }
        }

        builder
    }

    /// 构建并启动分发器
    pub fn init(self, publisher: Option<Arc<dyn Publisher>>) -> Result<Dispatcher> {
        self.validate()?;
        self.into_builder(publisher).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::MemoryFallback;

    struct NoopPublisher;

    impl Publisher for NoopPublisher {
        fn publish(&self, _subject: &str, _payload: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_defaults_from_empty_json() {
        let config = Configuration::from_json("{}").unwrap();
        assert_eq!(config, Configuration::default());
        assert_eq!(config.publisher_subject, "logs");
    }

    #[test]
    fn test_parse_full_json() {
        let config = Configuration::from_json(
            r#"{
                "buffer_len": 8,
                "use_console": true,
                "console_level": "WARN",
                "console_format": "simple",
                "console_stderr": true,
                "use_publisher": true,
                "publisher_subject": "svc.logs",
                "publisher_level": "ERROR",
                "tags": {"service": "billing"},
                "capture_backtraces": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.buffer_len, 8);
        assert_eq!(config.console_level, Level::Warn);
        assert_eq!(config.console_format, OutputFormat::Simple);
        assert!(config.console_stderr);
        assert_eq!(config.publisher_level, Level::Error);
        assert_eq!(config.tags.get("service").map(String::as_str), Some("billing"));
        assert!(!config.capture_backtraces);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            Configuration::from_json(r#"{"buffer_len": 0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Configuration::from_json(r#"{"console_level": "LOUD"}"#),
            Err(Error::Serialize(_))
        ));
    }

    #[test]
    fn test_init_builds_sinks() {
        let config = Configuration {
            use_console: true,
            use_publisher: true,
            ..Configuration::default()
        };
        let dispatcher = config.init(Some(Arc::new(NoopPublisher))).unwrap();
        assert_eq!(dispatcher.sink_count(), 2);
        assert_eq!(dispatcher.capacity(), 1000);
        assert!(dispatcher.stop().is_ok());
    }

    #[test]
    fn test_console_format_and_stream() {
        let config = Configuration::from_json(
            r#"{"use_console": true, "console_stderr": true, "console_format": "text", "console_level": "ERROR"}"#,
        )
        .unwrap();
        let fallback = Arc::new(MemoryFallback::new());
        let dispatcher = config
            .into_builder_with_fallback(None, fallback.clone())
            .capture_backtraces(false)
            .build()
            .unwrap();
        assert_eq!(dispatcher.sink_count(), 1);

        dispatcher.log(Level::Error, &[crate::Value::from("written to stderr")]);
        assert!(dispatcher.stop().is_ok());
        assert_eq!(dispatcher.metrics().sink_failures, 0);
        assert!(fallback.is_empty());
    }

    #[test]
    fn test_missing_publisher_is_skipped_with_notice() {
        let fallback = Arc::new(MemoryFallback::new());
        let config = Configuration {
            use_publisher: true,
            ..Configuration::default()
        };
        let dispatcher = config
            .into_builder_with_fallback(None, fallback.clone())
            .build()
            .unwrap();

        assert_eq!(dispatcher.sink_count(), 0);
        assert!(fallback.contains("no publisher supplied"));
        assert!(dispatcher.stop().is_ok());
    }
}
