/*!
独立的Builder模块，用于构建 [`Dispatcher`] 实例。

该模块提供流畅的Builder模式：先注册输出目标与标签，再调用 `build()`
启动后台工作线程。
*/

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::Level;
use crate::dispatcher::{Dispatcher, DispatcherParts};
use crate::error::Result;
use crate::fallback::{FallbackSink, StderrFallback};
use crate::format::OutputFormat;
use crate::record::Tags;
use crate::sink::{ConsoleSink, FileSink, Sink};

/// 主机名标签的键
pub const HOSTNAME_TAG: &str = "hostname";

/// 分发器构建器
#[derive(Clone)]
pub struct DispatcherBuilder {
    buffer_len: usize,
    sinks: Vec<Arc<dyn Sink>>,
    fallback: Option<Arc<dyn FallbackSink>>,
    tags: Tags,
    idle_interval: Duration,
    capture_backtraces: bool,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            buffer_len: 100,
            sinks: Vec::new(),
            fallback: None,
            tags: Tags::new(),
            idle_interval: Duration::from_millis(50),
            capture_backtraces: true,
        }
    }
}

impl DispatcherBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置缓冲长度（队列容量为其 10 倍）
    pub fn buffer_len(mut self, buffer_len: usize) -> Self {
        self.buffer_len = buffer_len;
        self
    }

    /// 追加一个输出目标
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// 追加多个输出目标，保持给定顺序
    pub fn sinks(mut self, sinks: impl IntoIterator<Item = Arc<dyn Sink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// 设置兜底输出（默认写入标准错误）
    pub fn fallback(mut self, fallback: Arc<dyn FallbackSink>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// 添加一个进程级标签
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 设置工作线程空闲时的休眠间隔
    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// ERROR/FATAL 是否附带调用栈
    pub fn capture_backtraces(mut self, enabled: bool) -> Self {
        self.capture_backtraces = enabled;
        self
    }

    /// 使用控制台输出 (便捷方法)
    pub fn with_console_output(self, min_level: Level) -> Self {
        self.with_console_output_formatted(min_level, OutputFormat::Json)
    }

    /// 使用指定格式的标准输出
    pub fn with_console_output_formatted(self, min_level: Level, format: OutputFormat) -> Self {
        self.sink(Arc::new(
            ConsoleSink::new(min_level).with_formatter(format.formatter()),
        ))
    }

    /// 使用指定格式的标准错误输出
    pub fn with_stderr_output(self, min_level: Level, format: OutputFormat) -> Self {
        self.sink(Arc::new(
            ConsoleSink::stderr(min_level).with_formatter(format.formatter()),
        ))
    }

    /// 使用文件输出 (便捷方法)
    pub fn with_file_output<P: AsRef<Path>>(self, path: P, min_level: Level) -> Self {
        self.with_file_output_formatted(path, min_level, OutputFormat::Json)
    }

    /// 使用指定格式的文件输出
    pub fn with_file_output_formatted<P: AsRef<Path>>(
        self,
        path: P,
        min_level: Level,
        format: OutputFormat,
    ) -> Self {
        match FileSink::new(path, min_level) {
            Ok(sink) => self.sink(Arc::new(sink.with_formatter(format.formatter()))),
            Err(err) => {
                // 如果文件创建失败，则回退到控制台输出
                log::warn!("file sink unavailable ({err}), using console output");
                self.with_console_output_formatted(min_level, format)
            }
        }
    }

    /// 构建并启动分发器
    pub fn build(self) -> Result<Dispatcher> {
        let mut tags = self.tags;
        tags.entry(HOSTNAME_TAG.to_string())
            .or_insert_with(local_hostname);

        Dispatcher::from_parts(DispatcherParts {
            buffer_len: self.buffer_len,
            sinks: self.sinks,
            fallback: self
                .fallback
                .unwrap_or_else(|| Arc::new(StderrFallback::new())),
            tags,
            idle_interval: self.idle_interval,
            capture_backtraces: self.capture_backtraces,
        })
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}
