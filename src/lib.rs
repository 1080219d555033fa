/*!
异步多目标日志分发库。

应用线程以非阻塞方式提交日志，后台工作线程按级别过滤后扇出到多个输出目标，
并在所有目标都失败或都不接收时写入永不失败的兜底输出。
*/

#![warn(missing_docs)]

pub mod bridge;
pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod error;
mod escalate;
pub mod fallback;
pub mod format;
pub mod level;
pub mod macros;
pub mod metrics;
pub mod record;
pub mod render;
pub mod sink;

// 公共API导出
pub use crate::builder::DispatcherBuilder;
pub use crate::config::Configuration;
pub use crate::dispatcher::Dispatcher;
pub use crate::error::{Error, Result};
pub use crate::fallback::{FallbackSink, MemoryFallback, StderrFallback};
pub use crate::format::{
    DefaultFormatter, Formatter, JsonFormatter, OutputFormat, SimpleFormatter,
};
pub use crate::level::Level;
// 注意：宏通过#[macro_export]自动导出，无需在此处重新导出
pub use crate::metrics::{Metrics, MetricsSnapshot};
pub use crate::record::{LogEntry, LogMessage, Tags};
pub use crate::render::{LogContext, LogRender, Value};
pub use crate::sink::{
    ConsoleSink, FileSink, MemorySink, NullSink, Publisher, PublisherSink, Sink,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_api_compilation() {
        // 测试API是否能正常编译
        let sink: Arc<dyn Sink> = Arc::new(NullSink::new());
        let dispatcher = Dispatcher::new(10, vec![sink]).unwrap();

        dispatcher.log(Level::Info, &[Value::from("Test message")]);
        dispatcher.log_structured(Level::Debug, &[Value::opaque(&vec![1, 2, 3])]);

        assert!(dispatcher.flush().is_ok());
        assert!(dispatcher.stop().is_ok());
        assert_eq!(dispatcher.metrics().total, 2);
    }
}
