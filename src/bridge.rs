//! `log` 门面适配。
//!
//! 安装后，通过 `log::info!` 等宏记录的日志会转发给分发器。
//! 本 crate 自身的诊断日志不会被转发，避免回灌到队列中。

use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record};

use crate::dispatcher::Dispatcher;
use crate::{Error, Level, Result};

/// 把 `log` 记录转发给分发器的适配器
pub struct LogBridge {
    dispatcher: Arc<Dispatcher>,
    filter: LevelFilter,
}

impl LogBridge {
    /// 创建适配器
    pub fn new(dispatcher: Arc<Dispatcher>, filter: LevelFilter) -> Self {
        Self { dispatcher, filter }
    }

    fn is_own_target(target: &str) -> bool {
        let own = env!("CARGO_CRATE_NAME");
        target == own
            || target
                .strip_prefix(own)
                .is_some_and(|rest| rest.starts_with("::"))
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.filter && !Self::is_own_target(metadata.target())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.dispatcher.log_formatted(
            Level::from(record.level()),
            format_args!("[{}] {}", record.target(), record.args()),
        );
    }

    fn flush(&self) {
        let _ = self.dispatcher.flush();
    }
}

/// 将分发器安装为进程的 `log` 实现；只能成功调用一次
pub fn install(dispatcher: Arc<Dispatcher>, filter: LevelFilter) -> Result<()> {
    log::set_boxed_logger(Box::new(LogBridge::new(dispatcher, filter)))
        .map_err(|_| Error::AlreadyInitialized)?;
    log::set_max_level(filter);
    Ok(())
}
