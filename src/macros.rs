//! 日志宏模块
//!
//! 宏的第一个参数是分发器（或其引用），其余参数逐个通过 `Value::from` 转换。

/// 以指定级别记录日志
///
/// ```
/// use logfan::{Dispatcher, Level, log};
///
/// let dispatcher = Dispatcher::new(1, Vec::new()).unwrap();
/// log!(dispatcher, Level::Info, "user", 42, true);
/// dispatcher.stop().unwrap();
/// ```
#[macro_export]
macro_rules! log {
    ($dispatcher:expr, $lvl:expr, $($arg:expr),+ $(,)?) => ({
        $dispatcher.log($lvl, &[$($crate::Value::from($arg)),+]);
    });
}

/// 以格式字符串记录日志
#[macro_export]
macro_rules! logf {
    ($dispatcher:expr, $lvl:expr, $($arg:tt)+) => ({
        $dispatcher.log_formatted($lvl, format_args!($($arg)+));
    });
}

/// 记录致命级别日志
#[macro_export]
macro_rules! fatal {
    ($dispatcher:expr, $($arg:expr),+ $(,)?) => (
        $crate::log!($dispatcher, $crate::Level::Fatal, $($arg),+)
    );
}

/// 记录错误级别日志
#[macro_export]
macro_rules! error {
    ($dispatcher:expr, $($arg:expr),+ $(,)?) => (
        $crate::log!($dispatcher, $crate::Level::Error, $($arg),+)
    );
}

/// 记录警告级别日志
#[macro_export]
macro_rules! warn {
    ($dispatcher:expr, $($arg:expr),+ $(,)?) => (
        $crate::log!($dispatcher, $crate::Level::Warn, $($arg),+)
    );
}

/// 记录信息级别日志
#[macro_export]
macro_rules! info {
    ($dispatcher:expr, $($arg:expr),+ $(,)?) => (
        $crate::log!($dispatcher, $crate::Level::Info, $($arg),+)
    );
}

/// 记录调试级别日志
#[macro_export]
macro_rules! debug {
    ($dispatcher:expr, $($arg:expr),+ $(,)?) => (
        $crate::log!($dispatcher, $crate::Level::Debug, $($arg),+)
    );
}
