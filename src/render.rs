/*!
参数渲染与消息组装。

调用方传入的每个参数都要先转换为文本。参数的渲染方式由调用方显式选择：

- [`Value::custom`]：类型自己提供文本表示（[`LogRender`]）
- [`Value::serialized`]：通过 serde 序列化为 JSON
- [`Value::opaque`]：通用的 `Debug` 格式

常见的标量类型可以直接通过 `From` 转换。
*/

use serde::Serialize;
use std::backtrace::Backtrace;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};
use std::hash::BuildHasher;

use crate::Level;
use crate::record::local_timestamp;

/// 参数之间的分隔符
pub const SEPARATOR: &str = " | ";

/// 自定义文本渲染能力
pub trait LogRender {
    /// 返回用于日志的文本表示
    fn render(&self) -> String;
}

/// 已渲染的参数
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// 由 [`LogRender`] 或 `Display` 产生的文本
    Rendered(String),
    /// JSON 序列化结果
    Serialized(String),
    /// `Debug` 格式的兜底文本
    Opaque(String),
}

impl Value {
    /// 使用类型自己的渲染方法
    pub fn custom<T: LogRender + ?Sized>(value: &T) -> Self {
        Value::Rendered(value.render())
    }

    /// 序列化为 JSON，失败时退回 `Debug` 格式
    pub fn serialized<T: Serialize + fmt::Debug + ?Sized>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(json) => Value::Serialized(json),
            Err(_) => Value::opaque(value),
        }
    }

    /// 通用 `Debug` 格式
    pub fn opaque<T: fmt::Debug + ?Sized>(value: &T) -> Self {
        Value::Opaque(format!("{value:?}"))
    }

    /// 渲染后的文本
    pub fn as_str(&self) -> &str {
        match self {
            Value::Rendered(s) | Value::Serialized(s) | Value::Opaque(s) => s,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Rendered(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Rendered(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Rendered(value.clone())
    }
}

impl From<fmt::Arguments<'_>> for Value {
    fn from(value: fmt::Arguments<'_>) -> Self {
        Value::Rendered(value.to_string())
    }
}

macro_rules! value_from_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Rendered(value.to_string())
                }
            }
        )*
    };
}

value_from_display!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

/// 将参数列表渲染为一行文本，参数之间以 [`SEPARATOR`] 分隔
pub fn stringify(values: &[Value]) -> String {
    let mut out = String::with_capacity(values.iter().map(|v| v.as_str().len() + 3).sum());
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(SEPARATOR);
        }
        out.push_str(value.as_str());
    }
    out
}

/// 请求/调用上下文中的命名值
pub trait LogContext {
    /// 查找键对应的值
    fn value(&self, key: &str) -> Option<String>;
}

impl<V: fmt::Display, S: BuildHasher> LogContext for HashMap<String, V, S> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

impl<V: fmt::Display> LogContext for BTreeMap<String, V> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

impl<V: fmt::Display> LogContext for Vec<(&str, V)> {
    fn value(&self, key: &str) -> Option<String> {
        self.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

/// 提取上下文中存在的键，渲染为 `Context: [k=v k=v] `
///
/// 没有任何键命中时返回空字符串。
pub fn render_context(context: Option<&dyn LogContext>, keys: &[&str]) -> String {
    let Some(context) = context else {
        return String::new();
    };

    let pairs: Vec<String> = keys
        .iter()
        .filter_map(|key| context.value(key).map(|value| format!("{key}={value}")))
        .collect();

    if pairs.is_empty() {
        return String::new();
    }
    format!("Context: [{}] ", pairs.join(" "))
}

/// 组装最终消息：本地时间戳、方括号级别标签、正文，
/// ERROR/FATAL 在调用线程上附加调用栈
pub(crate) fn compose(level: Level, body: &str, capture_backtrace: bool) -> String {
    let mut out = String::with_capacity(body.len() + 48);
    let _ = write!(out, "{} - [{}] : ", local_timestamp(), level);
    out.push_str(body);

    if capture_backtrace && level.wants_backtrace() {
        out.push_str("\n Stack trace : \n");
        let _ = write!(out, "{}", Backtrace::force_capture());
    }
    out
}
