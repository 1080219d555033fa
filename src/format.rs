/*!
输出载荷编码器。

输出目标通过 [`Formatter`] 把 [`LogMessage`] 编码为字节。默认使用
[`JsonFormatter`]，与消息总线上传输的格式一致。
*/

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::record::LogMessage;
use crate::{Level, Result};

/// 输出格式，供构建器与配置选择编码器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// 单行 JSON（线上格式）
    #[default]
    Json,
    /// 多行缩进 JSON
    PrettyJson,
    /// 文本格式，不带颜色
    Text,
    /// 带 ANSI 颜色的文本格式
    ColoredText,
    /// 仅级别与消息
    Simple,
}

impl OutputFormat {
    /// 创建对应的编码器
    pub fn formatter(self) -> Arc<dyn Formatter> {
        match self {
            OutputFormat::Json => Arc::new(JsonFormatter::new()),
            OutputFormat::PrettyJson => Arc::new(JsonFormatter::pretty()),
            OutputFormat::Text => Arc::new(DefaultFormatter::plain()),
            OutputFormat::ColoredText => Arc::new(DefaultFormatter::colored()),
            OutputFormat::Simple => Arc::new(SimpleFormatter::new()),
        }
    }
}

/// 载荷编码接口
pub trait Formatter: Send + Sync {
    /// 将消息编码为一行字节（包含结尾换行）
    fn format(&self, message: &LogMessage) -> Result<Vec<u8>>;
}

/// JSON 编码器，输出线上格式 `{timestamp, level, message, tags}`
pub struct JsonFormatter {
    /// 是否格式化输出（美化格式）
    pretty: bool,
}

impl JsonFormatter {
    /// 创建新的JSON格式化器
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// 创建美化格式的JSON格式化器
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, message: &LogMessage) -> Result<Vec<u8>> {
        let mut out = if self.pretty {
            serde_json::to_vec_pretty(message)?
        } else {
            serde_json::to_vec(message)?
        };
        out.push(b'\n');
        Ok(out)
    }
}

/// 人类可读的文本编码器，可选 ANSI 颜色
pub struct DefaultFormatter {
    /// 是否使用彩色输出
    colored: bool,
}

impl DefaultFormatter {
    /// 创建新的默认格式化器
    pub fn new() -> Self {
        Self {
            colored: Self::should_use_color(),
        }
    }

    /// 创建使用彩色输出的格式化器
    pub fn colored() -> Self {
        Self { colored: true }
    }

    /// 创建不使用彩色输出的格式化器
    pub fn plain() -> Self {
        Self { colored: false }
    }

    fn should_use_color() -> bool {
        #[cfg(not(windows))]
        return true;
        #[cfg(windows)]
        return false;
    }

    fn color_code(level: &str) -> u8 {
        match level.parse::<Level>() {
            Ok(Level::Debug) => 36,
            Ok(Level::Info) => 32,
            Ok(Level::Warn) => 33,
            Ok(Level::Error) => 31,
            Ok(Level::Fatal) => 35,
            Ok(Level::Unknown) | Err(_) => 90,
        }
    }
}

impl Default for DefaultFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for DefaultFormatter {
    fn format(&self, message: &LogMessage) -> Result<Vec<u8>> {
        let mut line = format!("[{}] ", message.timestamp);

        if self.colored {
            line.push_str(&format!(
                "\x1b[{}m[{:5}]\x1b[0m ",
                Self::color_code(&message.level),
                message.level
            ));
        } else {
            line.push_str(&format!("[{:5}] ", message.level));
        }

        if !message.tags.is_empty() {
            let tags: Vec<String> = message
                .tags
                .iter()
                .map(|(k, v)| format!("{k}:{v}"))
                .collect();
            line.push_str(&format!("[{}] ", tags.join(",")));
        }

        line.push_str(&message.message);
        line.push('\n');
        Ok(line.into_bytes())
    }
}

/// 简单格式化器：级别 + 消息
pub struct SimpleFormatter;

impl SimpleFormatter {
    /// 创建新的简单格式化器
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimpleFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for SimpleFormatter {
    fn format(&self, message: &LogMessage) -> Result<Vec<u8>> {
        Ok(format!("[{}] {}\n", message.level, message.message).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Tags;
    use std::sync::Arc;

    fn message() -> LogMessage {
        let mut tags = Tags::new();
        tags.insert("hostname".to_string(), "h1".to_string());
        tags.insert("service".to_string(), "billing".to_string());
        LogMessage {
            timestamp: "2024-01-02T03:04:05+00:00".to_string(),
            level: "WARN".to_string(),
            message: "quota \"low\"".to_string(),
            tags: Arc::new(tags),
        }
    }

    #[test]
    fn test_json_formatter_round_trips_wire_shape() {
        let bytes = JsonFormatter::new().format(&message()).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        let decoded: LogMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.message, "quota \"low\"");
        assert_eq!(decoded.tags.get("service").map(String::as_str), Some("billing"));
    }

    #[test]
    fn test_default_formatter_plain() {
        let bytes = DefaultFormatter::plain().format(&message()).unwrap();
        let line = String::from_utf8_lossy(&bytes);
        assert_eq!(
            line,
            "[2024-01-02T03:04:05+00:00] [WARN ] [hostname:h1,service:billing] quota \"low\"\n"
        );
    }

    #[test]
    fn test_simple_formatter() {
        let bytes = SimpleFormatter::new().format(&message()).unwrap();
        assert_eq!(String::from_utf8_lossy(&bytes), "[WARN] quota \"low\"\n");
    }

    #[test]
    fn test_output_format_selects_formatter() {
        let pretty = OutputFormat::PrettyJson.formatter().format(&message()).unwrap();
        let pretty = String::from_utf8(pretty).unwrap();
        assert!(pretty.contains("\n  \"level\": \"WARN\""));
        let decoded: LogMessage = serde_json::from_str(&pretty).unwrap();
        assert_eq!(decoded, message());

        let colored = OutputFormat::ColoredText.formatter().format(&message()).unwrap();
        assert!(String::from_utf8_lossy(&colored).contains("\x1b[33m[WARN ]\x1b[0m"));

        let simple = OutputFormat::Simple.formatter().format(&message()).unwrap();
        assert_eq!(String::from_utf8_lossy(&simple), "[WARN] quota \"low\"\n");
    }

    #[test]
    fn test_output_format_names() {
        let parsed: OutputFormat = serde_json::from_str("\"pretty_json\"").unwrap();
        assert_eq!(parsed, OutputFormat::PrettyJson);
        assert_eq!(serde_json::to_string(&OutputFormat::ColoredText).unwrap(), "\"colored_text\"");
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
    }
}
