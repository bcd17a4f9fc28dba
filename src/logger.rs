//! 日志管理模块
use crate::config::LoggingConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::Level;

/// 初始化全局 tracing 订阅器
///
/// 重复调用（例如测试中）不会报错，后续调用直接忽略。
pub fn init(config: &LoggingConfig) {
    let level = parse_level(&config.level);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// 解析日志级别，无法识别时回退到 INFO
pub fn parse_level(level: &str) -> Level {
    level.trim().parse::<Level>().unwrap_or(Level::INFO)
}

static SANITIZE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Bearer token
        (r"Bearer\s+[A-Za-z0-9._-]+", "Bearer ***"),
        // API key 各种格式
        (
            r#"api[_-]?key["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "api_key: ***",
        ),
        // 通用 token
        (r#"token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#, "token: ***"),
        // authorization header
        (
            r#"[Aa]uthorization["']?\s*[:=]\s*["']?[A-Za-z0-9._\s-]+"#,
            "authorization: ***",
        ),
        // password
        (r#"password["']?\s*[:=]\s*["']?[^\s"',}]+"#, "password: ***"),
        // secret
        (
            r#"secret["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "secret: ***",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// 日志脱敏：后端错误体、用户 prompt 写入日志前都要经过这里
pub fn sanitize_log_message(message: &str) -> String {
    let mut sanitized = message.to_string();
    for (re, replacement) in SANITIZE_PATTERNS.iter() {
        sanitized = re.replace_all(&sanitized, *replacement).to_string();
    }
    sanitized
}

/// 安全截断字符串到指定字符数，避免 UTF-8 边界问题
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// 日志中 prompt 预览的最大字符数
pub const PROMPT_PREVIEW_CHARS: usize = 100;

/// 生成可写入日志的预览：先截断再脱敏
pub fn preview(s: &str, max_chars: usize) -> String {
    sanitize_log_message(&safe_truncate(s, max_chars))
}
