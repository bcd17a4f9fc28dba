//! 浏览器 SSE 生成器
//!
//! 将 `StreamEvent` 转换为浏览器 `EventSource` 可直接消费的 SSE 格式。
//!
//! # 格式说明
//!
//! ```text
//! data: {"text":"Hello"}
//!
//! data: {"error":true,"status_code":500,"message":"Backend returned an error","detail":"..."}
//!
//! event: done
//! data: {}
//! ```
//!
//! payload 统一由 `serde_json` 序列化，换行、引号、非 ASCII 字符都在 JSON 字符串内转义，
//! 因此每个事件只有一行 `data:`。

use crate::stream::events::StreamEvent;
use serde::Serialize;

/// 结束事件名
pub const DONE_EVENT: &str = "done";

#[derive(Serialize)]
struct TextPayload<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

/// SSE 生成器
///
/// 无状态，按事件逐个编码。
#[derive(Debug, Default, Clone, Copy)]
pub struct SseGenerator;

impl SseGenerator {
    pub fn new() -> Self {
        Self
    }

    /// 将 StreamEvent 转换为完整的 SSE 事件字符串（以空行结尾）
    pub fn generate(&self, event: &StreamEvent) -> String {
        match event {
            StreamEvent::Text { text } => Self::data_event(&TextPayload { text }),
            StreamEvent::Error {
                status_code,
                message,
                detail,
            } => Self::data_event(&ErrorPayload {
                error: true,
                status_code: *status_code,
                message,
                detail: detail.as_deref(),
            }),
            StreamEvent::Done => format!("event: {DONE_EVENT}\ndata: {{}}\n\n"),
        }
    }

    fn data_event<T: Serialize>(payload: &T) -> String {
        // 这里的 payload 只含字符串、布尔和整数，序列化不会失败
        let json = serde_json::to_string(payload)
            .unwrap_or_else(|_| r#"{"error":true,"message":"encode failed"}"#.to_string());
        format!("data: {json}\n\n")
    }
}
