//! 统一流事件类型
//!
//! 定义流式传输的中间表示，用于解耦解析器 (parsers) 和生成器 (generators)。
//!
//! - Parsers 把后端 NDJSON 帧转换为 `StreamEvent`
//! - Generators 把 `StreamEvent` 编码为前端 SSE
//!
//! 每个到达客户端的流都以且仅以一个 `Done` 结束（客户端主动断开除外）。

use serde::{Deserialize, Serialize};

/// 统一流事件类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// 文本增量
    Text {
        /// 文本内容
        text: String,
    },

    /// 错误事件
    ///
    /// 连接失败、后端非 2xx、流中断都会转换为该事件
    Error {
        /// 后端 HTTP 状态码（如果有）
        status_code: Option<u16>,
        /// 可读的错误描述
        message: String,
        /// 原始错误详情或后端响应体
        detail: Option<String>,
    },

    /// 流结束
    Done,
}

impl StreamEvent {
    /// 创建文本事件
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// 创建错误事件
    pub fn error(
        status_code: Option<u16>,
        message: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        Self::Error {
            status_code,
            message: message.into(),
            detail,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// 事件类型名，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }
}
