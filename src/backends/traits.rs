//! 后端调用层 Trait 定义
//!
//! 定义后端 HTTP 调用的核心接口。
//! 后端层只负责 HTTP 请求/响应，不包含任何协议转换逻辑。

use crate::models::{BackendHealth, GenerateRequest, GenerateResponse};
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::error::Error;
use std::pin::Pin;

/// 字节流类型
///
/// 丢弃该流即关闭底层连接。
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, Box<dyn Error + Send + Sync>>> + Send>>;

/// 后端调用结果
pub type BackendResult<T> = Result<T, BackendError>;

/// 后端错误类型
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError {
    /// 错误类型
    pub kind: BackendErrorKind,
    /// 错误消息；状态错误时为后端返回的原始响应体
    pub message: String,
    /// HTTP 状态码（如果有）
    pub status_code: Option<u16>,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = self.status_code {
            write!(f, "{} ({}): {}", self.kind, code, self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for BackendError {}

/// 后端错误类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 无法连接到后端
    Connection,
    /// 后端可达但返回非 2xx
    Status,
    /// 请求超时
    Timeout,
    /// 响应体无法解析
    Decode,
    /// 其他错误
    Other,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "ConnectionError"),
            Self::Status => write!(f, "BackendStatusError"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Decode => write!(f, "DecodeError"),
            Self::Other => write!(f, "Other"),
        }
    }
}

impl BackendError {
    /// 创建新的后端错误
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    /// 由后端非 2xx 状态码与响应体创建错误
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Status,
            message: body.into(),
            status_code: Some(status),
        }
    }

    /// 将 reqwest 错误归类
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            BackendErrorKind::Timeout
        } else if err.is_connect() || err.is_request() {
            BackendErrorKind::Connection
        } else if err.is_decode() {
            BackendErrorKind::Decode
        } else {
            BackendErrorKind::Other
        };
        let mut e = Self::new(kind, err.to_string());
        e.status_code = err.status().map(|s| s.as_u16());
        e
    }

    pub fn is_connection(&self) -> bool {
        self.kind == BackendErrorKind::Connection
    }
}

/// 拼接错误及其 `source()` 链，已包含在前文中的环节跳过
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// 后端 Trait
///
/// 定义推理后端 HTTP 调用的接口。
#[async_trait]
pub trait Backend: Send + Sync {
    /// 流式调用
    ///
    /// 初始状态码 ≥ 400 时读取完整响应体并返回 `BackendErrorKind::Status`，
    /// 不会返回字节流。
    async fn open_stream(&self, request: &GenerateRequest) -> BackendResult<ByteStream>;

    /// 非流式调用
    async fn generate(&self, request: &GenerateRequest) -> BackendResult<GenerateResponse>;

    /// 后端健康状态
    async fn health(&self) -> BackendHealth;

    /// 获取后端名称
    fn name(&self) -> &str;

    /// 后端基础 URL
    fn base_url(&self) -> &str;
}
