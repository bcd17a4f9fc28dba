//! HTTP 层错误类型
//!
//! 流开始之前发生的错误以 JSON `{"detail": ...}` 返回。

use crate::backends::{BackendError, BackendErrorKind};
use crate::services::NormalizeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// 接口错误
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// 请求参数错误
    #[error("{0}")]
    BadRequest(String),

    /// 请求规范化失败
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// 后端返回非 2xx
    #[error("Ollama error: {0}")]
    BackendStatus(String),

    /// 无法连接后端
    #[error("Cannot reach Ollama: {0}")]
    BackendUnreachable(String),

    /// 后端请求超时
    #[error("Ollama request timed out: {0}")]
    BackendTimeout(String),

    /// 内部错误
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// 获取对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Normalize(e) => e.status_code(),
            ApiError::BackendStatus(_) => 502,
            ApiError::BackendUnreachable(_) => 503,
            ApiError::BackendTimeout(_) => 504,
            ApiError::Internal(_) => 500,
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Normalize(_) => "invalid_request",
            ApiError::BackendStatus(_) => "backend_status_error",
            ApiError::BackendUnreachable(_) => "backend_unreachable",
            ApiError::BackendTimeout(_) => "backend_timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// 转换为 JSON 错误响应
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "detail": self.to_string() })
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err.kind {
            BackendErrorKind::Status => ApiError::BackendStatus(err.message),
            BackendErrorKind::Connection => ApiError::BackendUnreachable(err.message),
            BackendErrorKind::Timeout => ApiError::BackendTimeout(err.message),
            BackendErrorKind::Decode | BackendErrorKind::Other => ApiError::Internal(err.message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(
                error_type = %self.error_type(),
                "[API] 请求失败: {}",
                self
            );
        } else {
            tracing::warn!("[API] 请求被拒绝: {}", self);
        }
        (status, Json(self.to_json())).into_response()
    }
}
