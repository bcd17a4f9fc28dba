//! 对外 HTTP 接口模型

use serde::{Deserialize, Serialize};

/// `POST /chat` 请求体
#[derive(Debug, Clone, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
}

/// `GET /stream` 查询参数
#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub prompt: String,
}

/// 非流式接口的统一响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    pub success: bool,
    pub message: String,
}

impl ChatResponse {
    pub fn ok(response: String, message: &str) -> Self {
        Self {
            response,
            success: true,
            message: message.to_string(),
        }
    }
}

/// 后端连通状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    Connected,
    Error,
    Disconnected,
    ModelNotFound,
}

/// 健康检查结果
#[derive(Debug, Clone, PartialEq)]
pub struct BackendHealth {
    pub status: BackendStatus,
    pub error: Option<String>,
}

/// `GET /` 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
    pub ollama_status: BackendStatus,
    pub ollama_url: String,
    pub model: String,
}

/// `GET /health` 响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub ollama_status: BackendStatus,
    pub ollama_url: String,
    pub model: String,
    pub ollama_error: Option<String>,
}
