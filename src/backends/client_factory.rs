//! HTTP 客户端工厂
//!
//! 流式与非流式调用使用不同的超时策略：
//! - 流式客户端只设置连接超时，整体请求不设上限（后端可能连续输出数分钟）
//! - 非流式客户端同时设置连接超时和请求超时

use crate::config::BackendConfig;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// 客户端构建错误
#[derive(Debug, Error)]
pub enum ClientError {
    /// 客户端构建错误
    #[error("客户端构建错误: {0}")]
    Build(String),
}

/// HTTP 客户端工厂
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    /// 连接超时时间
    connect_timeout: Duration,
    /// 非流式请求超时时间
    request_timeout: Duration,
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl HttpClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从后端配置创建
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new()
            .with_connect_timeout(config.connect_timeout())
            .with_request_timeout(config.unary_timeout())
    }

    /// 设置连接超时时间
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 设置非流式请求超时时间
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// 流式客户端：无整体超时，仅连接超时
    pub fn streaming_client(&self) -> Result<Client, ClientError> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))
    }

    /// 非流式客户端
    pub fn unary_client(&self) -> Result<Client, ClientError> {
        self.client_with_timeout(self.request_timeout)
    }

    /// 指定请求超时的客户端（健康检查、图片下载）
    pub fn client_with_timeout(&self, timeout: Duration) -> Result<Client, ClientError> {
        Client::builder()
            .connect_timeout(self.connect_timeout.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))
    }
}
