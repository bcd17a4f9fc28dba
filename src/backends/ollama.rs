//! Ollama 后端
//!
//! - `POST {base_url}/api/generate`（流式 / 非流式）
//! - `GET {base_url}/api/tags`（健康检查）

use super::client_factory::{ClientError, HttpClientFactory};
use super::traits::{Backend, BackendError, BackendResult, ByteStream};
use crate::config::BackendConfig;
use crate::logger::preview;
use crate::models::{BackendHealth, BackendStatus, GenerateRequest, GenerateResponse, TagsResponse};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::error::Error;

const GENERATE_PATH: &str = "/api/generate";
const TAGS_PATH: &str = "/api/tags";

/// 健康检查时列出的可用模型数量上限
const MAX_LISTED_MODELS: usize = 5;

/// Ollama 后端
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    base_url: String,
    generate_url: String,
    tags_url: String,
    model: String,
    /// 流式调用客户端（无整体超时）
    stream_client: Client,
    /// 非流式调用客户端
    unary_client: Client,
    /// 健康检查客户端
    health_client: Client,
}

impl OllamaBackend {
    /// 根据后端配置创建，三个客户端在进程内共享连接池
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let factory = HttpClientFactory::from_config(config);
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            generate_url: config.endpoint(GENERATE_PATH),
            tags_url: config.endpoint(TAGS_PATH),
            model: config.model.clone(),
            stream_client: factory.streaming_client()?,
            unary_client: factory.unary_client()?,
            health_client: factory.client_with_timeout(config.health_timeout())?,
        })
    }

    /// 读取错误响应体；读取失败时返回空串
    async fn read_error_body(resp: reqwest::Response) -> String {
        match resp.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!("[OLLAMA] 读取错误响应体失败: {}", e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn open_stream(&self, request: &GenerateRequest) -> BackendResult<ByteStream> {
        let url = &self.generate_url;
        tracing::info!(
            "[OLLAMA] 打开流式连接: url={} model={} images={}",
            url,
            request.model,
            request.images.as_ref().map_or(0, Vec::len)
        );

        let resp = self
            .stream_client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = Self::read_error_body(resp).await;
            tracing::warn!(
                "[OLLAMA] 流式请求返回错误: status={} body={}",
                status,
                preview(&body, 200)
            );
            return Err(BackendError::from_status(status.as_u16(), body));
        }

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>));
        Ok(Box::pin(stream))
    }

    async fn generate(&self, request: &GenerateRequest) -> BackendResult<GenerateResponse> {
        let url = &self.generate_url;
        tracing::info!("[OLLAMA] 非流式调用: url={} model={}", url, request.model);

        let resp = self
            .unary_client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = Self::read_error_body(resp).await;
            tracing::warn!(
                "[OLLAMA] 非流式请求返回错误: status={} body={}",
                status,
                preview(&body, 200)
            );
            return Err(BackendError::from_status(status.as_u16(), body));
        }

        resp.json::<GenerateResponse>()
            .await
            .map_err(|e| BackendError::from_reqwest(&e))
    }

    async fn health(&self) -> BackendHealth {
        let url = &self.tags_url;
        let resp = match self.health_client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!("[OLLAMA] 健康检查连接失败: {}", e);
                return BackendHealth {
                    status: BackendStatus::Disconnected,
                    error: Some(format!("Cannot connect to Ollama at {}", self.base_url)),
                };
            }
        };

        if resp.status() != reqwest::StatusCode::OK {
            return BackendHealth {
                status: BackendStatus::Error,
                error: Some(format!("Ollama returned status {}", resp.status().as_u16())),
            };
        }

        // tags 无法解析时无法判断模型是否存在，按已连接处理
        let tags = match resp.json::<TagsResponse>().await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::debug!("[OLLAMA] 解析 tags 失败: {}", e);
                return BackendHealth {
                    status: BackendStatus::Connected,
                    error: None,
                };
            }
        };

        if tags.has_model(&self.model) {
            BackendHealth {
                status: BackendStatus::Connected,
                error: None,
            }
        } else {
            let available: Vec<&str> = tags
                .model_names()
                .into_iter()
                .take(MAX_LISTED_MODELS)
                .collect();
            BackendHealth {
                status: BackendStatus::ModelNotFound,
                error: Some(format!(
                    "Model '{}' not found. Available models: {}",
                    self.model,
                    available.join(", ")
                )),
            }
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
