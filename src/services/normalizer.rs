//! 请求规范化服务
//!
//! 在请求进入转换层之前完成：
//! - 校验提示词，带图片且提示词为空时替换为默认提示词
//! - 读取上传图片，或下载图片 URL 并校验内容确实是图片
//! - 对图片做 base64 编码
//!
//! 这里的所有失败都发生在流开始之前，由 HTTP 层映射为 400。

use crate::backends::{ClientError, HttpClientFactory};
use crate::config::BackendConfig;
use crate::models::{EncodedImage, InferenceRequest};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;

/// 带图片但未给出提示词时使用的默认提示词
pub const DEFAULT_IMAGE_PROMPT: &str = "What is in this image? Describe it in detail.";

const UNKNOWN_MIME: &str = "application/octet-stream";

/// 规范化错误
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    /// 纯文本请求缺少提示词
    #[error("Prompt is required")]
    EmptyPrompt,

    /// 表单请求既没有提示词也没有图片
    #[error("Prompt is required when no image is provided")]
    MissingPrompt,

    #[error("Uploaded image is empty")]
    EmptyUpload,

    #[error("Invalid image URL: {0}")]
    InvalidImageUrl(String),

    /// 下载图片时的网络或状态码错误
    #[error("Failed to download image: {0}")]
    ImageDownload(String),

    /// 下载的内容无法识别为图片
    #[error("Invalid image or error downloading image: {0}")]
    NotAnImage(String),

    #[error("Invalid form data: {0}")]
    Multipart(String),
}

impl NormalizeError {
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// 多部分表单中与推理相关的字段
#[derive(Debug, Clone, Default)]
pub struct ImageForm {
    pub prompt: Option<String>,
    /// 上传的图片字节
    pub image: Option<Bytes>,
    pub image_url: Option<String>,
}

impl ImageForm {
    fn trimmed_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some() || self.trimmed_url().is_some()
    }
}

/// 请求规范化器
#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    /// 图片下载客户端
    client: Client,
}

impl RequestNormalizer {
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let factory = HttpClientFactory::from_config(config);
        Ok(Self {
            client: factory.client_with_timeout(config.image_download_timeout())?,
        })
    }

    /// 纯文本请求
    pub fn normalize_text(
        &self,
        prompt: &str,
        streaming: bool,
    ) -> Result<InferenceRequest, NormalizeError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(NormalizeError::EmptyPrompt);
        }
        Ok(InferenceRequest::text(prompt, streaming))
    }

    /// 表单请求（可带图片）
    ///
    /// 同时提供上传图片和 URL 时以上传图片为准。
    pub async fn normalize_form(
        &self,
        form: ImageForm,
        streaming: bool,
    ) -> Result<InferenceRequest, NormalizeError> {
        let prompt = resolve_prompt(form.prompt.as_deref(), form.has_image())?;

        let image = if let Some(bytes) = &form.image {
            if bytes.is_empty() {
                return Err(NormalizeError::EmptyUpload);
            }
            Some(encode_image(bytes))
        } else if let Some(url) = form.trimmed_url() {
            if !is_valid_url(url) {
                return Err(NormalizeError::InvalidImageUrl(url.to_string()));
            }
            let bytes = self.download_image(url).await?;
            Some(encode_image(&bytes))
        } else {
            None
        };

        if let Some(img) = &image {
            tracing::info!(
                "[NORMALIZE] 图片已编码: mime={} size={}",
                img.mime_type,
                img.size
            );
        }

        Ok(InferenceRequest {
            prompt,
            image,
            streaming,
        })
    }

    /// 下载图片并校验内容
    pub async fn download_image(&self, url: &str) -> Result<Bytes, NormalizeError> {
        tracing::info!("[NORMALIZE] 下载图片: {}", url);

        let resp = self.client.get(url).send().await.map_err(|e| {
            tracing::error!("[NORMALIZE] 下载图片失败: {}", e);
            NormalizeError::ImageDownload(e.to_string())
        })?;
        let resp = resp.error_for_status().map_err(|e| {
            tracing::error!("[NORMALIZE] 图片地址返回错误状态: {}", e);
            NormalizeError::ImageDownload(e.to_string())
        })?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| NormalizeError::ImageDownload(e.to_string()))?;

        if !infer::is_image(&bytes) {
            tracing::warn!("[NORMALIZE] 下载内容不是图片: {} 字节", bytes.len());
            return Err(NormalizeError::NotAnImage(
                "cannot identify image file".to_string(),
            ));
        }
        Ok(bytes)
    }
}

/// 确定最终提示词
fn resolve_prompt(prompt: Option<&str>, has_image: bool) -> Result<String, NormalizeError> {
    let prompt = prompt.map(str::trim).unwrap_or_default();
    match (prompt.is_empty(), has_image) {
        (false, _) => Ok(prompt.to_string()),
        (true, true) => Ok(DEFAULT_IMAGE_PROMPT.to_string()),
        (true, false) => Err(NormalizeError::MissingPrompt),
    }
}

/// base64 编码图片，并嗅探 MIME 类型
pub fn encode_image(bytes: &[u8]) -> EncodedImage {
    EncodedImage {
        base64: STANDARD.encode(bytes),
        mime_type: infer::get(bytes)
            .map(|k| k.mime_type().to_string())
            .unwrap_or_else(|| UNKNOWN_MIME.to_string()),
        size: bytes.len(),
    }
}

/// URL 必须同时带有 scheme 和 host
pub fn is_valid_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => !parsed.scheme().is_empty() && parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}
