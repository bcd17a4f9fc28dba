//! HTTP 请求处理器
//!
//! - `health.rs`：`GET /`、`GET /health`
//! - `chat.rs`：非流式 `POST /chat`、`POST /analyze`
//! - `stream.rs`：SSE `GET /stream`、`POST /stream-analyze`

pub mod chat;
pub mod health;
pub mod stream;

pub use chat::{analyze, chat};
pub use health::{health, root};
pub use stream::{stream, stream_analyze};

use crate::services::{ImageForm, NormalizeError};
use axum::extract::Multipart;

/// 读取 `prompt` / `image` / `image_url` 表单字段，其余字段忽略
pub(crate) async fn read_image_form(mut multipart: Multipart) -> Result<ImageForm, NormalizeError> {
    let mut form = ImageForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| NormalizeError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => {
                form.prompt = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| NormalizeError::Multipart(e.to_string()))?,
                );
            }
            "image_url" => {
                form.image_url = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| NormalizeError::Multipart(e.to_string()))?,
                );
            }
            "image" => {
                let unnamed = field.file_name().map_or(true, str::is_empty);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| NormalizeError::Multipart(e.to_string()))?;
                // 浏览器未选择文件时会提交一个无文件名的空字段
                if bytes.is_empty() && unnamed {
                    continue;
                }
                form.image = Some(bytes);
            }
            other => tracing::debug!("[FORM] 忽略字段: {}", other),
        }
    }

    Ok(form)
}
