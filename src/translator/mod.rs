//! 协议转换层
//!
//! 把经过校验的 [`InferenceRequest`] 转换为后端请求，并把后端的 NDJSON
//! 流转换为统一的 [`StreamEvent`](crate::stream::StreamEvent) 序列。
//!
//! # 架构设计
//!
//! ```text
//! translator/
//! ├── request.rs   # InferenceRequest → GenerateRequest
//! └── stream.rs    # 流式转换状态机（连接、背压、取消）
//! ```
//!
//! 非流式调用不经过状态机，直接由 [`complete`] 完成。

pub mod request;
pub mod stream;


pub use request::build_generate_request;
pub use stream::{
    connect_error_event, StreamTranslator, TranslateOutcome, TranslatorHandle, TranslatorState,
};

use crate::backends::{Backend, BackendResult};
use crate::logger::{preview, PROMPT_PREVIEW_CHARS};
use crate::models::InferenceRequest;

/// 非流式调用：返回完整回复文本
///
/// `response` 为空时回退为后端响应的原始 JSON。
pub async fn complete(
    backend: &dyn Backend,
    model: &str,
    request: &InferenceRequest,
) -> BackendResult<String> {
    let body = build_generate_request(request, model, false);
    tracing::info!(
        "[UNARY] 调用后端 {}: prompt={} image={}",
        backend.name(),
        preview(&request.prompt, PROMPT_PREVIEW_CHARS),
        request.has_image()
    );
    let reply = backend.generate(&body).await?;
    Ok(reply.into_text())
}
