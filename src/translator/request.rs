//! 推理请求 → Ollama `/api/generate` 请求体

use crate::models::{GenerateRequest, InferenceRequest};

/// 构建后端请求体
///
/// `stream` 由调用路径决定：流式转换器总是传 `true`。
pub fn build_generate_request(
    request: &InferenceRequest,
    model: &str,
    stream: bool,
) -> GenerateRequest {
    GenerateRequest::new(model, request.prompt.as_str(), stream).with_image(request.image_base64())
}
