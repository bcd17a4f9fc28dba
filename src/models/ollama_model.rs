//! Ollama 协议模型
//!
//! `/api/generate` 与 `/api/tags` 的请求/响应结构。

use serde::{Deserialize, Serialize};

/// `/api/generate` 请求体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateRequest {
    /// 模型标识
    pub model: String,
    /// 提示词
    pub prompt: String,
    /// base64 编码的图片列表
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// 是否流式输出
    pub stream: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, stream: bool) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            images: None,
            stream,
        }
    }

    /// 附加一张 base64 图片
    pub fn with_image(mut self, image_base64: Option<String>) -> Self {
        if let Some(image) = image_base64 {
            self.images.get_or_insert_with(Vec::new).push(image);
        }
        self
    }
}

/// 非流式 `/api/generate` 响应
///
/// 只声明用到的字段，其余字段保留在 `extra` 中，以便 `response` 为空时原样回传。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerateResponse {
    /// 提取回复文本；`response` 为空时回退为整个响应的 JSON
    pub fn into_text(self) -> String {
        match self.response {
            Some(text) if !text.is_empty() => text,
            _ => serde_json::to_string(&self).unwrap_or_default(),
        }
    }
}

/// 流式响应中的单行帧
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BackendFrame {
    /// 本帧的增量文本
    #[serde(default, rename = "response")]
    pub response_fragment: Option<String>,
    /// 是否为最后一帧
    #[serde(default)]
    pub done: bool,
    /// 后端在流内报告的错误
    #[serde(default)]
    pub error: Option<String>,
}

/// `/api/tags` 响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTag {
    #[serde(default)]
    pub name: String,
}

impl TagsResponse {
    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.name == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_without_image() {
        let req = GenerateRequest::new("gemma3:latest", "hi", true);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "gemma3:latest", "prompt": "hi", "stream": true})
        );
    }

    #[test]
    fn test_generate_request_with_image() {
        let req = GenerateRequest::new("m", "p", false).with_image(Some("aGVsbG8=".to_string()));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["images"], serde_json::json!(["aGVsbG8="]));
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_generate_response_text_fallback() {
        let resp: GenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"","done":true}"#).unwrap();
        let text = resp.into_text();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["model"], "m");
        assert_eq!(value["done"], true);

        let resp: GenerateResponse =
            serde_json::from_str(r#"{"response":"a cat","done":true}"#).unwrap();
        assert_eq!(resp.into_text(), "a cat");
    }

    #[test]
    fn test_backend_frame_defaults() {
        let frame: BackendFrame = serde_json::from_str(r#"{"model":"m"}"#).unwrap();
        assert_eq!(frame, BackendFrame::default());

        let frame: BackendFrame =
            serde_json::from_str(r#"{"response":"Hi","done":false}"#).unwrap();
        assert_eq!(frame.response_fragment.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_tags_has_model() {
        let tags: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"gemma3:latest"},{"name":"llava"}]}"#)
                .unwrap();
        assert!(tags.has_model("llava"));
        assert!(!tags.has_model("llama3"));
        assert_eq!(tags.model_names(), vec!["gemma3:latest", "llava"]);
    }
}
