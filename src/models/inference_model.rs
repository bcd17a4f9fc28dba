//! 推理请求模型
//!
//! Normalizer 的输出、Translator 的输入。

/// 已编码的图片
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    /// base64 编码内容
    pub base64: String,
    /// 嗅探出的 MIME 类型
    pub mime_type: String,
    /// 原始字节数
    pub size: usize,
}

/// 经过校验的推理请求
///
/// 不变量：`prompt` 去除首尾空白后非空。
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub prompt: String,
    pub image: Option<EncodedImage>,
    pub streaming: bool,
}

impl InferenceRequest {
    pub fn text(prompt: impl Into<String>, streaming: bool) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            streaming,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// 取出图片的 base64 内容
    pub fn image_base64(&self) -> Option<String> {
        self.image.as_ref().map(|img| img.base64.clone())
    }
}
