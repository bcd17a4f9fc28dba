//! 数据模型

pub mod api_model;
pub mod inference_model;
pub mod ollama_model;

pub use api_model::{
    BackendHealth, BackendStatus, ChatResponse, HealthResponse, RootResponse, StreamQuery,
    TextRequest,
};
pub use inference_model::{EncodedImage, InferenceRequest};
pub use ollama_model::{BackendFrame, GenerateRequest, GenerateResponse, TagsResponse};
