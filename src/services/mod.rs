//! 业务服务模块

pub mod normalizer;

pub use normalizer::{ImageForm, NormalizeError, RequestNormalizer, DEFAULT_IMAGE_PROMPT};
