//! 后端调用层
//!
//! 提供与推理后端的 HTTP 通信能力。
//! 后端层只负责 HTTP 请求/响应，不包含任何协议转换逻辑。
//!
//! # 架构设计
//!
//! ```text
//! backends/
//! ├── traits.rs          # Backend trait 与错误类型
//! ├── client_factory.rs  # 流式 / 非流式 HTTP 客户端
//! └── ollama.rs          # Ollama /api/generate 后端
//! ```

pub mod client_factory;
pub mod ollama;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

// 重新导出核心类型
pub use client_factory::{ClientError, HttpClientFactory};
pub use ollama::OllamaBackend;
pub use traits::{error_chain, Backend, BackendError, BackendErrorKind, BackendResult, ByteStream};
