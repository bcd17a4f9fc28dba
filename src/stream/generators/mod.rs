//! SSE 流生成器
//!
//! 将统一的 `StreamEvent` 转换为前端 SSE 格式。

pub mod sse;

pub use sse::{SseGenerator, DONE_EVENT};
