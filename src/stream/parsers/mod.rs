//! 流式数据解析器
//!
//! 解析后端的流式响应格式，输出统一的 `StreamEvent`。
//!
//! # 支持的格式
//!
//! - NDJSON (Ollama `/api/generate`)

pub mod ndjson;

pub use ndjson::{NdjsonParser, DEFAULT_MAX_LINE_BYTES, ParserState, ParserStats};
