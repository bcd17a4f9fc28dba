//! 流式处理层
//!
//! 提供统一的流式数据处理能力，包括：
//! - 事件类型定义 (events)
//! - 后端流格式解析 (parsers)
//! - 前端流格式生成 (generators)
//!
//! # 架构设计
//!
//! ```text
//! 后端 NDJSON 字节流 ──> [NdjsonParser] ──> StreamEvent ──> [SseGenerator] ──> 浏览器 SSE
//! ```
//!
//! 两端之间的编排（连接、背压、取消）由 `translator` 模块负责。

pub mod events;
pub mod generators;
pub mod parsers;


// 重新导出核心类型
pub use events::StreamEvent;
pub use generators::{SseGenerator, DONE_EVENT};
pub use parsers::{NdjsonParser, DEFAULT_MAX_LINE_BYTES, ParserState, ParserStats};
