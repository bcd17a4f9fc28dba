//! NDJSON 行帧解析器
//!
//! 后端以换行分隔的 JSON 对象输出生成结果：
//!
//! ```text
//! {"model":"gemma3","response":"Hel","done":false}
//! {"model":"gemma3","response":"lo","done":false}
//! {"model":"gemma3","response":"","done":true,"eval_count":2}
//! ```
//!
//! 解析规则：
//! - 严格按 `\n` 切分，行尾 `\r` 与首尾空白被去除，空行跳过
//! - 未以换行结束的数据留在缓冲区，直到新数据到达或调用 `finish()`
//! - 帧可以跨越任意字节块边界（包括多字节 UTF-8 字符中间）
//! - JSON 对象：`response` 为字符串时输出 `Text`；`error` 为字符串时输出 `Error` 并结束；
//!   `done == true` 时在本帧文本之后输出 `Done` 并结束
//! - 非 JSON 对象的行原样作为 `Text` 输出，不丢弃后端发来的任何数据
//! - 未完成行超过 `max_line_bytes` 时输出 `Error` + `Done` 并结束

use crate::models::BackendFrame;
use crate::stream::events::StreamEvent;

/// 解析器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserState {
    /// 正在接收帧
    #[default]
    Streaming,
    /// 已收到 `done` 或错误帧，后续数据被忽略
    Finished,
}

/// 解析统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// 已处理的非空行数
    pub frames: usize,
    /// 按原文回退的行数
    pub raw_lines: usize,
}

/// 单行默认长度上限
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// NDJSON 行帧解析器
#[derive(Debug)]
pub struct NdjsonParser {
    /// 尚未遇到换行的字节
    buffer: Vec<u8>,
    /// buffer 中已确认不含换行的前缀长度，避免重复扫描
    scanned: usize,
    max_line_bytes: usize,
    state: ParserState,
    stats: ParserStats,
}

impl Default for NdjsonParser {
    fn default() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }
}

impl NdjsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes: max_line_bytes.max(1),
            state: ParserState::default(),
            stats: ParserStats::default(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.state == ParserState::Finished
    }

    /// 缓冲区中未完成行的字节数
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// 处理一个字节块，返回其中完整行产生的事件
    pub fn process(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }

        self.buffer.extend_from_slice(bytes);

        let mut start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            start = end + 1;
            search_from = start;

            self.process_line(&line, &mut events);
            if self.is_finished() {
                self.buffer.clear();
                self.scanned = 0;
                return events;
            }
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_bytes {
            tracing::warn!(
                "[NDJSON] 未完成行 {} 字节，超过上限 {}",
                self.buffer.len(),
                self.max_line_bytes
            );
            events.push(StreamEvent::error(
                None,
                "Backend line too long",
                Some(format!(
                    "unterminated line exceeds {} bytes",
                    self.max_line_bytes
                )),
            ));
            events.push(StreamEvent::Done);
            self.buffer = Vec::new();
            self.scanned = 0;
            self.state = ParserState::Finished;
        }
        events
    }

    /// 流结束时调用：把缓冲区中没有换行结尾的最后一行当作完整帧处理
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.is_finished() && !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.process_line(&line, &mut events);
        }
        self.buffer.clear();
        self.scanned = 0;
        events
    }

    /// 重置解析器状态
    pub fn reset(&mut self) {
        *self = Self::with_max_line_bytes(self.max_line_bytes);
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.stats.frames += 1;

        let frame = if line.starts_with('{') {
            serde_json::from_str::<BackendFrame>(line).ok()
        } else {
            None
        };

        let Some(frame) = frame else {
            self.stats.raw_lines += 1;
            tracing::debug!("[NDJSON] 非 JSON 帧，按原文输出: {} 字节", line.len());
            events.push(StreamEvent::text(line));
            return;
        };

        if let Some(fragment) = frame.response_fragment {
            events.push(StreamEvent::text(fragment));
        }

        if let Some(error) = frame.error {
            tracing::warn!("[NDJSON] 后端在流内报告错误: {}", error);
            events.push(StreamEvent::error(
                None,
                "Backend reported an error",
                Some(error),
            ));
            events.push(StreamEvent::Done);
            self.state = ParserState::Finished;
            return;
        }

        if frame.done {
            events.push(StreamEvent::Done);
            self.state = ParserState::Finished;
        }
    }
}
