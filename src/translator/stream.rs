//! 流式转换器
//!
//! 每个客户端流式请求对应一个独立的转换任务：
//!
//! ```text
//! Idle ──> Connecting ──> Streaming ──> Terminated
//!               │                          ▲
//!               └──── 连接失败 / 非 2xx ────┘
//! ```
//!
//! - 事件经有界 `mpsc` 通道送往客户端，通道满时转换任务挂起（背压）
//! - 到达客户端的流总以一个 `Done` 结束，错误路径为 `Error` + `Done`
//! - 客户端断开时取消令牌被触发，转换任务立即丢弃后端字节流（即关闭后端连接），不再发送事件
//! - 不做重试

use super::request::build_generate_request;
use crate::backends::{error_chain, Backend, BackendError, BackendErrorKind, ByteStream};
use crate::config::Config;
use crate::logger::{preview, PROMPT_PREVIEW_CHARS};
use crate::models::InferenceRequest;
use crate::stream::{NdjsonParser, StreamEvent, DEFAULT_MAX_LINE_BYTES};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;

/// 转换器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorState {
    Idle,
    Connecting,
    Streaming,
    Terminated,
}

/// 一次转换的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateOutcome {
    /// 正常结束，已发送 `Done`
    Completed,
    /// 已发送 `Error` + `Done`
    Failed,
    /// 客户端断开，未保证发送 `Done`
    Cancelled,
}

/// 客户端已断开
#[derive(Debug)]
struct ClientGone;

/// 流式转换器
///
/// 持有共享的后端（内部是共享连接池的 HTTP 客户端）和不可变配置，
/// 每次 [`StreamTranslator::spawn`] 启动一个互不共享状态的转换任务。
#[derive(Clone)]
pub struct StreamTranslator {
    backend: Arc<dyn Backend>,
    model: String,
    channel_capacity: usize,
    max_line_bytes: usize,
}

impl StreamTranslator {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self::with_settings(
            backend,
            config.backend.model.clone(),
            config.stream.channel_capacity,
        )
        .with_max_line_bytes(config.stream.max_line_bytes)
    }

    pub fn with_settings(
        backend: Arc<dyn Backend>,
        model: impl Into<String>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            channel_capacity: channel_capacity.max(1),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    /// 设置后端单个未完成行的上限
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 在后台任务中运行转换，返回客户端侧句柄
    pub fn spawn(&self, request: InferenceRequest) -> TranslatorHandle {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        let request_id = uuid::Uuid::new_v4().simple().to_string();

        let translator = self.clone();
        let task_cancel = cancel.clone();
        let guard = cancel.clone().drop_guard();
        let span = tracing::info_span!("stream", request_id = %request_id);
        tokio::spawn(
            async move {
                let outcome = translator.run(request, tx, task_cancel).await;
                tracing::info!("[STREAM] 转换结束: {:?}", outcome);
            }
            .instrument(span),
        );

        TranslatorHandle {
            events: rx,
            cancel,
            guard,
            request_id,
        }
    }

    /// 运行一次完整的转换
    pub async fn run(
        &self,
        request: InferenceRequest,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> TranslateOutcome {
        let mut session = Session::new(tx, cancel);

        let body = build_generate_request(&request, &self.model, true);
        session.transition(TranslatorState::Connecting);
        tracing::info!(
            "[STREAM] 连接后端 {}: prompt={} image={}",
            self.backend.name(),
            preview(&request.prompt, PROMPT_PREVIEW_CHARS),
            request.has_image()
        );

        let opened = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => None,
            opened = self.backend.open_stream(&body) => Some(opened),
        };

        let outcome = match opened {
            None => TranslateOutcome::Cancelled,
            Some(Ok(stream)) => {
                session.transition(TranslatorState::Streaming);
                session
                    .pump(stream, NdjsonParser::with_max_line_bytes(self.max_line_bytes))
                    .await
            }
            Some(Err(err)) => {
                tracing::warn!("[STREAM] 打开后端流失败: {}", preview(&err.to_string(), 300));
                session.fail(connect_error_event(&err)).await
            }
        };

        session.transition(TranslatorState::Terminated);
        outcome
    }
}

/// 单次转换会话：持有输出通道与取消令牌
struct Session {
    state: TranslatorState,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    events_sent: usize,
}

impl Session {
    fn new(tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            state: TranslatorState::Idle,
            tx,
            cancel,
            events_sent: 0,
        }
    }

    fn transition(&mut self, next: TranslatorState) {
        tracing::debug!("[STREAM] 状态 {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// 发送一个事件；通道满时挂起，客户端断开时返回 `ClientGone`
    async fn emit(&mut self, event: StreamEvent) -> Result<(), ClientGone> {
        tracing::debug!("[STREAM] 发送 {} 事件", event.kind());
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ClientGone),
            sent = self.tx.send(event) => sent,
        };
        sent.map_err(|_| ClientGone)?;
        self.events_sent += 1;
        Ok(())
    }

    /// 发送错误事件并以 `Done` 结束
    async fn fail(&mut self, error: StreamEvent) -> TranslateOutcome {
        if self.emit(error).await.is_err() || self.emit(StreamEvent::Done).await.is_err() {
            return TranslateOutcome::Cancelled;
        }
        TranslateOutcome::Failed
    }

    /// 从后端字节流读取、解析并转发事件
    ///
    /// 返回时 `stream` 已被丢弃，后端连接随之关闭。
    async fn pump(&mut self, mut stream: ByteStream, mut parser: NdjsonParser) -> TranslateOutcome {
        let mut failed = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!("[STREAM] 客户端断开，关闭后端连接");
                    return TranslateOutcome::Cancelled;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    tracing::debug!("[STREAM] 收到 {} 字节数据", bytes.len());
                    for event in parser.process(&bytes) {
                        let done = event.is_done();
                        failed |= event.is_error();
                        if self.emit(event).await.is_err() {
                            return TranslateOutcome::Cancelled;
                        }
                        if done {
                            return self.finished(failed, &parser);
                        }
                    }
                }
                Some(Err(e)) => {
                    let detail = error_chain(&*e);
                    tracing::error!("[STREAM] 流式传输错误: {}", detail);
                    drop(stream);
                    return self
                        .fail(StreamEvent::error(None, "Stream interrupted", Some(detail)))
                        .await;
                }
                None => {
                    drop(stream);
                    for event in parser.finish() {
                        let done = event.is_done();
                        failed |= event.is_error();
                        if self.emit(event).await.is_err() {
                            return TranslateOutcome::Cancelled;
                        }
                        if done {
                            return self.finished(failed, &parser);
                        }
                    }
                    if self.emit(StreamEvent::Done).await.is_err() {
                        return TranslateOutcome::Cancelled;
                    }
                    return self.finished(failed, &parser);
                }
            }
        }
    }

    fn finished(&self, failed: bool, parser: &NdjsonParser) -> TranslateOutcome {
        let stats = parser.stats();
        tracing::info!(
            "[STREAM] 流结束: frames={} raw_lines={} events={}",
            stats.frames,
            stats.raw_lines,
            self.events_sent
        );
        if failed {
            TranslateOutcome::Failed
        } else {
            TranslateOutcome::Completed
        }
    }
}

/// 把建立连接阶段的后端错误转换为错误事件
pub fn connect_error_event(err: &BackendError) -> StreamEvent {
    match err.kind {
        BackendErrorKind::Status => StreamEvent::error(
            err.status_code,
            "Backend returned an error",
            Some(err.message.clone()),
        ),
        BackendErrorKind::Connection => StreamEvent::error(
            None,
            "Failed to connect to backend",
            Some(err.message.clone()),
        ),
        BackendErrorKind::Timeout => StreamEvent::error(
            None,
            "Backend request timed out",
            Some(err.message.clone()),
        ),
        BackendErrorKind::Decode | BackendErrorKind::Other => StreamEvent::error(
            err.status_code,
            "Internal server error",
            Some(err.message.clone()),
        ),
    }
}

/// 客户端侧句柄
///
/// 句柄或由它转换出的事件流被丢弃时，转换任务会被取消。
pub struct TranslatorHandle {
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    guard: DropGuard,
    request_id: String,
}

impl TranslatorHandle {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 主动取消转换
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 接收下一个事件
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// 转换为事件流，供 HTTP 响应体消费
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let TranslatorHandle {
            mut events, guard, ..
        } = self;
        async_stream::stream! {
            let _guard = guard;
            while let Some(event) = events.recv().await {
                yield event;
            }
        }
    }
}
