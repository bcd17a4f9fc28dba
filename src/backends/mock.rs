//! 测试用的脚本化后端

use super::traits::{Backend, BackendError, BackendResult, ByteStream};
use crate::models::{BackendHealth, BackendStatus, GenerateRequest, GenerateResponse};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// 流式调用的预设回复
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// 依次产出字节块；`Err` 表示读取失败。`hang` 为真时在最后一块之后永远挂起
    Chunks {
        chunks: Vec<Result<Bytes, String>>,
        hang: bool,
    },
    /// 建立连接即失败
    Fail(BackendError),
}

impl StreamScript {
    pub fn lines(lines: &[&str]) -> Self {
        StreamScript::Chunks {
            chunks: lines
                .iter()
                .map(|l| Ok(Bytes::from(format!("{}\n", l))))
                .collect(),
            hang: false,
        }
    }
}

/// 丢弃时置位，用于观察后端字节流是否被关闭
struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct MockBackend {
    script: StreamScript,
    unary: BackendResult<GenerateResponse>,
    health: BackendHealth,
    last_request: Mutex<Option<GenerateRequest>>,
    stream_closed: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new(script: StreamScript) -> Self {
        Self {
            script,
            unary: Ok(GenerateResponse {
                response: Some("unary reply".to_string()),
                done: true,
                extra: Default::default(),
            }),
            health: BackendHealth {
                status: BackendStatus::Connected,
                error: None,
            },
            last_request: Mutex::new(None),
            stream_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_unary(mut self, reply: BackendResult<GenerateResponse>) -> Self {
        self.unary = reply;
        self
    }

    pub fn with_health(mut self, health: BackendHealth) -> Self {
        self.health = health;
        self
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn stream_closed(&self) -> bool {
        self.stream_closed.load(Ordering::SeqCst)
    }

    fn record(&self, request: &GenerateRequest) {
        *self.last_request.lock().unwrap() = Some(request.clone());
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn open_stream(&self, request: &GenerateRequest) -> BackendResult<ByteStream> {
        self.record(request);
        match self.script.clone() {
            StreamScript::Fail(err) => Err(err),
            StreamScript::Chunks { chunks, hang } => {
                let guard = SetOnDrop(self.stream_closed.clone());
                let stream = async_stream::stream! {
                    let _guard = guard;
                    for chunk in chunks {
                        match chunk {
                            Ok(bytes) => yield Ok(bytes),
                            Err(msg) => {
                                let err: Box<dyn std::error::Error + Send + Sync> = msg.into();
                                yield Err(err);
                            }
                        }
                    }
                    if hang {
                        futures::future::pending::<()>().await;
                    }
                };
                Ok(Box::pin(stream))
            }
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> BackendResult<GenerateResponse> {
        self.record(request);
        self.unary.clone()
    }

    async fn health(&self) -> BackendHealth {
        self.health.clone()
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn base_url(&self) -> &str {
        "http://mock.invalid"
    }
}
