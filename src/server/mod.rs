//! HTTP 服务器
//!
//! # 路由
//!
//! | 方法 | 路径 | 说明 |
//! |---|---|---|
//! | GET | `/` | 服务状态 |
//! | GET | `/health` | 后端健康检查 |
//! | POST | `/chat` | 非流式文本 |
//! | POST | `/analyze` | 非流式图文（multipart） |
//! | GET | `/stream` | SSE 文本 |
//! | POST | `/stream-analyze` | SSE 图文（multipart） |

pub mod error;
pub mod handlers;

#[cfg(test)]
mod tests;

pub use error::ApiError;

use crate::backends::{Backend, ClientError, OllamaBackend};
use crate::config::Config;
use crate::services::RequestNormalizer;
use crate::translator::StreamTranslator;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// 服务器共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    pub translator: StreamTranslator,
    pub normalizer: RequestNormalizer,
}

impl AppState {
    /// 使用 Ollama 后端创建
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let backend: Arc<dyn Backend> = Arc::new(OllamaBackend::new(&config.backend)?);
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: Config, backend: Arc<dyn Backend>) -> Result<Self, ClientError> {
        let normalizer = RequestNormalizer::new(&config.backend)?;
        let translator = StreamTranslator::new(backend.clone(), &config);
        Ok(Self {
            config: Arc::new(config),
            backend,
            translator,
            normalizer,
        })
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/analyze", post(handlers::analyze))
        .route("/stream", get(handlers::stream))
        .route("/stream-analyze", post(handlers::stream_analyze))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

/// CORS：允许配置中的来源，方法与请求头按预检请求回显，允许携带凭证
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("[SERVER] 忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// 启动服务器，直到收到 Ctrl-C
pub async fn serve(state: AppState) -> std::io::Result<()> {
    let addr = state.config.bind_addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("[SERVER] 监听 {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("[SERVER] 监听退出信号失败: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("[SERVER] 正在关闭");
        })
        .await
}
