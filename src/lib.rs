//! visioncast：把 Ollama 的 NDJSON 流式生成转换为浏览器可直接消费的 SSE
//!
//! # 模块
//!
//! - `backends`：与推理后端的 HTTP 通信
//! - `stream`：NDJSON 解析与 SSE 生成
//! - `translator`：流式转换状态机与非流式调用
//! - `services`：请求规范化（提示词、图片）
//! - `server`：axum 路由与处理器
//! - `config` / `logger`：配置与日志

pub mod backends;
pub mod config;
pub mod logger;
pub mod models;
pub mod server;
pub mod services;
pub mod stream;
pub mod translator;

use anyhow::Context;

/// 加载配置、初始化日志并运行服务器
pub async fn run() -> anyhow::Result<()> {
    let config = config::Config::load().context("加载配置失败")?;
    logger::init(&config.logging);

    tracing::info!(
        "[MAIN] 后端 {} 模型 {}",
        config.backend.base_url,
        config.backend.model
    );

    let state = server::AppState::new(config).context("创建 HTTP 客户端失败")?;
    server::serve(state).await.context("服务器异常退出")?;
    Ok(())
}
