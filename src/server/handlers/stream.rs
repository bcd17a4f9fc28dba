//! SSE 流式端点
//!
//! 校验与图片处理在返回响应前完成，失败时返回普通 JSON 错误；
//! 响应头发出之后的一切失败都以 SSE 错误事件的形式出现在流中。

use super::read_image_form;
use crate::models::{InferenceRequest, StreamQuery};
use crate::server::{ApiError, AppState};
use crate::stream::SseGenerator;
use axum::{
    body::{Body, Bytes},
    extract::{rejection::QueryRejection, Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use std::convert::Infallible;

/// `GET /stream?prompt=...`（纯文本）
pub async fn stream(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let inference = state.normalizer.normalize_text(&query.prompt, true)?;
    Ok(start_stream(&state, inference))
}

/// `POST /stream-analyze`（multipart：`prompt`、`image`、`image_url`）
pub async fn stream_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_image_form(multipart).await?;
    let inference = state.normalizer.normalize_form(form, true).await?;
    Ok(start_stream(&state, inference))
}

fn start_stream(state: &AppState, inference: InferenceRequest) -> Response {
    let handle = state.translator.spawn(inference);
    tracing::info!("[STREAM] 开始 SSE 响应: request_id={}", handle.request_id());

    let generator = SseGenerator::new();
    let body_stream = handle
        .into_stream()
        .map(move |event| Ok::<Bytes, Infallible>(Bytes::from(generator.generate(&event))));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"detail": "Failed to build streaming response"})),
            )
                .into_response()
        })
}
