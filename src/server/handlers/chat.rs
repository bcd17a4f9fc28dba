//! 非流式端点

use super::read_image_form;
use crate::models::{ChatResponse, TextRequest};
use crate::server::{ApiError, AppState};
use crate::translator;
use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};

/// `POST /chat`
///
/// `stream: true` 被拒绝：浏览器的 EventSource 只能发 GET，流式请走 `GET /stream`。
pub async fn chat(
    State(state): State<AppState>,
    request: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let inference = state.normalizer.normalize_text(&request.prompt, false)?;
    if request.stream {
        return Err(ApiError::BadRequest(
            "Streaming from POST is not supported. Use GET /stream?prompt=... for SSE.".to_string(),
        ));
    }

    tracing::info!("[CHAT] 处理非流式文本请求");
    let text = translator::complete(
        state.backend.as_ref(),
        state.translator.model(),
        &inference,
    )
    .await?;
    Ok(Json(ChatResponse::ok(text, "Response generated successfully")))
}

/// `POST /analyze`（multipart：`prompt`、`image`、`image_url`）
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ChatResponse>, ApiError> {
    let form = read_image_form(multipart).await?;
    let inference = state.normalizer.normalize_form(form, false).await?;

    tracing::info!(
        "[ANALYZE] 处理非流式请求: image={}",
        inference.has_image()
    );
    let text = translator::complete(
        state.backend.as_ref(),
        state.translator.model(),
        &inference,
    )
    .await?;
    Ok(Json(ChatResponse::ok(text, "Analysis completed successfully")))
}
