//! 路由测试

use super::*;
use crate::backends::mock::{MockBackend, StreamScript};
use crate::backends::BackendError;
use crate::models::{BackendHealth, BackendStatus};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::routing::post;
use tower::ServiceExt;

const BOUNDARY: &str = "visioncast-test-boundary";

fn router_with(backend: MockBackend) -> (Router, Arc<MockBackend>) {
    let backend = Arc::new(backend);
    let state = AppState::with_backend(Config::default(), backend.clone()).unwrap();
    (build_router(state), backend)
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    serde_json::from_str(&body_string(resp).await).unwrap()
}

/// 构造 multipart 请求体，`image` 为 (文件名, 字节)
fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_stream_returns_sse_body() {
    let (router, _) = router_with(MockBackend::new(StreamScript::lines(&[
        r#"{"response":"Hi","done":false}"#,
        r#"{"response":" there","done":false}"#,
        r#"{"response":"","done":true}"#,
    ])));

    let resp = router
        .oneshot(
            Request::builder()
                .uri("/stream?prompt=hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(resp.headers()["x-accel-buffering"], "no");

    assert_eq!(
        body_string(resp).await,
        "data: {\"text\":\"Hi\"}\n\n\
         data: {\"text\":\" there\"}\n\n\
         data: {\"text\":\"\"}\n\n\
         event: done\ndata: {}\n\n"
    );
}

#[tokio::test]
async fn test_stream_backend_status_error_in_band() {
    let (router, _) = router_with(MockBackend::new(StreamScript::Fail(
        BackendError::from_status(500, "model crashed"),
    )));

    let resp = router
        .oneshot(
            Request::builder()
                .uri("/stream?prompt=hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_string(resp).await;
    assert!(!body.contains("\"text\""));
    assert!(body.starts_with("data: {\"error\":true,\"status_code\":500,"));
    assert!(body.contains("\"detail\":\"model crashed\""));
    assert!(body.ends_with("event: done\ndata: {}\n\n"));
}

#[tokio::test]
async fn test_stream_empty_prompt_rejected() {
    let (router, backend) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let resp = router
        .oneshot(
            Request::builder()
                .uri("/stream?prompt=%20%20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["detail"], "Prompt is required");
    assert!(backend.last_request().is_none());
}

#[tokio::test]
async fn test_stream_missing_prompt_rejected_as_json() {
    let (router, backend) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let resp = router
        .oneshot(Request::builder().uri("/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(body_json(resp).await["detail"], "Prompt is required");
    assert!(backend.last_request().is_none());
}

#[tokio::test]
async fn test_chat_malformed_json_rejected_as_json() {
    let (router, backend) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt": "hi""#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert!(!json["detail"].as_str().unwrap().is_empty());
    assert!(backend.last_request().is_none());
}

#[tokio::test]
async fn test_chat_missing_prompt_rejected() {
    let (router, _) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["detail"], "Prompt is required");
}

#[tokio::test]
async fn test_chat_rejects_stream_flag() {
    let (router, _) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"hi","stream":true}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .contains("GET /stream?prompt="));
}

#[tokio::test]
async fn test_chat_unary_reply() {
    let (router, backend) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"hi"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["response"], "unary reply");
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Response generated successfully");
    assert!(!backend.last_request().unwrap().stream);
}

#[tokio::test]
async fn test_chat_backend_unreachable_is_503() {
    let backend = MockBackend::new(StreamScript::lines(&[])).with_unary(Err(BackendError::new(
        crate::backends::BackendErrorKind::Connection,
        "connection refused",
    )));
    let (router, _) = router_with(backend);

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"hi"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body_json(resp).await["detail"],
        "Cannot reach Ollama: connection refused"
    );
}

#[tokio::test]
async fn test_analyze_with_upload_uses_default_prompt() {
    let png: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let (router, backend) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let body = multipart_body(&[("prompt", "")], Some(("cat.png", png)));
    let resp = router
        .oneshot(multipart_request("/analyze", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await["message"],
        "Analysis completed successfully"
    );

    let sent = backend.last_request().unwrap();
    assert_eq!(sent.prompt, crate::services::DEFAULT_IMAGE_PROMPT);
    assert_eq!(sent.images.map(|i| i.len()), Some(1));
}

#[tokio::test]
async fn test_stream_analyze_empty_upload_rejected() {
    let (router, _) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let body = multipart_body(&[("prompt", "describe")], Some(("empty.png", b"".as_slice())));
    let resp = router
        .oneshot(multipart_request("/stream-analyze", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["detail"], "Uploaded image is empty");
}

#[tokio::test]
async fn test_stream_analyze_text_only() {
    let (router, backend) = router_with(MockBackend::new(StreamScript::lines(&[
        r#"{"response":"ok","done":true}"#,
    ])));

    let body = multipart_body(&[("prompt", "hello")], None);
    let resp = router
        .oneshot(multipart_request("/stream-analyze", body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_string(resp).await,
        "data: {\"text\":\"ok\"}\n\nevent: done\ndata: {}\n\n"
    );
    assert!(backend.last_request().unwrap().images.is_none());
}

#[tokio::test]
async fn test_health_reports_backend_status() {
    let backend = MockBackend::new(StreamScript::lines(&[])).with_health(BackendHealth {
        status: BackendStatus::Disconnected,
        error: Some("Cannot connect to Ollama at http://mock.invalid".to_string()),
    });
    let (router, _) = router_with(backend);

    let resp = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ollama_status"], "disconnected");
    assert_eq!(json["ollama_url"], "http://mock.invalid");
    assert_eq!(json["model"], "gemma3:latest");

    let resp = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["ollama_status"], "disconnected");
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let (router, _) = router_with(MockBackend::new(StreamScript::lines(&[])));

    let resp = router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/chat")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

/// 真实的 OllamaBackend 连接本地假服务，验证完整的 NDJSON → SSE 链路
#[tokio::test]
async fn test_end_to_end_with_ollama_backend() {
    let fake = Router::new().route(
        "/api/generate",
        post(|| async {
            "{\"response\":\"line1\\nline2\",\"done\":false}\nnot json\n{\"response\":\"\",\"done\":true}\n"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, fake).await.unwrap();
    });

    let mut config = Config::default();
    config.backend.base_url = format!("http://{}", addr);
    let router = build_router(AppState::new(config).unwrap());

    let resp = router
        .oneshot(
            Request::builder()
                .uri("/stream?prompt=hi")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        body_string(resp).await,
        "data: {\"text\":\"line1\\nline2\"}\n\n\
         data: {\"text\":\"not json\"}\n\n\
         data: {\"text\":\"\"}\n\n\
         event: done\ndata: {}\n\n"
    );
}
