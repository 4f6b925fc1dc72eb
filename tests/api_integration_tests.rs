//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycles against a scripted model client and
//! temporary cache and prompt directories.

use std::collections::VecDeque;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use exam_lens::{
    api::create_router,
    cache::{explanation_key, extraction_key, EXPLAIN_DIR, EXTRACT_DIR},
    error::Result,
    gateway::ModelClient,
    normalizer::NormalizedImage,
    AppState, Config, ServiceError,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "exam-lens-test-boundary";
const HIT_DELAY: Duration = Duration::from_millis(60);

// == Helper Types ==

#[derive(Default)]
struct FakeModel {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<(String, bool)>>,
}

impl FakeModel {
    fn replying(replies: &[&str]) -> Arc<Self> {
        let model = Self::default();
        for reply in replies {
            model
                .replies
                .lock()
                .unwrap()
                .push_back(Ok(reply.to_string()));
        }
        Arc::new(model)
    }

    fn failing(times: usize) -> Arc<Self> {
        let model = Self::default();
        for i in 0..times {
            model
                .replies
                .lock()
                .unwrap()
                .push_back(Err(ServiceError::Upstream(format!("attempt {} failed", i + 1))));
        }
        Arc::new(model)
    }

    fn calls(&self) -> Vec<(String, bool)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for FakeModel {
    async fn complete(&self, prompt: &str, image: Option<&NormalizedImage>) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), image.is_some()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Upstream("no reply scripted".to_string())))
    }
}

struct TestApp {
    dir: TempDir,
    router: Router,
}

impl TestApp {
    fn cache_file(&self, sub: &str, key: &str) -> PathBuf {
        self.dir
            .path()
            .join("cache")
            .join(sub)
            .join(format!("{}.json", key))
    }
}

// == Helper Functions ==

async fn create_test_app(model: Arc<FakeModel>, with_prompts: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let prompt_dir = dir.path().join("prompts");
    std::fs::create_dir_all(&prompt_dir).unwrap();
    if with_prompts {
        std::fs::write(prompt_dir.join("prompt_math.txt"), "MATH EXTRACT").unwrap();
        std::fs::write(prompt_dir.join("prompt_english.txt"), "ENGLISH EXTRACT").unwrap();
        std::fs::write(prompt_dir.join("explain_math.txt"), "MATH EXPLAIN {{QUESTION_JSON}}").unwrap();
        std::fs::write(
            prompt_dir.join("explain_english.txt"),
            "ENGLISH EXPLAIN {{QUESTION_JSON}}",
        )
        .unwrap();
    }

    let config = Config {
        cache_dir: dir.path().join("cache"),
        prompt_dir,
        model_retries: 2,
        model_retry_delay: Duration::from_millis(5),
        explain_hit_delay: HIT_DELAY,
        ..Config::default()
    };
    let state = AppState::with_client(&config, model).await.unwrap();

    TestApp {
        dir,
        router: create_router(state),
    }
}

fn sample_png(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, seed])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn multipart_body(file: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"paper.png\"\r\nContent-Type: image/png\r\n\r\n",
        BOUNDARY
    )
    .into_bytes();
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn post_extract(app: &TestApp, query: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/extract{}", query))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn post_explain(app: &TestApp, payload: &str) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/explain")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == Extract Endpoint Tests ==

#[tokio::test]
async fn test_extract_auto_subject_then_cache_hit() {
    let model = FakeModel::replying(&["这是数学试卷", r#"{"paper_title":"月考","questions":[]}"#]);
    let app = create_test_app(model.clone(), true).await;
    let png = sample_png(300, 200, 1);

    let (status, json) = post_extract(&app, "?subject=auto", multipart_body(&png)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["from_cache"], false);
    assert_eq!(json["data"]["subject"], "math");
    assert_eq!(json["data"]["result"]["paper_title"], "月考");
    assert!(json["data"].get("raw").is_none());
    assert!(app.cache_file(EXTRACT_DIR, &extraction_key(&png)).is_file());

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, "MATH EXTRACT");
    assert!(calls.iter().all(|(_, with_image)| *with_image));

    // Same image, different declared subject: served from the cached entry
    // under the subject it was extracted as
    let (status, again) = post_extract(&app, "?subject=english", multipart_body(&png)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["data"]["from_cache"], true);
    assert_eq!(again["data"]["subject"], "math");
    assert_eq!(again["data"]["result"], json["data"]["result"]);
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn test_extract_default_subject_is_auto() {
    let model = FakeModel::replying(&["英语", r#"{"subject":"english"}"#]);
    let app = create_test_app(model.clone(), true).await;

    let (status, json) = post_extract(&app, "", multipart_body(&sample_png(20, 20, 2))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["subject"], "english");
    assert_eq!(model.calls()[1].0, "ENGLISH EXTRACT");
}

#[tokio::test]
async fn test_extract_debug_returns_raw_text() {
    let model = FakeModel::replying(&["not json at all"]);
    let app = create_test_app(model, true).await;

    let (status, json) = post_extract(
        &app,
        "?subject=math&debug=true",
        multipart_body(&sample_png(20, 20, 3)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["result"], json!({"raw_output": "not json at all"}));
    assert_eq!(json["data"]["raw"], "not json at all");
}

#[tokio::test]
async fn test_extract_undecodable_image() {
    let model = FakeModel::replying(&["{}"]);
    let app = create_test_app(model.clone(), true).await;

    let (status, json) = post_extract(&app, "?subject=math", multipart_body(b"garbage")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], 1);
    assert!(json["data"].is_null());
    assert!(json["msg"].as_str().unwrap().contains("decode"));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_extract_missing_file_field() {
    let model = FakeModel::replying(&[]);
    let app = create_test_app(model, true).await;

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"subject\"\r\n\r\nmath\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let (status, json) = post_extract(&app, "", body.into_bytes()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], 1);
    assert!(json["msg"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn test_extract_upstream_failure_after_retries() {
    let model = FakeModel::failing(3);
    let app = create_test_app(model.clone(), true).await;
    let png = sample_png(20, 20, 4);

    let (status, json) = post_extract(&app, "?subject=math", multipart_body(&png)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], 1);
    assert!(json["msg"].as_str().unwrap().contains("attempt 3 failed"));
    assert_eq!(model.calls().len(), 3);
    assert!(!app.cache_file(EXTRACT_DIR, &extraction_key(&png)).exists());
}

// == Explain Endpoint Tests ==

#[tokio::test]
async fn test_explain_miss_then_delayed_hit() {
    let model = FakeModel::replying(&["先移项，再合并同类项。"]);
    let app = create_test_app(model.clone(), true).await;
    let payload = r#"{"subject":"math","question":{"id":"5","stem":"解方程 2x+1=5"}}"#;

    let (status, first) = post_explain(&app, payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["code"], 0);
    assert_eq!(first["data"]["from_cache"], false);
    assert_eq!(first["data"]["explanation"], "先移项，再合并同类项。");

    let question = json!({"id": "5", "stem": "解方程 2x+1=5"});
    assert!(app
        .cache_file(EXPLAIN_DIR, &explanation_key("math", &question))
        .is_file());

    let (status, second) = post_explain(&app, payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["from_cache"], true);
    assert_eq!(second["data"]["explanation"], first["data"]["explanation"]);
    assert!(second["data"]["cost"].as_f64().unwrap() >= HIT_DELAY.as_secs_f64());
    assert_eq!(model.calls().len(), 1);
}

#[tokio::test]
async fn test_explain_key_order_independent() {
    let model = FakeModel::replying(&["B is correct"]);
    let app = create_test_app(model.clone(), true).await;

    post_explain(
        &app,
        r#"{"subject":"english","question":{"id":"1","options":{"A":"go","B":"went"}}}"#,
    )
    .await;
    let (_, json) = post_explain(
        &app,
        r#"{"question":{"options":{"B":"went","A":"go"},"id":"1"},"subject":"english"}"#,
    )
    .await;

    assert_eq!(json["data"]["from_cache"], true);
    assert_eq!(model.calls().len(), 1);
    assert!(model.calls()[0].0.starts_with("ENGLISH EXPLAIN"));
    assert!(!model.calls()[0].1);
}

#[tokio::test]
async fn test_explain_blank_prompt_never_calls_model() {
    let model = FakeModel::replying(&["unused"]);
    let app = create_test_app(model.clone(), false).await;

    let (status, json) = post_explain(&app, r#"{"subject":"math","question":{"id":"1"}}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], 1);
    assert!(json["msg"].as_str().unwrap().starts_with("Invalid request"));
    assert!(model.calls().is_empty());
}

// == Stats / Health Tests ==

#[tokio::test]
async fn test_stats_after_traffic() {
    let model = FakeModel::replying(&["explained"]);
    let app = create_test_app(model, true).await;
    let payload = r#"{"subject":"math","question":{"id":"7"}}"#;
    post_explain(&app, payload).await;
    post_explain(&app, payload).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"]["explain"]["hits"], 1);
    assert_eq!(json["data"]["explain"]["misses"], 1);
    assert_eq!(json["data"]["explain"]["total_entries"], 1);
    assert_eq!(json["data"]["extract"]["total_entries"], 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(FakeModel::replying(&[]), true).await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}
