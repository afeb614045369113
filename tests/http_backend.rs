//! 针对 axum mock 后端的端到端测试：提交 → 轮询 → 最终登记 → 下载

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use assetgen::application::ports::{NoopObserver, SubmissionPayload};
use assetgen::application::{
    DownloadAsset, DownloadAssetHandler, FinalizeGeneration, FinalizeGenerationHandler,
    GenerationError, SubmitGeneration, SubmitGenerationHandler,
};
use assetgen::domain::job::{GenerationResult, JobHandle, JobKind, JobProfiles, StatusRules};
use assetgen::domain::poll::PollConfig;
use assetgen::infrastructure::adapters::{
    HttpGenerationClient, HttpGenerationClientConfig, StaticCredentialProvider,
};
use assetgen::infrastructure::{InMemoryPollRegistry, PollOutcome, StatusPoller};

const TOKEN: &str = "test-token";

struct MockBackend {
    /// 前 N 次状态查询返回 500
    failing_polls: usize,
    /// 第几次状态查询开始返回成功
    ready_on: usize,
    status_calls: AtomicUsize,
    finalize_bodies: Mutex<Vec<Value>>,
    submit_content_types: Mutex<Vec<String>>,
}

impl MockBackend {
    fn new(failing_polls: usize, ready_on: usize) -> Arc<Self> {
        Arc::new(Self {
            failing_polls,
            ready_on,
            status_calls: AtomicUsize::new(0),
            finalize_bodies: Mutex::new(Vec::new()),
            submit_content_types: Mutex::new(Vec::new()),
        })
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "invalid token"})),
    )
        .into_response()
}

async fn submit(State(mock): State<Arc<MockBackend>>, headers: HeaderMap, _body: Bytes) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    mock.submit_content_types.lock().unwrap().push(content_type);

    Json(json!({
        "code": "ASSET_REQUESTED",
        "status": 200,
        "data": {"eventAssetId": 42, "eventId": 3}
    }))
    .into_response()
}

async fn status(
    State(mock): State<Arc<MockBackend>>,
    Path(asset_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if asset_id != 42 {
        return StatusCode::NOT_FOUND.into_response();
    }

    let call = mock.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
    if call <= mock.failing_polls {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream hiccup").into_response();
    }
    if call < mock.ready_on {
        return Json(json!({
            "code": "ASSET_GENERATION_PENDING",
            "status": 200,
            "data": {"type": "IMAGE", "assetUrl": ""}
        }))
        .into_response();
    }
    Json(json!({
        "code": "ASSET_GENERATION_SUCCESS",
        "status": 200,
        "data": {"type": "IMAGE", "assetUrl": "https://cdn.example.com/42.png", "assetId": 42}
    }))
    .into_response()
}

async fn broken_status() -> Response {
    (StatusCode::OK, "<html>gateway</html>").into_response()
}

async fn finalize(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    mock.finalize_bodies.lock().unwrap().push(body);
    Json(json!({"code": "EVENT_FINALIZED", "status": 200})).into_response()
}

async fn download(headers: HeaderMap, Query(query): Query<std::collections::HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match query.get("eventAssetId").map(String::as_str) {
        Some("42") => (StatusCode::OK, b"PNG-BYTES".to_vec()).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_backend(mock: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/api/events/assets/request", post(submit))
        .route("/api/events/assets/:asset_id/result", get(status))
        .route("/api/events/finalize", post(finalize))
        .route("/api/events/assets/download", get(download))
        .route("/broken/:asset_id", get(broken_status))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct Stack {
    client: Arc<HttpGenerationClient>,
    credentials: Arc<StaticCredentialProvider>,
    profiles: Arc<JobProfiles>,
    poller: StatusPoller,
}

fn stack(base_url: &str, token: Option<&str>, profiles: JobProfiles) -> Stack {
    let client = Arc::new(
        HttpGenerationClient::new(
            HttpGenerationClientConfig::new(base_url)
                .with_timeout(5)
                .with_profiles(profiles.clone()),
        )
        .unwrap(),
    );
    let credentials = Arc::new(StaticCredentialProvider::new(token));
    let poller = StatusPoller::new(
        client.clone(),
        credentials.clone(),
        InMemoryPollRegistry::new().arc(),
        Arc::new(StatusRules::default()),
    );
    Stack {
        client,
        credentials,
        profiles: Arc::new(profiles),
        poller,
    }
}

fn fast_polling() -> PollConfig {
    PollConfig::from_millis(20, 5_000).unwrap()
}

fn event_payload() -> SubmissionPayload {
    SubmissionPayload::multipart()
        .with_field("title", "Summer night market")
        .with_field("prompt", "lanterns over a busy street")
        .with_field("type", "IMAGE")
}

#[tokio::test]
async fn test_generate_poll_finalize_download() {
    let mock = MockBackend::new(0, 3);
    let base_url = spawn_backend(mock.clone()).await;
    let s = stack(&base_url, Some(TOKEN), JobProfiles::default());

    let handle = SubmitGenerationHandler::new(s.client.clone(), s.credentials.clone(), s.profiles.clone())
        .handle(SubmitGeneration {
            kind: JobKind::Event,
            payload: event_payload(),
        })
        .await
        .unwrap();
    assert_eq!(handle, JobHandle::new(JobKind::Event, 42, Some(3)));
    assert!(mock.submit_content_types.lock().unwrap()[0].starts_with("multipart/form-data"));

    let subscription = s.poller.start(handle, fast_polling(), Arc::new(NoopObserver));
    let result = match subscription.wait().await {
        PollOutcome::Succeeded(result) => result,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!(result.asset_url, "https://cdn.example.com/42.png");
    assert_eq!(result.result_asset_id, Some(42));
    assert_eq!(mock.status_calls.load(Ordering::SeqCst), 3);

    let description = "Lanterns glow above a crowded summer night market street.";
    let receipt = FinalizeGenerationHandler::new(s.client.clone(), s.credentials.clone(), s.profiles.clone())
        .handle(FinalizeGeneration {
            handle,
            result: result.clone(),
            description: description.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(receipt.result_asset_id, 42);
    assert_eq!(
        mock.finalize_bodies.lock().unwrap()[0],
        json!({"eventId": 3, "eventAssetId": 42, "description": description, "type": "IMAGE"})
    );

    let temp_dir = tempfile::tempdir().unwrap();
    let destination = temp_dir.path().join("assets").join("42.png");
    let download = DownloadAssetHandler::new(s.client.clone(), s.credentials.clone())
        .handle(DownloadAsset {
            handle,
            result: Some(result),
            destination: destination.clone(),
        })
        .await
        .unwrap();
    assert_eq!(download.size_bytes, 9);
    assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"PNG-BYTES");
}

#[tokio::test]
async fn test_rejected_token_is_authentication_error() {
    let mock = MockBackend::new(0, 1);
    let base_url = spawn_backend(mock).await;
    let s = stack(&base_url, Some("stale-token"), JobProfiles::default());

    let err = SubmitGenerationHandler::new(s.client.clone(), s.credentials.clone(), s.profiles.clone())
        .handle(SubmitGeneration {
            kind: JobKind::Event,
            payload: event_payload(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Authentication(_)), "{:?}", err);
}

#[tokio::test]
async fn test_server_errors_during_polling_are_retried() {
    let mock = MockBackend::new(2, 4);
    let base_url = spawn_backend(mock.clone()).await;
    let s = stack(&base_url, Some(TOKEN), JobProfiles::default());

    let subscription = s.poller.start(
        JobHandle::new(JobKind::Event, 42, Some(3)),
        fast_polling(),
        Arc::new(NoopObserver),
    );
    assert!(matches!(subscription.wait().await, PollOutcome::Succeeded(_)));
    assert_eq!(mock.status_calls.load(Ordering::SeqCst), 4);
    assert_eq!(subscription.ticks(), 4);
}

#[tokio::test]
async fn test_unparsable_status_bodies_report_malformed_response() {
    let mock = MockBackend::new(0, 1);
    let base_url = spawn_backend(mock).await;
    let mut profiles = JobProfiles::default();
    profiles.event.status_path = "/broken/{asset_id}".to_string();
    let s = stack(&base_url, Some(TOKEN), profiles);

    let subscription = s.poller.start(
        JobHandle::new(JobKind::Event, 42, Some(3)),
        PollConfig::from_millis(20, 300).unwrap(),
        Arc::new(NoopObserver),
    );
    match subscription.wait().await {
        PollOutcome::Failed(GenerationError::MalformedResponse { waited_ms, .. }) => {
            assert_eq!(waited_ms, 300)
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

/// 独立主机上的静态资源服务，记录收到的 Authorization 头
async fn spawn_cdn(seen: Arc<Mutex<Vec<Option<String>>>>) -> String {
    let app = Router::new().route(
        "/assets/:name",
        get(move |headers: HeaderMap| {
            let seen = seen.clone();
            async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                seen.lock().unwrap().push(auth);
                (StatusCode::OK, b"CDN-BYTES".to_vec()).into_response()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_download_from_foreign_host_omits_credential() {
    let mock = MockBackend::new(0, 1);
    let base_url = spawn_backend(mock).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let cdn_url = spawn_cdn(seen.clone()).await;
    let s = stack(&base_url, Some(TOKEN), JobProfiles::default());

    let temp_dir = tempfile::tempdir().unwrap();
    let destination = temp_dir.path().join("review.png");
    let receipt = DownloadAssetHandler::new(s.client.clone(), s.credentials.clone())
        .handle(DownloadAsset {
            handle: JobHandle::new(JobKind::Review, 5, Some(1)),
            result: Some(GenerationResult {
                asset_url: format!("{}/assets/review.png", cdn_url),
                result_asset_id: Some(5),
                asset_type: Some("IMAGE".to_string()),
            }),
            destination: destination.clone(),
        })
        .await
        .unwrap();

    assert_eq!(receipt.size_bytes, 9);
    assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"CDN-BYTES");
    assert_eq!(*seen.lock().unwrap(), vec![None]);
}

#[tokio::test]
async fn test_download_from_backend_url_keeps_credential() {
    let mock = MockBackend::new(0, 1);
    let base_url = spawn_backend(mock).await;
    let s = stack(&base_url, Some(TOKEN), JobProfiles::default());

    // 后端自己的下载地址需要鉴权，mock 会拒绝没有 token 的请求
    let temp_dir = tempfile::tempdir().unwrap();
    let receipt = DownloadAssetHandler::new(s.client.clone(), s.credentials.clone())
        .handle(DownloadAsset {
            handle: JobHandle::new(JobKind::Review, 5, Some(1)),
            result: Some(GenerationResult {
                asset_url: format!("{}/api/events/assets/download?eventAssetId=42", base_url),
                result_asset_id: Some(5),
                asset_type: None,
            }),
            destination: temp_dir.path().join("backend.png"),
        })
        .await
        .unwrap();
    assert_eq!(receipt.size_bytes, 9);
}
