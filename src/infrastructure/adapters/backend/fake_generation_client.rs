//! Fake Generation Client - 用于测试的生成服务后端
//!
//! 按脚本返回 submit / status / finalize 响应，并记录调用情况。
//! 不访问网络，也用于命令行的 `--fake` 模式。

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::application::ports::{BackendError, GenerationBackendPort, SubmissionPayload};
use crate::domain::job::{Credential, JobHandle, JobKind, JobProfile};

/// 脚本化的响应
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// 2xx + JSON 响应体
    Json(Value),
    /// 非 2xx
    HttpStatus(u16, String),
    /// 网络错误
    Network(String),
    /// 2xx 但响应体无法解析
    Unparsable(String),
    /// 延迟后返回内层响应
    Delayed(Duration, Box<FakeReply>),
}

impl FakeReply {
    pub fn pending() -> Self {
        Self::Json(json!({
            "code": "ASSET_GENERATION_PENDING",
            "status": 200,
            "data": {"type": "IMAGE", "assetUrl": ""}
        }))
    }

    pub fn success(asset_url: &str, asset_id: i64) -> Self {
        Self::Json(json!({
            "code": "ASSET_GENERATION_SUCCESS",
            "status": 200,
            "data": {"type": "IMAGE", "assetUrl": asset_url, "assetId": asset_id}
        }))
    }

    pub fn failed(reason: &str) -> Self {
        Self::Json(json!({
            "code": "ASSET_GENERATION_FAILED",
            "status": 200,
            "message": reason
        }))
    }

    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }

    async fn resolve(self) -> Result<Value, BackendError> {
        let mut reply = self;
        loop {
            match reply {
                FakeReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                FakeReply::Json(value) => return Ok(value),
                FakeReply::HttpStatus(status, message) => {
                    return Err(BackendError::HttpStatus { status, message })
                }
                FakeReply::Network(msg) => return Err(BackendError::NetworkError(msg)),
                FakeReply::Unparsable(raw) => {
                    return Err(BackendError::InvalidResponse(format!(
                        "expected JSON, got: {}",
                        raw
                    )))
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fake 生成服务后端
pub struct FakeGenerationBackend {
    submit_reply: Mutex<Option<FakeReply>>,
    status_script: Mutex<VecDeque<FakeReply>>,
    /// 脚本耗尽后的状态响应
    fallback_status: Mutex<FakeReply>,
    finalize_reply: Mutex<FakeReply>,
    download_bytes: Mutex<Vec<u8>>,
    submissions: AtomicUsize,
    status_calls: AtomicUsize,
    finalize_bodies: Mutex<Vec<Value>>,
    seen_tokens: Mutex<Vec<String>>,
}

impl FakeGenerationBackend {
    pub fn new() -> Self {
        Self {
            submit_reply: Mutex::new(None),
            status_script: Mutex::new(VecDeque::new()),
            fallback_status: Mutex::new(FakeReply::pending()),
            finalize_reply: Mutex::new(FakeReply::Json(json!({"code": "OK", "status": 200}))),
            download_bytes: Mutex::new(Vec::new()),
            submissions: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            finalize_bodies: Mutex::new(Vec::new()),
            seen_tokens: Mutex::new(Vec::new()),
        }
    }

    /// 模拟一次正常生成：`pending_ticks` 次 pending 后成功
    pub fn simulated(pending_ticks: usize, asset_url: &str) -> Self {
        let script = (0..pending_ticks)
            .map(|_| FakeReply::pending())
            .chain(std::iter::once(FakeReply::success(asset_url, 1)))
            .collect();
        Self::new()
            .with_status_script(script)
            .with_download_bytes(b"fake-asset".to_vec())
    }

    pub fn with_submit_reply(self, reply: FakeReply) -> Self {
        *lock(&self.submit_reply) = Some(reply);
        self
    }

    pub fn with_status_script(self, script: Vec<FakeReply>) -> Self {
        *lock(&self.status_script) = script.into();
        self
    }

    pub fn with_fallback_status(self, reply: FakeReply) -> Self {
        *lock(&self.fallback_status) = reply;
        self
    }

    pub fn with_finalize_reply(self, reply: FakeReply) -> Self {
        *lock(&self.finalize_reply) = reply;
        self
    }

    pub fn with_download_bytes(self, bytes: Vec<u8>) -> Self {
        *lock(&self.download_bytes) = bytes;
        self
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn finalize_bodies(&self) -> Vec<Value> {
        lock(&self.finalize_bodies).clone()
    }

    /// 每次状态查询使用的 token，按调用顺序
    pub fn seen_tokens(&self) -> Vec<String> {
        lock(&self.seen_tokens).clone()
    }

    fn default_submit_reply(kind: JobKind) -> FakeReply {
        let profile = JobProfile::default_for(kind);
        let mut data = serde_json::Map::new();
        data.insert(profile.asset_key, Value::from(1));
        if let Some(parent_key) = profile.parent_key {
            data.insert(parent_key, Value::from(1));
        }
        FakeReply::Json(json!({ "code": "ASSET_REQUESTED", "data": data }))
    }
}

impl Default for FakeGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackendPort for FakeGenerationBackend {
    async fn submit(
        &self,
        kind: JobKind,
        _credential: &Credential,
        _payload: SubmissionPayload,
    ) -> Result<Value, BackendError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let reply = lock(&self.submit_reply)
            .clone()
            .unwrap_or_else(|| Self::default_submit_reply(kind));
        tracing::debug!(kind = %kind, "FakeGenerationBackend: submit");
        reply.resolve().await
    }

    async fn fetch_status(
        &self,
        handle: &JobHandle,
        credential: &Credential,
    ) -> Result<Value, BackendError> {
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.seen_tokens).push(credential.as_str().to_string());

        let reply = lock(&self.status_script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.fallback_status).clone());
        tracing::debug!(handle = %handle, call = call, "FakeGenerationBackend: status");
        reply.resolve().await
    }

    async fn finalize(
        &self,
        _kind: JobKind,
        _credential: &Credential,
        body: Value,
    ) -> Result<Value, BackendError> {
        lock(&self.finalize_bodies).push(body);
        let reply = lock(&self.finalize_reply).clone();
        reply.resolve().await
    }

    async fn download(
        &self,
        _handle: &JobHandle,
        _asset_url: Option<&str>,
        _credential: &Credential,
    ) -> Result<Vec<u8>, BackendError> {
        Ok(lock(&self.download_bytes).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::new("token").unwrap()
    }

    #[tokio::test]
    async fn test_status_script_then_fallback() {
        let backend = FakeGenerationBackend::new().with_status_script(vec![
            FakeReply::Network("reset".to_string()),
            FakeReply::success("https://x/y.png", 42),
        ]);
        let handle = JobHandle::new(JobKind::Event, 7, Some(3));

        assert!(backend.fetch_status(&handle, &credential()).await.is_err());
        assert!(backend.fetch_status(&handle, &credential()).await.is_ok());
        let fallback = backend.fetch_status(&handle, &credential()).await.unwrap();
        assert_eq!(fallback["code"], "ASSET_GENERATION_PENDING");
        assert_eq!(backend.status_calls(), 3);
        assert_eq!(backend.seen_tokens(), vec!["token"; 3]);
    }

    #[tokio::test]
    async fn test_default_submit_reply_uses_profile_keys() {
        let backend = FakeGenerationBackend::new();
        let body = backend
            .submit(JobKind::Review, &credential(), SubmissionPayload::multipart())
            .await
            .unwrap();
        assert_eq!(body["data"]["reviewAssetId"], 1);
        assert_eq!(body["data"]["reviewId"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_reply_waits() {
        let start = tokio::time::Instant::now();
        let reply = FakeReply::pending().after(Duration::from_millis(500));
        assert!(reply.resolve().await.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
