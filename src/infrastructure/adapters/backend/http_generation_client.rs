//! HTTP Generation Client - 调用生成服务后端
//!
//! 实现 GenerationBackendPort，所有请求都带 `Authorization: Bearer <token>`
//!
//! 后端 API（以活动海报为例）:
//! POST /api/events/assets/request          multipart: title, startDate, endDate, prompt, type, image*
//! GET  /api/events/assets/{id}/result      {code, message, status, data: {type, assetUrl}}
//! POST /api/events/finalize                {eventId, eventAssetId, description, type}
//! GET  /api/events/assets/download?eventAssetId={id}

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde_json::Value;
use std::time::Duration;

use crate::application::ports::{Attachment, BackendError, GenerationBackendPort, SubmissionPayload};
use crate::domain::job::{truncate, Credential, JobHandle, JobKind, JobProfiles};

/// HTTP 生成服务客户端配置
#[derive(Debug, Clone)]
pub struct HttpGenerationClientConfig {
    /// 后端基础 URL
    pub base_url: String,
    /// 单次请求超时时间（秒）
    pub timeout_secs: u64,
    /// 各任务类型的接口路径
    pub profiles: JobProfiles,
}

impl Default for HttpGenerationClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
            profiles: JobProfiles::default(),
        }
    }
}

impl HttpGenerationClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_profiles(mut self, profiles: JobProfiles) -> Self {
        self.profiles = profiles;
        self
    }
}

/// HTTP 生成服务客户端
pub struct HttpGenerationClient {
    client: Client,
    config: HttpGenerationClientConfig,
}

impl HttpGenerationClient {
    /// 创建新的客户端
    pub fn new(config: HttpGenerationClientConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        builder.header(AUTHORIZATION, credential.bearer())
    }

    /// URL 是否指向后端本身（同源）；凭据只发给后端
    fn is_backend_url(&self, url: &str) -> bool {
        match (Url::parse(url), Url::parse(&self.config.base_url)) {
            (Ok(target), Ok(base)) => target.origin() == base.origin(),
            _ => false,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        builder.send().await.map_err(map_send_error)
    }
}

fn map_send_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::NetworkError(format!("Cannot connect to backend: {}", e))
    } else {
        BackendError::NetworkError(e.to_string())
    }
}

/// 非 2xx 时优先用服务端 message/error 字段，其次原文，最后是状态码
fn error_message(status: reqwest::StatusCode, raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|json| {
            ["message", "error", "details"]
                .iter()
                .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .filter(|msg| !msg.trim().is_empty())
        .or_else(|| (!raw.trim().is_empty()).then(|| truncate(raw.trim(), 300)))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

async fn read_json(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let raw = response
        .text()
        .await
        .map_err(|e| BackendError::InvalidResponse(format!("Failed to read body: {}", e)))?;

    if !status.is_success() {
        return Err(BackendError::HttpStatus {
            status: status.as_u16(),
            message: error_message(status, &raw),
        });
    }

    serde_json::from_str(&raw)
        .map_err(|e| BackendError::InvalidResponse(format!("{}: {}", e, truncate(&raw, 200))))
}

fn build_form(fields: Vec<(String, String)>, attachments: Vec<Attachment>) -> Result<Form, BackendError> {
    let mut form = Form::new();
    for (name, value) in fields {
        form = form.text(name, value);
    }
    for attachment in attachments {
        let part = Part::bytes(attachment.bytes)
            .file_name(attachment.file_name)
            .mime_str(&attachment.mime_type)
            .map_err(|e| BackendError::InvalidResponse(format!("Invalid mime type: {}", e)))?;
        form = form.part(attachment.field, part);
    }
    Ok(form)
}

#[async_trait]
impl GenerationBackendPort for HttpGenerationClient {
    async fn submit(
        &self,
        kind: JobKind,
        credential: &Credential,
        payload: SubmissionPayload,
    ) -> Result<Value, BackendError> {
        let url = self.url(&self.config.profiles.get(kind).submit_path);
        let builder = self.authorized(self.client.post(&url), credential);

        let builder = match payload {
            SubmissionPayload::Multipart {
                fields,
                attachments,
            } => {
                tracing::debug!(
                    url = %url,
                    fields = fields.len(),
                    attachments = attachments.len(),
                    attachment_bytes = attachments.iter().map(|a| a.bytes.len()).sum::<usize>(),
                    "Sending multipart generation request"
                );
                builder.multipart(build_form(fields, attachments)?)
            }
            SubmissionPayload::Json(body) => {
                tracing::debug!(url = %url, "Sending JSON generation request");
                builder.json(&body)
            }
        };

        read_json(self.send(builder).await?).await
    }

    async fn fetch_status(
        &self,
        handle: &JobHandle,
        credential: &Credential,
    ) -> Result<Value, BackendError> {
        let profile = self.config.profiles.get(handle.kind);
        let url = self.url(&profile.status_path_for(handle.asset_id));
        tracing::trace!(url = %url, "Fetching generation status");

        let builder = self.authorized(self.client.get(&url), credential);
        read_json(self.send(builder).await?).await
    }

    async fn finalize(
        &self,
        kind: JobKind,
        credential: &Credential,
        body: Value,
    ) -> Result<Value, BackendError> {
        let url = self.url(&self.config.profiles.get(kind).finalize_path);
        tracing::debug!(url = %url, "Sending finalize request");

        let builder = self.authorized(self.client.post(&url), credential).json(&body);
        read_json(self.send(builder).await?).await
    }

    async fn download(
        &self,
        handle: &JobHandle,
        asset_url: Option<&str>,
        credential: &Credential,
    ) -> Result<Vec<u8>, BackendError> {
        let profile = self.config.profiles.get(handle.kind);
        let url = match (profile.download_path.as_deref(), asset_url) {
            (Some(path), _) => self.url(path),
            (None, Some(asset_url)) => self.url(asset_url),
            (None, None) => {
                return Err(BackendError::InvalidResponse(format!(
                    "No download source for {}",
                    handle
                )))
            }
        };

        let mut builder = self.client.get(&url);
        if profile.download_path.is_some() {
            builder = builder.query(&[(profile.asset_key.as_str(), handle.asset_id.to_string())]);
        }
        // CDN / 预签名地址不能带后端的 token
        if self.is_backend_url(&url) {
            builder = self.authorized(builder, credential);
        } else {
            tracing::debug!(url = %url, "Downloading from external host without credential");
        }

        let response = self.send(builder).await?;
        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(BackendError::HttpStatus {
                status: status.as_u16(),
                message: error_message(status, &raw),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to read asset: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
