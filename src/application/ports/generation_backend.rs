//! Generation Backend Port - 生成服务后端抽象
//!
//! 定义 submit / status / finalize / download 四个接口，具体实现在 infrastructure/adapters 层。
//! 响应统一以 `serde_json::Value` 返回，结构解析由应用层负责。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::job::{Credential, JobHandle, JobKind};

/// 后端调用错误
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    /// 非 2xx 响应，message 优先取服务端返回的 message/error 字段
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 上传的附件
#[derive(Debug, Clone)]
pub struct Attachment {
    /// 表单字段名（如 `image`）
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// 提交请求体
#[derive(Debug, Clone)]
pub enum SubmissionPayload {
    /// multipart 表单，同名字段可以重复（如 `menuIds`）
    Multipart {
        fields: Vec<(String, String)>,
        attachments: Vec<Attachment>,
    },
    /// JSON 请求体
    Json(Value),
}

impl SubmissionPayload {
    pub fn multipart() -> Self {
        Self::Multipart {
            fields: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Multipart { fields, .. } = &mut self {
            fields.push((name.into(), value.into()));
        }
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        if let Self::Multipart { attachments, .. } = &mut self {
            attachments.push(attachment);
        }
        self
    }
}

/// Generation Backend Port
#[async_trait]
pub trait GenerationBackendPort: Send + Sync {
    /// 提交生成请求，返回原始响应 envelope
    async fn submit(
        &self,
        kind: JobKind,
        credential: &Credential,
        payload: SubmissionPayload,
    ) -> Result<Value, BackendError>;

    /// 查询一次生成状态
    async fn fetch_status(
        &self,
        handle: &JobHandle,
        credential: &Credential,
    ) -> Result<Value, BackendError>;

    /// 最终登记
    async fn finalize(
        &self,
        kind: JobKind,
        credential: &Credential,
        body: Value,
    ) -> Result<Value, BackendError>;

    /// 下载生成资源
    ///
    /// 有下载接口时走下载接口，否则直接请求 `asset_url`
    async fn download(
        &self,
        handle: &JobHandle,
        asset_url: Option<&str>,
        credential: &Credential,
    ) -> Result<Vec<u8>, BackendError>;
}
