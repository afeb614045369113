//! 应用层错误定义
//!
//! 生成任务的错误分类。除 `TransientPollError` 外，所有错误都是终止性的，
//! 只会交付给调用方一次。

use thiserror::Error;

use crate::application::ports::BackendError;
use crate::domain::job::JobError;
use crate::domain::poll::TickOutcome;

/// 生成任务错误（终止性）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// 没有可用凭据，或后端拒绝认证
    #[error("Authentication required: {0}")]
    Authentication(String),

    /// 提交请求被后端拒绝
    #[error("Submission failed (HTTP {status}): {message}")]
    Submission { status: u16, message: String },

    /// 响应结构不符合任何已知形态
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// 超过最长等待时间仍未完成
    #[error("Asset generation timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// 后端明确报告生成失败
    #[error("Asset generation failed: {reason}")]
    JobFailed { reason: String },

    /// 超时期间收到的响应全部无法解析
    #[error("No parsable status response within {waited_ms}ms: {last_error}")]
    MalformedResponse { waited_ms: u64, last_error: String },

    /// 输入校验失败
    #[error("Validation error: {0}")]
    Validation(String),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 后端调用失败（finalize / download 的传输错误）
    #[error("Backend error: {0}")]
    Backend(String),
}

impl GenerationError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 提交 / finalize 阶段的后端错误分类
    pub fn from_request(err: BackendError) -> Self {
        match err {
            BackendError::HttpStatus { status, message } if status == 401 || status == 403 => {
                Self::Authentication(message)
            }
            BackendError::HttpStatus { status, message } => Self::Submission { status, message },
            BackendError::InvalidResponse(msg) => Self::ResponseShape(msg),
            other => Self::Backend(other.to_string()),
        }
    }

    /// 是否允许调用方从提交步骤重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::JobFailed { .. }
                | Self::MalformedResponse { .. }
                | Self::Backend(_)
        )
    }
}

impl From<JobError> for GenerationError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::UnrecognizedEnvelope(body) => Self::ResponseShape(body),
            JobError::InvalidPollConfig(msg) => Self::InvalidConfig(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// 单次轮询失败
///
/// 在 StatusPoller 内部吸收，只会推迟终止状态的到来，不会直接交付给调用方
#[derive(Debug, Clone, Error)]
pub enum TransientPollError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Unparsable status body: {0}")]
    Unparsable(String),
}

impl TransientPollError {
    pub fn outcome(&self) -> TickOutcome {
        match self {
            Self::Network(_) => TickOutcome::Unreachable,
            Self::Rejected { .. } => TickOutcome::Rejected,
            Self::Unparsable(_) => TickOutcome::Unparsable,
        }
    }
}

impl From<BackendError> for TransientPollError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NetworkError(msg) => Self::Network(msg),
            BackendError::Timeout => Self::Network("request timeout".to_string()),
            BackendError::HttpStatus { status, message } => Self::Rejected { status, message },
            BackendError::InvalidResponse(msg) => Self::Unparsable(msg),
        }
    }
}
