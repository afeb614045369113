//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（GenerationBackend、CredentialProvider、PollRegistry、PollObserver）
//! - commands: 提交 / 最终登记 / 下载命令及处理器
//! - error: 生成任务错误分类

pub mod commands;
pub mod error;
pub mod ports;

// Re-exports
pub use commands::{
    handlers::{DownloadAssetHandler, FinalizeGenerationHandler, SubmitGenerationHandler},
    DownloadAsset, DownloadReceipt, FinalizeGeneration, FinalizeReceipt, SubmitGeneration,
};

pub use error::{GenerationError, TransientPollError};

pub use ports::{
    ActiveSession, Attachment, BackendError, CredentialProviderPort, GenerationBackendPort,
    NoopObserver, PollObserver, PollRegistryPort, SubmissionPayload,
};
