//! Generation Commands - 生成任务相关命令

use serde_json::Value;
use std::path::PathBuf;

use crate::application::ports::SubmissionPayload;
use crate::domain::job::{GenerationResult, JobHandle, JobKind};

/// 提交生成请求
#[derive(Debug, Clone)]
pub struct SubmitGeneration {
    pub kind: JobKind,
    pub payload: SubmissionPayload,
}

/// 最终登记
///
/// 需要轮询得到的成功结果，句柄与结果 ID 必须来自同一次生成
#[derive(Debug, Clone)]
pub struct FinalizeGeneration {
    pub handle: JobHandle,
    pub result: GenerationResult,
    pub description: String,
}

/// 最终登记响应
#[derive(Debug, Clone)]
pub struct FinalizeReceipt {
    pub handle: JobHandle,
    pub result_asset_id: i64,
    /// 后端原始响应
    pub response: Value,
}

/// 下载生成资源
#[derive(Debug, Clone)]
pub struct DownloadAsset {
    pub handle: JobHandle,
    pub result: Option<GenerationResult>,
    pub destination: PathBuf,
}

/// 下载结果
#[derive(Debug, Clone)]
pub struct DownloadReceipt {
    pub path: PathBuf,
    pub size_bytes: usize,
}
