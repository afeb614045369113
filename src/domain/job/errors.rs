//! Job Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("无法识别的响应结构: {0}")]
    UnrecognizedEnvelope(String),

    #[error("描述长度不足: 至少 {min} 字, 当前 {actual} 字")]
    DescriptionTooShort { min: usize, actual: usize },

    #[error("缺少父实体 ID: {0}")]
    MissingParent(String),

    #[error("无效的轮询配置: {0}")]
    InvalidPollConfig(String),
}
