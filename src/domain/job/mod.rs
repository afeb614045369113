//! Job Context - 生成任务上下文
//!
//! 任务句柄、状态归一化、提交响应结构匹配

mod errors;
mod profile;
mod shapes;
mod status;
mod value_objects;

pub use errors::JobError;
pub use profile::{JobProfile, JobProfiles};
pub use shapes::{extract_handle, HandleShape};
pub use status::{GenerationResult, JobStatus, StatusRules};
pub use value_objects::{Credential, Description, JobHandle, JobKind};

pub(crate) use shapes::truncate;
