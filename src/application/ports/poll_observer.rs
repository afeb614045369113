//! Poll Observer Port - 轮询回调
//!
//! 调用方（页面）通过实现此 trait 接收 tick 与终止结果。
//! 每个会话最多触发一次 `on_success` / `on_failure`，取消后不再触发任何回调。

use crate::application::error::GenerationError;
use crate::domain::job::{GenerationResult, JobHandle, JobStatus};

pub trait PollObserver: Send + Sync {
    /// 每次成功解析状态响应后调用
    fn on_tick(&self, _handle: &JobHandle, _tick: u32, _status: &JobStatus) {}

    fn on_success(&self, _handle: &JobHandle, _result: &GenerationResult) {}

    /// 超时也通过此回调交付（`GenerationError::Timeout`）
    fn on_failure(&self, _handle: &JobHandle, _error: &GenerationError) {}
}

/// 不关心回调时使用
pub struct NoopObserver;

impl PollObserver for NoopObserver {}
