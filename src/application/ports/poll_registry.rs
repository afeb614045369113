//! Poll Registry Port - 活跃轮询会话登记
//!
//! 同一调用方对同一个 JobHandle 同时只能有一个活跃会话

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::job::JobHandle;

/// 会话取消入口
///
/// 实现方必须先把会话标记为已取消，再停止后台任务，
/// 这样取消之后后台任务不可能再写入终止结果
pub trait SessionCanceller: Send + Sync {
    /// 返回本次调用是否真正取消了会话（已终止或已取消时为 false）
    fn cancel(&self) -> bool;
}

impl SessionCanceller for CancellationToken {
    fn cancel(&self) -> bool {
        let first = !self.is_cancelled();
        CancellationToken::cancel(self);
        first
    }
}

/// 活跃会话
#[derive(Clone)]
pub struct ActiveSession {
    pub subscription_id: Uuid,
    pub canceller: Arc<dyn SessionCanceller>,
    pub started_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn new(canceller: Arc<dyn SessionCanceller>) -> Self {
        Self {
            subscription_id: Uuid::new_v4(),
            canceller,
            started_at: Utc::now(),
        }
    }

    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("subscription_id", &self.subscription_id)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Poll Registry Port
pub trait PollRegistryPort: Send + Sync {
    /// 登记会话，返回被替换下来的旧会话（调用方负责取消它）
    fn register(&self, handle: JobHandle, session: ActiveSession) -> Option<ActiveSession>;

    /// 释放会话；只有 subscription_id 一致时才移除，避免误删新会话
    fn release(&self, handle: &JobHandle, subscription_id: Uuid) -> bool;

    /// 查询活跃会话
    fn get(&self, handle: &JobHandle) -> Option<ActiveSession>;

    /// 活跃会话数量
    fn active_count(&self) -> usize;

    /// 取消并移除全部会话，返回真正被取消的数量
    fn cancel_all(&self) -> usize;
}
