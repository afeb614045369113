//! In-Memory Poll Registry Implementation

use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ports::{ActiveSession, PollRegistryPort};
use crate::domain::job::JobHandle;

/// 内存轮询会话登记表
///
/// 每个调用方（页面）持有一份，保证同一 JobHandle 只有一个活跃会话
pub struct InMemoryPollRegistry {
    /// handle -> 活跃会话
    sessions: DashMap<JobHandle, ActiveSession>,
}

impl InMemoryPollRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryPollRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PollRegistryPort for InMemoryPollRegistry {
    fn register(&self, handle: JobHandle, session: ActiveSession) -> Option<ActiveSession> {
        let subscription_id = session.subscription_id;
        let replaced = self.sessions.insert(handle, session);

        tracing::debug!(
            handle = %handle,
            subscription_id = %subscription_id,
            replaced = replaced.is_some(),
            "Poll session registered"
        );
        replaced
    }

    fn release(&self, handle: &JobHandle, subscription_id: Uuid) -> bool {
        let removed = self
            .sessions
            .remove_if(handle, |_, s| s.subscription_id == subscription_id)
            .is_some();

        if removed {
            tracing::debug!(handle = %handle, subscription_id = %subscription_id, "Poll session released");
        }
        removed
    }

    fn get(&self, handle: &JobHandle) -> Option<ActiveSession> {
        self.sessions.get(handle).map(|s| s.clone())
    }

    fn active_count(&self) -> usize {
        self.sessions.len()
    }

    fn cancel_all(&self) -> usize {
        let handles: Vec<JobHandle> = self.sessions.iter().map(|e| *e.key()).collect();
        let mut cancelled = 0;
        for handle in handles {
            if let Some((_, session)) = self.sessions.remove(&handle) {
                if session.cancel() {
                    cancelled += 1;
                }
            }
        }

        tracing::debug!(cancelled = cancelled, "All poll sessions cancelled");
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::JobKind;
    use tokio_util::sync::CancellationToken;

    fn session(token: &CancellationToken) -> ActiveSession {
        ActiveSession::new(Arc::new(token.clone()))
    }

    #[test]
    fn test_register_replaces_previous_session() {
        let registry = InMemoryPollRegistry::new();
        let handle = JobHandle::new(JobKind::Event, 7, Some(3));

        let first = session(&CancellationToken::new());
        let first_id = first.subscription_id;
        assert!(registry.register(handle, first).is_none());

        let second = session(&CancellationToken::new());
        let second_id = second.subscription_id;
        let replaced = registry.register(handle, second).unwrap();
        assert_eq!(replaced.subscription_id, first_id);
        assert_eq!(registry.active_count(), 1);

        // 旧会话的释放不能删掉新会话
        assert!(!registry.release(&handle, first_id));
        assert_eq!(registry.get(&handle).unwrap().subscription_id, second_id);

        assert!(registry.release(&handle, second_id));
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let registry = InMemoryPollRegistry::new();
        let tokens: Vec<CancellationToken> = (0..3).map(|_| CancellationToken::new()).collect();
        for (i, token) in tokens.iter().enumerate() {
            registry.register(
                JobHandle::new(JobKind::Review, i as i64, Some(1)),
                session(token),
            );
        }
        // 已经停止的会话会被移除，但不计入取消数量
        tokens[0].cancel();

        assert_eq!(registry.cancel_all(), 2);
        assert!(tokens.iter().all(|t| t.is_cancelled()));
        assert_eq!(registry.active_count(), 0);
    }
}
