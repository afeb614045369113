//! Status Poller - 生成任务状态轮询
//!
//! 每个会话一个独立的后台任务：按固定间隔查询状态，直到成功 / 失败 / 超时 / 取消。
//!
//! - tick 严格串行：上一次响应处理完之前不会发出下一次请求
//! - 单次请求失败（网络、非 2xx、响应体无法解析）只记录日志，不终止轮询
//! - 终止状态通过 watch 单元上的比较交换写入。所有取消路径（订阅的 `cancel()`、
//!   同一 handle 重新 `start`、`cancel_all`）都走同一个单元，
//!   因此终止回调最多触发一次，取消之后不会再有终止回调

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::error::{GenerationError, TransientPollError};
use crate::application::ports::{
    ActiveSession, CredentialProviderPort, GenerationBackendPort, PollObserver, PollRegistryPort,
    SessionCanceller,
};
use crate::domain::job::{GenerationResult, JobHandle, JobStatus, StatusRules};
use crate::domain::poll::{PollConfig, PollState, TickOutcome, TickTally};

/// 会话终止结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded(GenerationResult),
    /// 包括超时（`GenerationError::Timeout`）
    Failed(GenerationError),
    Cancelled,
}

impl PollOutcome {
    fn state(&self) -> PollState {
        match self {
            PollOutcome::Succeeded(_) => PollState::Succeeded,
            PollOutcome::Failed(GenerationError::Timeout { .. })
            | PollOutcome::Failed(GenerationError::MalformedResponse { .. }) => PollState::TimedOut,
            PollOutcome::Failed(_) => PollState::Failed,
            PollOutcome::Cancelled => PollState::Cancelled,
        }
    }
}

/// 会话快照
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: PollState,
    pub ticks: u32,
    pub outcome: Option<PollOutcome>,
}

impl SessionSnapshot {
    fn new() -> Self {
        Self {
            state: PollState::NotStarted,
            ticks: 0,
            outcome: None,
        }
    }
}

/// 写入终止状态；已经终止时返回 false
fn try_finish(cell: &watch::Sender<SessionSnapshot>, outcome: PollOutcome) -> bool {
    cell.send_if_modified(|snapshot| {
        let next = outcome.state();
        if !snapshot.state.can_transition_to(next) {
            return false;
        }
        snapshot.state = next;
        snapshot.outcome = Some(outcome);
        true
    })
}

/// 会话的取消入口，订阅、登记表替换、`cancel_all` 共用
struct SessionControl {
    cancel_token: CancellationToken,
    cell: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionCanceller for SessionControl {
    fn cancel(&self) -> bool {
        // 先写终止状态再停任务：后台任务之后的 try_finish 必然失败
        let cancelled = try_finish(&self.cell, PollOutcome::Cancelled);
        self.cancel_token.cancel();
        cancelled
    }
}

/// 轮询订阅
///
/// 由调用方独占持有。drop 时自动取消（对应页面卸载）。
pub struct PollSubscription {
    id: Uuid,
    handle: JobHandle,
    control: Arc<SessionControl>,
    registry: Arc<dyn PollRegistryPort>,
}

impl PollSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn state(&self) -> PollState {
        self.control.cell.borrow().state
    }

    /// 已执行的 tick 数（包括失败的 tick）
    pub fn ticks(&self) -> u32 {
        self.control.cell.borrow().ticks
    }

    pub fn outcome(&self) -> Option<PollOutcome> {
        self.control.cell.borrow().outcome.clone()
    }

    /// 停止轮询并屏蔽之后的所有回调
    ///
    /// 幂等；会话已终止时什么也不做。返回本次调用是否真正取消了会话。
    pub fn cancel(&self) -> bool {
        let cancelled = self.control.cancel();
        if cancelled {
            self.registry.release(&self.handle, self.id);
            tracing::info!(handle = %self.handle, subscription_id = %self.id, "Polling cancelled");
        }
        cancelled
    }

    /// 等待终止结果
    pub async fn wait(&self) -> PollOutcome {
        let mut rx = self.control.cell.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().outcome.clone() {
                return outcome;
            }
            // 订阅本身持有 sender，changed() 不会因为 sender 关闭而失败
            if rx.changed().await.is_err() {
                return PollOutcome::Cancelled;
            }
        }
    }
}

impl Drop for PollSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// 状态轮询器
///
/// 每个调用方持有一个实例；同一 JobHandle 再次 `start` 会先取消旧会话
pub struct StatusPoller {
    backend: Arc<dyn GenerationBackendPort>,
    credentials: Arc<dyn CredentialProviderPort>,
    registry: Arc<dyn PollRegistryPort>,
    rules: Arc<StatusRules>,
}

impl StatusPoller {
    pub fn new(
        backend: Arc<dyn GenerationBackendPort>,
        credentials: Arc<dyn CredentialProviderPort>,
        registry: Arc<dyn PollRegistryPort>,
        rules: Arc<StatusRules>,
    ) -> Self {
        Self {
            backend,
            credentials,
            registry,
            rules,
        }
    }

    /// 开始轮询
    ///
    /// 必须在 tokio 运行时内调用
    pub fn start(
        &self,
        handle: JobHandle,
        config: PollConfig,
        observer: Arc<dyn PollObserver>,
    ) -> PollSubscription {
        let cancel_token = CancellationToken::new();
        let (tx, _rx) = watch::channel(SessionSnapshot::new());
        let cell = Arc::new(tx);
        let control = Arc::new(SessionControl {
            cancel_token: cancel_token.clone(),
            cell: cell.clone(),
        });

        let session = ActiveSession::new(control.clone());
        let subscription_id = session.subscription_id;

        if let Some(previous) = self.registry.register(handle, session) {
            tracing::info!(
                handle = %handle,
                previous = %previous.subscription_id,
                "Replacing active poll session"
            );
            previous.cancel();
        }

        let session = PollSession {
            handle,
            subscription_id,
            config,
            backend: self.backend.clone(),
            credentials: self.credentials.clone(),
            registry: self.registry.clone(),
            rules: self.rules.clone(),
            observer,
            cancel_token,
            cell,
        };
        tokio::spawn(session.run());

        PollSubscription {
            id: subscription_id,
            handle,
            control,
            registry: self.registry.clone(),
        }
    }

    /// 取消本调用方的全部会话（页面整体退出时）
    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.active_count()
    }
}

/// 单个会话的后台任务
struct PollSession {
    handle: JobHandle,
    subscription_id: Uuid,
    config: PollConfig,
    backend: Arc<dyn GenerationBackendPort>,
    credentials: Arc<dyn CredentialProviderPort>,
    registry: Arc<dyn PollRegistryPort>,
    rules: Arc<StatusRules>,
    observer: Arc<dyn PollObserver>,
    cancel_token: CancellationToken,
    cell: Arc<watch::Sender<SessionSnapshot>>,
}

impl PollSession {
    async fn run(self) {
        let started = self.cell.send_if_modified(|snapshot| {
            if !snapshot.state.can_transition_to(PollState::Polling) {
                return false;
            }
            snapshot.state = PollState::Polling;
            true
        });
        if !started {
            tracing::debug!(handle = %self.handle, "Session cancelled before first tick");
            self.registry.release(&self.handle, self.subscription_id);
            return;
        }

        tracing::info!(
            handle = %self.handle,
            subscription_id = %self.subscription_id,
            interval_ms = self.config.interval.as_millis() as u64,
            max_wait_ms = self.config.max_wait.as_millis() as u64,
            "Polling started"
        );

        let outcome = self.poll_until_terminal().await;

        if try_finish(&self.cell, outcome.clone()) {
            match &outcome {
                PollOutcome::Succeeded(result) => {
                    tracing::info!(
                        handle = %self.handle,
                        asset_url = %result.asset_url,
                        result_asset_id = ?result.result_asset_id,
                        "Asset generation succeeded"
                    );
                    self.observer.on_success(&self.handle, result);
                }
                PollOutcome::Failed(error) => {
                    tracing::warn!(handle = %self.handle, error = %error, "Asset generation did not complete");
                    self.observer.on_failure(&self.handle, error);
                }
                PollOutcome::Cancelled => {
                    tracing::debug!(handle = %self.handle, "Polling stopped by cancellation");
                }
            }
        }

        self.registry.release(&self.handle, self.subscription_id);
    }

    async fn poll_until_terminal(&self) -> PollOutcome {
        let start = Instant::now();
        let deadline = start + self.config.max_wait;
        let mut ticker = interval_at(start + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tally = TickTally::default();
        let mut last_error: Option<TransientPollError> = None;

        loop {
            // 截止时间与 tick 同时到达时，截止优先：不再发出新请求
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return PollOutcome::Cancelled,
                _ = sleep_until(deadline) => return self.timed_out(&tally, last_error),
                _ = ticker.tick() => {}
            }

            let tick = tally.ticks + 1;

            // 每个 tick 重新读取凭据，外部刷新可以立即生效
            let Some(credential) = self.credentials.current_credential().await else {
                return PollOutcome::Failed(GenerationError::authentication(
                    "no credential available while polling",
                ));
            };

            let response = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return PollOutcome::Cancelled,
                _ = sleep_until(deadline) => return self.timed_out(&tally, last_error),
                response = self.backend.fetch_status(&self.handle, &credential) => response,
            };

            let response = response.map_err(TransientPollError::from);
            let outcome = match &response {
                Ok(_) => TickOutcome::Parsed,
                Err(e) => e.outcome(),
            };
            tally.record(outcome);

            // 取消之后返回的响应直接丢弃
            if self.cancel_token.is_cancelled() || self.cell.borrow().state != PollState::Polling {
                return PollOutcome::Cancelled;
            }
            self.cell.send_modify(|snapshot| snapshot.ticks = tally.ticks);

            let body = match response {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(
                        handle = %self.handle,
                        tick = tick,
                        error = %e,
                        "Status poll failed, retrying on next tick"
                    );
                    last_error = Some(e);
                    continue;
                }
            };

            let status = self.rules.normalize(&body);
            tracing::debug!(handle = %self.handle, tick = tick, status = status.as_str(), "Status polled");
            self.observer.on_tick(&self.handle, tick, &status);

            match status {
                JobStatus::Pending => {}
                JobStatus::Success(result) => return PollOutcome::Succeeded(result),
                JobStatus::Failed { reason } => {
                    return PollOutcome::Failed(GenerationError::JobFailed { reason })
                }
            }
        }
    }

    fn timed_out(&self, tally: &TickTally, last_error: Option<TransientPollError>) -> PollOutcome {
        let waited_ms = self.config.max_wait.as_millis() as u64;
        tracing::debug!(handle = %self.handle, tally = ?tally, "Poll deadline reached");

        if tally.all_responses_unparsable() {
            let last_error = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unparsable response".to_string());
            return PollOutcome::Failed(GenerationError::MalformedResponse {
                waited_ms,
                last_error,
            });
        }
        PollOutcome::Failed(GenerationError::Timeout { waited_ms })
    }
}
