//! Poll Context - Session State Machine
//!
//! `NotStarted → Polling → (Succeeded | Failed | TimedOut | Cancelled)`
//!
//! 终止状态是吸收态：一旦进入，不再有任何转换。

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::job::{JobError, JobProfile};

/// 轮询会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    NotStarted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded | PollState::Failed | PollState::TimedOut | PollState::Cancelled
        )
    }

    /// 是否允许转换到 `next`
    pub fn can_transition_to(&self, next: PollState) -> bool {
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (PollState::NotStarted, PollState::Polling) => true,
            (PollState::NotStarted, PollState::Cancelled) => true,
            (PollState::Polling, n) => n.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::NotStarted => "not_started",
            PollState::Polling => "polling",
            PollState::Succeeded => "succeeded",
            PollState::Failed => "failed",
            PollState::TimedOut => "timed_out",
            PollState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 轮询参数
///
/// 间隔和超时都是必填项，不提供全局默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, max_wait: Duration) -> Result<Self, JobError> {
        if interval.is_zero() {
            return Err(JobError::InvalidPollConfig(
                "poll interval cannot be 0".to_string(),
            ));
        }
        if max_wait.is_zero() {
            return Err(JobError::InvalidPollConfig(
                "max wait cannot be 0".to_string(),
            ));
        }
        Ok(Self { interval, max_wait })
    }

    pub fn from_millis(interval_ms: u64, max_wait_ms: u64) -> Result<Self, JobError> {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(max_wait_ms),
        )
    }

    pub fn from_profile(profile: &JobProfile) -> Result<Self, JobError> {
        Self::from_millis(profile.interval_ms, profile.max_wait_ms)
    }
}

/// 单次 tick 的结果分类，用于超时时区分 Timeout 与 MalformedResponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 响应成功解析（无论状态是什么）
    Parsed,
    /// 收到 2xx 但响应体无法解析
    Unparsable,
    /// 非 2xx
    Rejected,
    /// 网络不可达 / 请求超时
    Unreachable,
}

/// 会话内的 tick 统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickTally {
    pub ticks: u32,
    pub parsed: u32,
    pub unparsable: u32,
    pub rejected: u32,
    pub unreachable: u32,
}

impl TickTally {
    pub fn record(&mut self, outcome: TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Parsed => self.parsed += 1,
            TickOutcome::Unparsable => self.unparsable += 1,
            TickOutcome::Rejected => self.rejected += 1,
            TickOutcome::Unreachable => self.unreachable += 1,
        }
    }

    /// 超时时是否应报告为响应格式错误：收到过响应，且全部无法解析
    pub fn all_responses_unparsable(&self) -> bool {
        self.unparsable > 0 && self.parsed == 0 && self.rejected == 0
    }
}
