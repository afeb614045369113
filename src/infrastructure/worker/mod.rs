//! Worker Layer - 后台轮询任务
//!
//! 每个轮询会话对应一个 tokio 任务

mod status_poller;

pub use status_poller::{PollOutcome, PollSubscription, SessionSnapshot, StatusPoller};
