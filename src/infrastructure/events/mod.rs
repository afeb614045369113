//! Events - 轮询事件广播

mod publisher;

pub use publisher::{BroadcastPollObserver, PollEvent, PollEventPublisher};
