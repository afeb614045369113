//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod events;
pub mod memory;
pub mod worker;

pub use events::{BroadcastPollObserver, PollEvent, PollEventPublisher};
pub use memory::InMemoryPollRegistry;
pub use worker::{PollOutcome, PollSubscription, StatusPoller};
