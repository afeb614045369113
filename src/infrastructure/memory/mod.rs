//! Memory Layer - In-Memory State Management
//!
//! 实现 PollRegistry，管理活跃轮询会话的内存状态

mod poll_registry;

pub use poll_registry::InMemoryPollRegistry;
