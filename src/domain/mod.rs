//! Domain Layer - 领域层
//!
//! 包含两个上下文:
//! - Job Context: 生成任务句柄、状态归一化、响应结构匹配
//! - Poll Context: 轮询会话状态机

pub mod job;
pub mod poll;
