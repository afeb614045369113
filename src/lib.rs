//! assetgen - 异步素材生成任务客户端
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Job Context: 任务类型、句柄、响应结构匹配、状态归一化
//! - Poll Context: 轮询会话状态机与参数
//!
//! 应用层 (application/):
//! - Ports: 端口定义（GenerationBackend, CredentialProvider, PollRegistry, PollObserver）
//! - Commands: 提交 / 最终登记 / 下载
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP 生成服务客户端、Fake 后端、凭据提供者
//! - Memory: 轮询会话登记表
//! - Worker: StatusPoller 轮询任务
//! - Events: 轮询事件广播

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
