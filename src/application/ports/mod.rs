//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod credentials;
mod generation_backend;
mod poll_observer;
mod poll_registry;

pub use credentials::CredentialProviderPort;
pub use generation_backend::{Attachment, BackendError, GenerationBackendPort, SubmissionPayload};
pub use poll_observer::{NoopObserver, PollObserver};
pub use poll_registry::{ActiveSession, PollRegistryPort, SessionCanceller};
