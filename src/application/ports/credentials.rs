//! Credential Provider Port - 认证凭据来源
//!
//! 凭据由外部刷新，轮询器每个 tick 重新读取，不在会话内缓存

use async_trait::async_trait;

use crate::domain::job::Credential;

#[async_trait]
pub trait CredentialProviderPort: Send + Sync {
    /// 当前凭据，没有则返回 None
    async fn current_credential(&self) -> Option<Credential>;
}
