//! Static Credential Provider - 内存中的凭据
//!
//! 凭据可以在运行中被替换（模拟外部刷新），每次读取都拿到最新值

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::application::ports::CredentialProviderPort;
use crate::domain::job::Credential;

pub struct StaticCredentialProvider {
    credential: RwLock<Option<Credential>>,
}

impl StaticCredentialProvider {
    /// 空白 token 视为没有凭据
    pub fn new(token: Option<&str>) -> Self {
        Self {
            credential: RwLock::new(token.and_then(|t| Credential::new(t).ok())),
        }
    }

    /// 替换凭据，None 表示登出
    pub async fn replace(&self, token: Option<&str>) {
        let mut guard = self.credential.write().await;
        *guard = token.and_then(|t| Credential::new(t).ok());
        tracing::debug!(present = guard.is_some(), "Credential replaced");
    }
}

#[async_trait]
impl CredentialProviderPort for StaticCredentialProvider {
    async fn current_credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }
}
