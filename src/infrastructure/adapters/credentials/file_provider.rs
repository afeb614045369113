//! File Credential Provider - 从文件读取凭据
//!
//! 文件由外部登录/刷新流程维护，每次调用都重新读取。
//! 支持纯文本 token，或 `{"accessToken": "..."}` 形式的 JSON。

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::application::ports::CredentialProviderPort;
use crate::domain::job::Credential;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokens {
    access_token: Option<String>,
}

pub struct FileCredentialProvider {
    path: PathBuf,
}

impl FileCredentialProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_token(raw: &str) -> Option<Credential> {
    let raw = raw.trim();
    if raw.starts_with('{') {
        let stored: StoredTokens = serde_json::from_str(raw).ok()?;
        return Credential::new(stored.access_token?).ok();
    }
    Credential::new(raw).ok()
}

#[async_trait]
impl CredentialProviderPort for FileCredentialProvider {
    async fn current_credential(&self) -> Option<Credential> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let credential = parse_token(&raw);
                if credential.is_none() {
                    tracing::warn!(path = %self.path.display(), "Token file has no usable token");
                }
                credential
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read token file");
                None
            }
        }
    }
}
