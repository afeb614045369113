//! Download Handler - 下载生成资源到本地

use std::sync::Arc;

use crate::application::commands::{DownloadAsset, DownloadReceipt};
use crate::application::error::GenerationError;
use crate::application::ports::{CredentialProviderPort, GenerationBackendPort};

/// DownloadAsset Handler
pub struct DownloadAssetHandler {
    backend: Arc<dyn GenerationBackendPort>,
    credentials: Arc<dyn CredentialProviderPort>,
}

impl DownloadAssetHandler {
    pub fn new(
        backend: Arc<dyn GenerationBackendPort>,
        credentials: Arc<dyn CredentialProviderPort>,
    ) -> Self {
        Self {
            backend,
            credentials,
        }
    }

    pub async fn handle(&self, cmd: DownloadAsset) -> Result<DownloadReceipt, GenerationError> {
        let credential = self
            .credentials
            .current_credential()
            .await
            .ok_or_else(|| GenerationError::authentication("no credential available, sign in again"))?;

        let asset_url = cmd.result.as_ref().map(|r| r.asset_url.as_str());
        let bytes = self
            .backend
            .download(&cmd.handle, asset_url, &credential)
            .await
            .map_err(|e| GenerationError::Backend(e.to_string()))?;

        if let Some(parent) = cmd.destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| GenerationError::Backend(format!("create dir failed: {}", e)))?;
            }
        }
        tokio::fs::write(&cmd.destination, &bytes)
            .await
            .map_err(|e| GenerationError::Backend(format!("write file failed: {}", e)))?;

        tracing::info!(
            handle = %cmd.handle,
            path = %cmd.destination.display(),
            size = bytes.len(),
            "Asset downloaded"
        );

        Ok(DownloadReceipt {
            path: cmd.destination,
            size_bytes: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::job::{JobHandle, JobKind};
    use crate::infrastructure::adapters::{FakeGenerationBackend, StaticCredentialProvider};

    #[tokio::test]
    async fn test_download_writes_bytes() {
        let backend = Arc::new(FakeGenerationBackend::new().with_download_bytes(b"webp-bytes".to_vec()));
        let handler = DownloadAssetHandler::new(
            backend,
            Arc::new(StaticCredentialProvider::new(Some("token"))),
        );

        let temp_dir = tempfile::tempdir().unwrap();
        let destination = temp_dir.path().join("posters").join("event-poster-7.webp");
        let receipt = handler
            .handle(DownloadAsset {
                handle: JobHandle::new(JobKind::Event, 7, Some(3)),
                result: None,
                destination: destination.clone(),
            })
            .await
            .unwrap();

        assert_eq!(receipt.size_bytes, 10);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"webp-bytes");
    }
}
