//! Submit Handler - 提交生成请求并提取任务句柄

use std::sync::Arc;

use crate::application::commands::SubmitGeneration;
use crate::application::error::GenerationError;
use crate::application::ports::{CredentialProviderPort, GenerationBackendPort};
use crate::domain::job::{extract_handle, JobHandle, JobProfiles};

/// SubmitGeneration Handler
///
/// 只负责提交与解析句柄，不启动轮询
pub struct SubmitGenerationHandler {
    backend: Arc<dyn GenerationBackendPort>,
    credentials: Arc<dyn CredentialProviderPort>,
    profiles: Arc<JobProfiles>,
}

impl SubmitGenerationHandler {
    pub fn new(
        backend: Arc<dyn GenerationBackendPort>,
        credentials: Arc<dyn CredentialProviderPort>,
        profiles: Arc<JobProfiles>,
    ) -> Self {
        Self {
            backend,
            credentials,
            profiles,
        }
    }

    pub async fn handle(&self, cmd: SubmitGeneration) -> Result<JobHandle, GenerationError> {
        let credential = self
            .credentials
            .current_credential()
            .await
            .ok_or_else(|| GenerationError::authentication("no credential available, sign in again"))?;

        tracing::info!(kind = %cmd.kind, "Submitting generation request");

        let body = self
            .backend
            .submit(cmd.kind, &credential, cmd.payload)
            .await
            .map_err(|e| {
                tracing::warn!(kind = %cmd.kind, error = %e, "Generation request rejected");
                GenerationError::from_request(e)
            })?;

        let profile = self.profiles.get(cmd.kind);
        let handle = extract_handle(cmd.kind, profile, &body).map_err(|e| {
            tracing::warn!(kind = %cmd.kind, error = %e, "Unexpected submission response shape");
            GenerationError::from(e)
        })?;

        tracing::info!(
            kind = %cmd.kind,
            asset_id = handle.asset_id,
            parent_id = ?handle.parent_id,
            "Generation request accepted"
        );
        Ok(handle)
    }
}
