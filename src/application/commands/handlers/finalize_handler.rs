//! Finalize Handler - 生成成功后的最终登记

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::application::commands::{FinalizeGeneration, FinalizeReceipt};
use crate::application::error::GenerationError;
use crate::application::ports::{CredentialProviderPort, GenerationBackendPort};
use crate::domain::job::{Description, JobError, JobProfiles};

/// FinalizeGeneration Handler
pub struct FinalizeGenerationHandler {
    backend: Arc<dyn GenerationBackendPort>,
    credentials: Arc<dyn CredentialProviderPort>,
    profiles: Arc<JobProfiles>,
}

impl FinalizeGenerationHandler {
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

    pub async fn handle(&self, cmd: FinalizeGeneration) -> Result<FinalizeReceipt, GenerationError> {
        let kind = cmd.handle.kind;
        let profile = self.profiles.get(kind);

        let description = Description::new(cmd.description, profile.min_description_len)
            .map_err(|(min, actual)| JobError::DescriptionTooShort { min, actual })?;

        // 结果 ID 优先用轮询返回的，没有时回落到句柄里的 asset_id
        let result_asset_id = cmd.result.result_asset_id.unwrap_or(cmd.handle.asset_id);

        let mut body = Map::new();
        if let Some(parent_key) = profile.parent_key.as_deref() {
            let parent_id = cmd
                .handle
                .parent_id
                .ok_or_else(|| JobError::MissingParent(cmd.handle.to_string()))?;
            body.insert(parent_key.to_string(), Value::from(parent_id));
        }
        body.insert(profile.asset_key.clone(), Value::from(result_asset_id));
        body.insert("description".to_string(), Value::from(description.as_str()));
        body.insert(
            "type".to_string(),
            Value::from(
                cmd.result
                    .asset_type
                    .clone()
                    .unwrap_or_else(|| profile.asset_type.clone()),
            ),
        );

        let credential = self
            .credentials
            .current_credential()
            .await
            .ok_or_else(|| GenerationError::authentication("no credential available, sign in again"))?;

        tracing::info!(
            handle = %cmd.handle,
            result_asset_id = result_asset_id,
            description_len = description.as_str().chars().count(),
            "Finalizing generated asset"
        );

        let response = self
            .backend
            .finalize(kind, &credential, Value::Object(body))
            .await
            .map_err(|e| {
                tracing::warn!(handle = %cmd.handle, error = %e, "Finalize rejected");
                GenerationError::from_request(e)
            })?;

        Ok(FinalizeReceipt {
            handle: cmd.handle,
            result_asset_id,
            response,
        })
    }
}
