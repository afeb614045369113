//! assetgen - 异步素材生成任务客户端
//!
//! 提交生成请求 → 轮询状态 → 可选的最终登记与下载

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use assetgen::application::ports::{
    Attachment, CredentialProviderPort, GenerationBackendPort, SubmissionPayload,
};
use assetgen::application::{
    DownloadAsset, DownloadAssetHandler, FinalizeGeneration, FinalizeGenerationHandler,
    SubmitGeneration, SubmitGenerationHandler,
};
use assetgen::config::{load_config_from_path, print_config, AppConfig, LogConfig};
use assetgen::domain::job::{
    Description, GenerationResult, JobError, JobHandle, JobKind, JobProfiles,
};
use assetgen::infrastructure::adapters::{
    FakeGenerationBackend, FileCredentialProvider, HttpGenerationClient,
    HttpGenerationClientConfig, StaticCredentialProvider,
};
use assetgen::infrastructure::{
    BroadcastPollObserver, InMemoryPollRegistry, PollEvent, PollEventPublisher, PollOutcome,
    StatusPoller,
};

#[derive(Parser)]
#[command(author, version, about = "Submit asset generation jobs and wait for the result", long_about = None)]
/// Command-line arguments
struct Args {
    /// Path to a config file (defaults to ./config.toml and ./config.local.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the built-in fake backend instead of HTTP
    #[arg(long, global = true)]
    fake: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a generation request and poll until it completes
    Generate {
        /// Job kind: event, menu_poster, review
        #[arg(value_parser = parse_kind)]
        kind: JobKind,

        /// Form field, repeatable (e.g. --field eventId=3 --field menuIds=7)
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Reference image uploaded as the `image` part
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,

        #[command(flatten)]
        after: AfterSuccess,
    },
    /// Resume polling an existing job
    Poll {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,

        /// Generated asset id
        asset_id: i64,

        /// Parent entity id
        #[arg(long)]
        parent_id: Option<i64>,

        #[command(flatten)]
        after: AfterSuccess,
    },
}

/// 成功之后的可选步骤
#[derive(clap::Args)]
struct AfterSuccess {
    /// Finalize the result with this description
    #[arg(long)]
    description: Option<String>,

    /// Download the generated asset to this path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl AfterSuccess {
    /// 描述长度在提交前就校验，避免等完整个轮询才发现不合格
    fn validate(&self, kind: JobKind, jobs: &JobProfiles) -> anyhow::Result<()> {
        if let Some(description) = &self.description {
            Description::new(description.as_str(), jobs.get(kind).min_description_len)
                .map_err(|(min, actual)| JobError::DescriptionTooShort { min, actual })?;
        }
        Ok(())
    }
}

fn parse_kind(s: &str) -> Result<JobKind, String> {
    JobKind::from_str(s).ok_or_else(|| format!("unknown job kind: {} (event, menu_poster, review)", s))
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {}", s)),
    }
}

/// 组装好的依赖
struct App {
    config: AppConfig,
    backend: Arc<dyn GenerationBackendPort>,
    credentials: Arc<dyn CredentialProviderPort>,
    poller: StatusPoller,
    publisher: Arc<PollEventPublisher>,
}

impl App {
    fn build(config: AppConfig, fake: bool) -> anyhow::Result<Self> {
        let backend: Arc<dyn GenerationBackendPort> = if fake {
            tracing::info!("Using fake generation backend");
            Arc::new(FakeGenerationBackend::simulated(
                2,
                "https://assets.example.com/fake.png",
            ))
        } else {
            let client_config = HttpGenerationClientConfig::new(&config.backend.base_url)
                .with_timeout(config.backend.timeout_secs)
                .with_profiles(config.jobs.clone());
            Arc::new(HttpGenerationClient::new(client_config)?)
        };

        let credentials: Arc<dyn CredentialProviderPort> = match (&config.auth.token_file, &config.auth.token) {
            (Some(path), _) => Arc::new(FileCredentialProvider::new(path.clone())),
            (None, Some(token)) => Arc::new(StaticCredentialProvider::new(Some(token))),
            (None, None) if fake => Arc::new(StaticCredentialProvider::new(Some("fake-token"))),
            (None, None) => Arc::new(StaticCredentialProvider::new(None)),
        };

        let poller = StatusPoller::new(
            backend.clone(),
            credentials.clone(),
            InMemoryPollRegistry::new().arc(),
            Arc::new(config.status.clone()),
        );

        Ok(Self {
            config,
            backend,
            credentials,
            poller,
            publisher: PollEventPublisher::new().arc(),
        })
    }

    async fn submit(
        &self,
        kind: JobKind,
        fields: Vec<(String, String)>,
        image: Option<&Path>,
    ) -> anyhow::Result<JobHandle> {
        let mut payload = fields
            .into_iter()
            .fold(SubmissionPayload::multipart(), |p, (k, v)| p.with_field(k, v));

        if let Some(path) = image {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            payload = payload.with_attachment(Attachment {
                field: "image".to_string(),
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string()),
                mime_type: guess_mime(path).to_string(),
                bytes,
            });
        }

        let handler = SubmitGenerationHandler::new(
            self.backend.clone(),
            self.credentials.clone(),
            Arc::new(self.config.jobs.clone()),
        );
        let handle = handler.handle(SubmitGeneration { kind, payload }).await?;
        tracing::info!(handle = %handle, "Generation submitted");
        Ok(handle)
    }

    /// 轮询直到终止；Ctrl-C 取消会话
    async fn poll(&self, handle: JobHandle) -> anyhow::Result<GenerationResult> {
        let poll_config = self.config.poll_config(handle.kind)?;
        let mut events = self.publisher.subscribe(handle);
        let observer = Arc::new(BroadcastPollObserver::new(self.publisher.clone()));

        let progress = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PollEvent::Tick { tick, status, .. }) => {
                        tracing::info!(tick = tick, status = %status, "Waiting for asset");
                    }
                    Ok(_) | Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "Progress events lagged");
                    }
                }
            }
        });

        let subscription = self.poller.start(handle, poll_config, observer);
        let outcome = tokio::select! {
            outcome = subscription.wait() => outcome,
            _ = tokio::signal::ctrl_c() => {
                subscription.cancel();
                PollOutcome::Cancelled
            }
        };
        progress.abort();
        self.publisher.release(&handle);

        match outcome {
            PollOutcome::Succeeded(result) => Ok(result),
            PollOutcome::Failed(e) => Err(anyhow!(e).context(format!("Job {} did not complete", handle))),
            PollOutcome::Cancelled => Err(anyhow!("Polling of {} cancelled", handle)),
        }
    }

    async fn after_success(
        &self,
        handle: JobHandle,
        result: GenerationResult,
        after: AfterSuccess,
    ) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(&result)?);

        if let Some(destination) = after.output {
            let handler = DownloadAssetHandler::new(self.backend.clone(), self.credentials.clone());
            let receipt = handler
                .handle(DownloadAsset {
                    handle,
                    result: Some(result.clone()),
                    destination,
                })
                .await?;
            println!("saved {} bytes to {}", receipt.size_bytes, receipt.path.display());
        }

        if let Some(description) = after.description {
            let handler = FinalizeGenerationHandler::new(
                self.backend.clone(),
                self.credentials.clone(),
                Arc::new(self.config.jobs.clone()),
            );
            let receipt = handler
                .handle(FinalizeGeneration {
                    handle,
                    result,
                    description,
                })
                .await?;
            println!("finalized {} (asset {})", receipt.handle, receipt.result_asset_id);
        }
        Ok(())
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

fn init_tracing(log: &LogConfig) {
    let log_filter = format!("{},assetgen={}", log.level, log.level);
    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
    );
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(args.config.as_deref())
        .map_err(|e| anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log);
    print_config(&config);

    let app = App::build(config, args.fake)?;

    match args.command {
        Command::Generate {
            kind,
            fields,
            image,
            after,
        } => {
            after.validate(kind, &app.config.jobs)?;
            let handle = app.submit(kind, fields, image.as_deref()).await?;
            let result = app.poll(handle).await?;
            app.after_success(handle, result, after).await?;
        }
        Command::Poll {
            kind,
            asset_id,
            parent_id,
            after,
        } => {
            after.validate(kind, &app.config.jobs)?;
            let handle = JobHandle::new(kind, asset_id, parent_id);
            let result = app.poll(handle).await?;
            app.after_success(handle, result, after).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn after(description: Option<&str>) -> AfterSuccess {
        AfterSuccess {
            description: description.map(str::to_string),
            output: None,
        }
    }

    #[test]
    fn test_short_description_rejected_before_submit() {
        let jobs = JobProfiles::default();
        let min = jobs.get(JobKind::Review).min_description_len;

        let err = after(Some("tasty")).validate(JobKind::Review, &jobs).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JobError>(),
            Some(JobError::DescriptionTooShort { .. })
        ));

        let long = "x".repeat(min.max(1));
        assert!(after(Some(long.as_str())).validate(JobKind::Review, &jobs).is_ok());
        assert!(after(None).validate(JobKind::Review, &jobs).is_ok());
    }
}
