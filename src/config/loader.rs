//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;
use crate::domain::job::{JobKind, JobProfile};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `ASSETGEN_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `ASSETGEN_BACKEND__BASE_URL=https://api.example.com`
/// - `ASSETGEN_AUTH__TOKEN_FILE=/run/secrets/access_token`
/// - `ASSETGEN_JOBS__MENU_POSTER__INTERVAL_MS=3000`
/// - `ASSETGEN_LOG__LEVEL=debug`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("backend.base_url", "http://localhost:8080")?
        .set_default("backend.timeout_secs", 30)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;
    for kind in JobKind::ALL {
        builder = set_profile_defaults(builder, kind)?;
    }

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: ASSETGEN_JOBS__EVENT__MAX_WAIT_MS=60000
    builder = builder.add_source(
        Environment::with_prefix("ASSETGEN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 逐字段写入 profile 默认值，使配置文件可以只覆盖单个字段
fn set_profile_defaults(
    builder: ConfigBuilder<DefaultState>,
    kind: JobKind,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let profile = JobProfile::default_for(kind);
    let key = |field: &str| format!("jobs.{}.{}", kind.as_str(), field);

    let mut builder = builder
        .set_default(key("submit_path"), profile.submit_path)?
        .set_default(key("status_path"), profile.status_path)?
        .set_default(key("finalize_path"), profile.finalize_path)?
        .set_default(key("asset_key"), profile.asset_key)?
        .set_default(key("interval_ms"), profile.interval_ms)?
        .set_default(key("max_wait_ms"), profile.max_wait_ms)?
        .set_default(key("min_description_len"), profile.min_description_len as u64)?
        .set_default(key("asset_type"), profile.asset_type)?;

    if let Some(path) = profile.download_path {
        builder = builder.set_default(key("download_path"), path)?;
    }
    if let Some(parent_key) = profile.parent_key {
        builder = builder.set_default(key("parent_key"), parent_key)?;
    }
    if let Some(parent_object) = profile.parent_object {
        builder = builder.set_default(key("parent_object"), parent_object)?;
    }
    Ok(builder)
}

/// 验证配置有效性
pub(crate) fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let base_url = config.backend.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Backend base URL cannot be empty".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "Backend base URL must start with http:// or https://, got {}",
            base_url
        )));
    }

    if config.backend.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Backend timeout cannot be 0".to_string(),
        ));
    }

    for kind in JobKind::ALL {
        let profile = config.jobs.get(kind);
        if profile.interval_ms == 0 || profile.max_wait_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "[{}] interval_ms and max_wait_ms must be positive",
                kind
            )));
        }
        // 间隔不小于总时长时一次请求都不会发出
        if profile.interval_ms >= profile.max_wait_ms {
            return Err(ConfigError::ValidationError(format!(
                "[{}] interval_ms ({}) must be less than max_wait_ms ({})",
                kind, profile.interval_ms, profile.max_wait_ms
            )));
        }
        if !profile.status_path.contains("{asset_id}") {
            return Err(ConfigError::ValidationError(format!(
                "[{}] status_path must contain {{asset_id}}",
                kind
            )));
        }
        if profile.asset_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "[{}] asset_key cannot be empty",
                kind
            )));
        }
    }

    if config.status.success_codes.is_empty() || config.status.failure_codes.is_empty() {
        return Err(ConfigError::ValidationError(
            "Status success_codes and failure_codes cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Backend: {}", config.backend.base_url);
    tracing::info!("Backend Timeout: {}s", config.backend.timeout_secs);
    match (&config.auth.token_file, &config.auth.token) {
        (Some(path), _) => tracing::info!("Credential: file {:?}", path),
        (None, Some(_)) => tracing::info!("Credential: static token"),
        (None, None) => tracing::info!("Credential: none"),
    }
    for kind in JobKind::ALL {
        let profile = config.jobs.get(kind);
        tracing::info!(
            "Job [{}]: every {}ms, up to {}ms",
            kind,
            profile.interval_ms,
            profile.max_wait_ms
        );
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
