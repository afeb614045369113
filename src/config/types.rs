//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::job::{JobError, JobKind, JobProfiles, StatusRules};
use crate::domain::poll::PollConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 生成服务后端配置
    #[serde(default)]
    pub backend: BackendConfig,

    /// 认证配置
    #[serde(default)]
    pub auth: AuthConfig,

    /// 各任务类型的 profile
    #[serde(default)]
    pub jobs: JobProfiles,

    /// 状态编码词表
    #[serde(default)]
    pub status: StatusRules,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 指定任务类型的轮询参数
    pub fn poll_config(&self, kind: JobKind) -> Result<PollConfig, JobError> {
        PollConfig::from_profile(self.jobs.get(kind))
    }
}

/// 生成服务后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// 后端基础 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 单次请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// 认证配置
///
/// `token_file` 优先：每次请求都会重新读取文件，外部刷新 token 后立即生效
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// 固定 token
    #[serde(default)]
    pub token: Option<String>,

    /// token 文件路径
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend.base_url, "http://localhost:8080");
        assert_eq!(config.backend.timeout_secs, 30);
        assert!(config.auth.token.is_none());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_poll_config_per_kind() {
        let config = AppConfig::default();
        let poster = config.poll_config(JobKind::MenuPoster).unwrap();
        assert_eq!(poster.interval, Duration::from_secs(5));
        assert_eq!(poster.max_wait, Duration::from_secs(120));
    }
}
