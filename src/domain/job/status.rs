//! Job Context - Job Status
//!
//! 状态接口返回的编码五花八门：有的用 `code` 枚举字符串，有的用 `status` 字段，
//! 有的包在 `data` 里。`StatusRules` 把它们归一为三种逻辑状态。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::shapes::id_field;

/// 生成结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// 生成资源的 URL
    pub asset_url: String,
    /// 结果资源 ID（finalize 时需要，可能与句柄中的 asset_id 不同）
    pub result_asset_id: Option<i64>,
    /// 资源类型（IMAGE / VIDEO）
    pub asset_type: Option<String>,
}

/// 归一化后的任务状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// 已受理，尚未完成
    Pending,
    /// 已完成
    Success(GenerationResult),
    /// 终止失败，本层不重试
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Success(_) => "success",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// 状态编码的逻辑分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Success,
    Failed,
    Pending,
}

/// 状态归一化规则
#[derive(Debug, Clone, Deserialize)]
pub struct StatusRules {
    #[serde(default = "default_success_codes")]
    pub success_codes: Vec<String>,

    #[serde(default = "default_failure_codes")]
    pub failure_codes: Vec<String>,

    #[serde(default = "default_pending_codes")]
    pub pending_codes: Vec<String>,

    /// 结果资源 ID 的候选字段，按顺序查找
    #[serde(default = "default_result_id_keys")]
    pub result_id_keys: Vec<String>,
}

fn default_success_codes() -> Vec<String> {
    to_strings(&["ASSET_GENERATION_SUCCESS", "SUCCESS", "COMPLETED", "DONE"])
}

fn default_failure_codes() -> Vec<String> {
    to_strings(&["ASSET_GENERATION_FAILED", "FAILED", "FAIL", "ERROR"])
}

fn default_pending_codes() -> Vec<String> {
    to_strings(&["ASSET_GENERATION_PENDING", "PENDING", "PROCESSING", "IN_PROGRESS"])
}

fn default_result_id_keys() -> Vec<String> {
    to_strings(&["resultAssetId", "assetId"])
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for StatusRules {
    fn default() -> Self {
        Self {
            success_codes: default_success_codes(),
            failure_codes: default_failure_codes(),
            pending_codes: default_pending_codes(),
            result_id_keys: default_result_id_keys(),
        }
    }
}

/// 状态编码的查找位置，按优先级
const STATUS_LOCATIONS: [(Option<&str>, &str); 4] = [
    (None, "code"),
    (None, "status"),
    (Some("data"), "code"),
    (Some("data"), "status"),
];

impl StatusRules {
    /// 归一化状态响应
    ///
    /// 无法识别的编码一律视为 `Pending`（继续轮询，由总超时兜底）。
    /// 成功编码但 `assetUrl` 为空时同样视为 `Pending`，后端在生成中会返回空 URL。
    pub fn normalize(&self, body: &Value) -> JobStatus {
        let verdict = STATUS_LOCATIONS
            .iter()
            .filter_map(|(scope, key)| {
                let container = match scope {
                    Some(scope) => body.get(*scope)?,
                    None => body,
                };
                container.get(*key)?.as_str()
            })
            .find_map(|code| self.classify(code));

        match verdict {
            Some(Verdict::Success) => match self.result_from(body) {
                Some(result) => JobStatus::Success(result),
                None => JobStatus::Pending,
            },
            Some(Verdict::Failed) => JobStatus::Failed {
                reason: failure_reason(body),
            },
            Some(Verdict::Pending) | None => JobStatus::Pending,
        }
    }

    fn classify(&self, code: &str) -> Option<Verdict> {
        let code = code.trim();
        let hit = |codes: &[String]| codes.iter().any(|c| code_matches(code, c));
        if hit(&self.success_codes) {
            Some(Verdict::Success)
        } else if hit(&self.failure_codes) {
            Some(Verdict::Failed)
        } else if hit(&self.pending_codes) {
            Some(Verdict::Pending)
        } else {
            None
        }
    }

    fn result_from(&self, body: &Value) -> Option<GenerationResult> {
        let data = body.get("data");
        let lookup = |key: &str| data.and_then(|d| d.get(key)).or_else(|| body.get(key));

        let asset_url = ["assetUrl", "url"]
            .iter()
            .filter_map(|key| lookup(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|url| !url.is_empty())?
            .to_string();

        let result_asset_id = self
            .result_id_keys
            .iter()
            .find_map(|key| id_field(lookup(key)));

        let asset_type = lookup("type").and_then(Value::as_str).map(str::to_string);

        Some(GenerationResult {
            asset_url,
            result_asset_id,
            asset_type,
        })
    }
}

/// 编码匹配：完全相同，或带业务前缀的复合编码
///
/// `REVIEW_ASSET_GENERATION_SUCCESS` 匹配 `ASSET_GENERATION_SUCCESS`。
/// 单段编码（`SUCCESS`）只做完全匹配，否则 `ASSET_NOT_SUCCESS` 也会被当成成功。
fn code_matches(code: &str, known: &str) -> bool {
    if code.eq_ignore_ascii_case(known) {
        return true;
    }
    let split = code.len().saturating_sub(known.len());
    if !known.contains('_') || split == 0 || !code.is_char_boundary(split) {
        return false;
    }
    let (prefix, tail) = code.split_at(split);
    prefix.ends_with('_') && tail.eq_ignore_ascii_case(known)
}

fn failure_reason(body: &Value) -> String {
    let data = body.get("data");
    ["message", "error", "reason"]
        .iter()
        .filter_map(|key| {
            data.and_then(|d| d.get(*key))
                .or_else(|| body.get(*key))
                .and_then(Value::as_str)
        })
        .find(|s| !s.trim().is_empty())
        .unwrap_or("asset generation failed")
        .to_string()
}
