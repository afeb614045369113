//! Job Context - Submission Envelope Shapes
//!
//! 提交接口的响应结构不统一：真实数据可能包在 `data` 下，也可能直接在顶层；
//! ID 字段可能叫 `eventAssetId`，也可能叫 `id`。
//!
//! 这里用一组有序的 shape matcher 依次尝试，每个 matcher 要么完整匹配，要么不匹配，
//! 不会因为某个可选字段碰巧存在而接受残缺的响应。

use serde_json::Value;

use super::{JobError, JobHandle, JobKind, JobProfile};

/// 已知的响应结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleShape {
    /// `{data: {eventAssetId, eventId}}`
    NamedInData,
    /// `{eventAssetId, eventId}`
    NamedTopLevel,
    /// `{data: {id, event: {id}}}`
    GenericInData,
    /// `{id, event: {id}}`
    GenericTopLevel,
}

impl HandleShape {
    /// 匹配优先级
    pub const ORDER: [HandleShape; 4] = [
        HandleShape::NamedInData,
        HandleShape::NamedTopLevel,
        HandleShape::GenericInData,
        HandleShape::GenericTopLevel,
    ];

    /// 尝试完整匹配，返回 (asset_id, parent_id)
    pub fn matches(&self, profile: &JobProfile, body: &Value) -> Option<(i64, Option<i64>)> {
        let scope = match self {
            HandleShape::NamedInData | HandleShape::GenericInData => body.get("data")?,
            HandleShape::NamedTopLevel | HandleShape::GenericTopLevel => body,
        };
        if !scope.is_object() {
            return None;
        }

        let (asset_id, parent_id) = match self {
            HandleShape::NamedInData | HandleShape::NamedTopLevel => {
                let asset_id = id_field(scope.get(profile.asset_key.as_str()))?;
                let parent_id = profile
                    .parent_key
                    .as_deref()
                    .and_then(|key| id_field(scope.get(key)));
                (asset_id, parent_id)
            }
            HandleShape::GenericInData | HandleShape::GenericTopLevel => {
                let asset_id = id_field(scope.get("id"))?;
                let parent_id = profile
                    .parent_object
                    .as_deref()
                    .and_then(|key| scope.get(key))
                    .and_then(|parent| id_field(parent.get("id")));
                (asset_id, parent_id)
            }
        };

        // 需要父实体的任务类型，缺了父 ID 就视为整体不匹配
        if profile.has_parent() && parent_id.is_none() {
            return None;
        }
        Some((asset_id, parent_id))
    }
}

/// 从提交响应中提取任务句柄
pub fn extract_handle(kind: JobKind, profile: &JobProfile, body: &Value) -> Result<JobHandle, JobError> {
    for shape in HandleShape::ORDER {
        if let Some((asset_id, parent_id)) = shape.matches(profile, body) {
            tracing::debug!(
                kind = %kind,
                shape = ?shape,
                asset_id = asset_id,
                parent_id = ?parent_id,
                "Job handle extracted"
            );
            return Ok(JobHandle::new(kind, asset_id, parent_id));
        }
    }

    Err(JobError::UnrecognizedEnvelope(truncate(&body.to_string(), 300)))
}

/// 数值 ID，兼容数字字符串
pub(crate) fn id_field(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
