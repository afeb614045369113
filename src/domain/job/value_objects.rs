//! Job Context - Value Objects

use serde::{Deserialize, Serialize};

/// 生成任务类型
///
/// 每种类型对应后端一组独立的 submit / status / finalize 接口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// 活动海报
    Event,
    /// 菜单海报
    MenuPoster,
    /// 评论图片/视频
    Review,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Event, JobKind::MenuPoster, JobKind::Review];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Event => "event",
            JobKind::MenuPoster => "menu_poster",
            JobKind::Review => "review",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "event" => Some(JobKind::Event),
            "menu_poster" | "menu-poster" => Some(JobKind::MenuPoster),
            "review" => Some(JobKind::Review),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务句柄
///
/// 提交接口返回的关联键，贯穿 status 查询与 finalize 请求。
/// 本身没有生命周期，只用于关联。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub kind: JobKind,
    /// 生成资源 ID（如 eventAssetId）
    pub asset_id: i64,
    /// 父实体 ID（如 eventId），部分任务类型没有
    pub parent_id: Option<i64>,
}

impl JobHandle {
    pub fn new(kind: JobKind, asset_id: i64, parent_id: Option<i64>) -> Self {
        Self {
            kind,
            asset_id,
            parent_id,
        }
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.parent_id {
            Some(parent_id) => write!(f, "{}:{}/{}", self.kind, parent_id, self.asset_id),
            None => write!(f, "{}:{}", self.kind, self.asset_id),
        }
    }
}

/// 认证凭据（Bearer token）
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self, &'static str> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err("凭据不能为空");
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// token 不进日志
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Finalize 描述文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description(String);

impl Description {
    /// 按去除首尾空白后的字符数校验最小长度
    pub fn new(text: impl Into<String>, min_len: usize) -> Result<Self, (usize, usize)> {
        let text = text.into();
        let len = text.trim().chars().count();
        if len < min_len {
            return Err((min_len, len));
        }
        Ok(Self(text.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::from_str("menu-poster"), Some(JobKind::MenuPoster));
        assert_eq!(JobKind::from_str("unknown"), None);
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(JobHandle::new(JobKind::Event, 7, Some(3)).to_string(), "event:3/7");
        assert_eq!(JobHandle::new(JobKind::MenuPoster, 9, None).to_string(), "menu_poster:9");
    }

    #[test]
    fn test_credential_rejects_blank() {
        assert!(Credential::new("   ").is_err());
        let credential = Credential::new(" abc ").unwrap();
        assert_eq!(credential.bearer(), "Bearer abc");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
    }

    #[test]
    fn test_description_min_length_counts_chars() {
        assert_eq!(Description::new("  short  ", 30), Err((30, 5)));
        let korean = "맛있는 이벤트가 열립니다. 많은 방문 부탁드립니다!!";
        assert!(Description::new(korean, 20).is_ok());
    }
}
