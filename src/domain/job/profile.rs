//! Job Context - Job Profile
//!
//! 每种任务类型的接口路径、ID 字段名与轮询参数

use serde::Deserialize;

use super::JobKind;

/// 任务类型配置
///
/// 各页面原本各自手写的轮询逻辑，统一收敛为一份 profile
#[derive(Debug, Clone, Deserialize)]
pub struct JobProfile {
    /// 提交生成请求的路径
    pub submit_path: String,

    /// 状态查询路径，`{asset_id}` 会被替换
    pub status_path: String,

    /// 最终登记路径
    pub finalize_path: String,

    /// 资源下载路径（可选），查询参数为 `<asset_key>=<asset_id>`
    #[serde(default)]
    pub download_path: Option<String>,

    /// 响应中资源 ID 的字段名（如 `eventAssetId`）
    pub asset_key: String,

    /// 响应中父实体 ID 的字段名（如 `eventId`），没有父实体时为空
    #[serde(default)]
    pub parent_key: Option<String>,

    /// 父实体嵌套对象名（如 `event`，匹配 `event.id`）
    #[serde(default)]
    pub parent_object: Option<String>,

    /// 轮询间隔（毫秒）
    pub interval_ms: u64,

    /// 最长等待时间（毫秒）
    pub max_wait_ms: u64,

    /// finalize 描述最小长度
    #[serde(default = "default_min_description_len")]
    pub min_description_len: usize,

    /// finalize 时提交的资源类型
    #[serde(default = "default_asset_type")]
    pub asset_type: String,
}

fn default_min_description_len() -> usize {
    30
}

fn default_asset_type() -> String {
    "IMAGE".to_string()
}

impl JobProfile {
    /// 内置默认 profile
    pub fn default_for(kind: JobKind) -> Self {
        match kind {
            JobKind::Event => Self {
                submit_path: "/api/events/assets/request".to_string(),
                status_path: "/api/events/assets/{asset_id}/result".to_string(),
                finalize_path: "/api/events/finalize".to_string(),
                download_path: Some("/api/events/assets/download".to_string()),
                asset_key: "eventAssetId".to_string(),
                parent_key: Some("eventId".to_string()),
                parent_object: Some("event".to_string()),
                interval_ms: 1_000,
                max_wait_ms: 30_000,
                min_description_len: default_min_description_len(),
                asset_type: default_asset_type(),
            },
            JobKind::MenuPoster => Self {
                submit_path: "/api/menu-posters/assets/request".to_string(),
                status_path: "/api/menu-posters/assets/{asset_id}/result".to_string(),
                finalize_path: "/api/menu-posters/finalize".to_string(),
                download_path: None,
                asset_key: "menuPosterAssetId".to_string(),
                parent_key: Some("menuPosterId".to_string()),
                parent_object: Some("menuPoster".to_string()),
                interval_ms: 5_000,
                max_wait_ms: 120_000,
                min_description_len: default_min_description_len(),
                asset_type: default_asset_type(),
            },
            JobKind::Review => Self {
                submit_path: "/api/reviews/assets".to_string(),
                status_path: "/api/reviews/assets/{asset_id}/result".to_string(),
                finalize_path: "/api/reviews/finalize".to_string(),
                download_path: None,
                asset_key: "reviewAssetId".to_string(),
                parent_key: Some("reviewId".to_string()),
                parent_object: Some("review".to_string()),
                interval_ms: 4_000,
                max_wait_ms: 120_000,
                min_description_len: default_min_description_len(),
                asset_type: default_asset_type(),
            },
        }
    }

    /// 带 asset_id 的状态查询路径
    pub fn status_path_for(&self, asset_id: i64) -> String {
        self.status_path
            .replace("{asset_id}", &asset_id.to_string())
    }

    pub fn has_parent(&self) -> bool {
        self.parent_key.is_some() || self.parent_object.is_some()
    }
}

/// 全部任务类型的 profile
#[derive(Debug, Clone, Deserialize)]
pub struct JobProfiles {
    #[serde(default = "event_profile")]
    pub event: JobProfile,

    #[serde(default = "menu_poster_profile")]
    pub menu_poster: JobProfile,

    #[serde(default = "review_profile")]
    pub review: JobProfile,
}

fn event_profile() -> JobProfile {
    JobProfile::default_for(JobKind::Event)
}

fn menu_poster_profile() -> JobProfile {
    JobProfile::default_for(JobKind::MenuPoster)
}

fn review_profile() -> JobProfile {
    JobProfile::default_for(JobKind::Review)
}

impl Default for JobProfiles {
    fn default() -> Self {
        Self {
            event: event_profile(),
            menu_poster: menu_poster_profile(),
            review: review_profile(),
        }
    }
}

impl JobProfiles {
    pub fn get(&self, kind: JobKind) -> &JobProfile {
        match kind {
            JobKind::Event => &self.event,
            JobKind::MenuPoster => &self.menu_poster,
            JobKind::Review => &self.review,
        }
    }

    pub fn get_mut(&mut self, kind: JobKind) -> &mut JobProfile {
        match kind {
            JobKind::Event => &mut self.event,
            JobKind::MenuPoster => &mut self.menu_poster,
            JobKind::Review => &mut self.review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_path_substitution() {
        let profile = JobProfile::default_for(JobKind::Event);
        assert_eq!(profile.status_path_for(42), "/api/events/assets/42/result");
    }

    #[test]
    fn test_default_timing_per_kind() {
        let event = JobProfile::default_for(JobKind::Event);
        assert_eq!((event.interval_ms, event.max_wait_ms), (1_000, 30_000));

        let review = JobProfile::default_for(JobKind::Review);
        assert_eq!((review.interval_ms, review.max_wait_ms), (4_000, 120_000));
        assert!(review.has_parent());
    }

    #[test]
    fn test_profiles_lookup_by_kind() {
        let profiles = JobProfiles::default();
        for kind in JobKind::ALL {
            assert_eq!(profiles.get(kind).asset_key, JobProfile::default_for(kind).asset_key);
        }
    }
}
