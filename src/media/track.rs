//! 曲目状态 - 推送给消费端的派生状态

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::session::raw_state;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    #[default]
    Unknown,
}

impl PlaybackState {
    /// 映射宿主播放状态码，不跟踪的一律为 `Unknown`
    pub fn from_raw(code: i32) -> Self {
        match code {
            raw_state::PLAYING => PlaybackState::Playing,
            raw_state::PAUSED => PlaybackState::Paused,
            raw_state::STOPPED => PlaybackState::Stopped,
            _ => PlaybackState::Unknown,
        }
    }
}

/// 曲目组合 key：`title:artist:album`
///
/// 缺失字段为空串。字段含 `:` 时可能冲突，为兼容已保存这些 id 的消费端保持原样
pub fn derive_track_id(title: Option<&str>, artist: Option<&str>, album: Option<&str>) -> String {
    format!(
        "{}:{}:{}",
        title.unwrap_or_default(),
        artist.unwrap_or_default(),
        album.unwrap_or_default()
    )
}

/// 消费端看到的当前曲目，全空表示没有播放
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: String,
    pub source: Option<String>,
    pub state: PlaybackState,
    pub album: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub duration_ms: Option<i64>,
    pub position_ms: Option<i64>,
    pub volume_percent: Option<u32>,
}

impl TrackInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    pub fn to_payload(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
