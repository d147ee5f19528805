//! 媒体会话快照

use serde::{Deserialize, Serialize};

use super::track::{derive_track_id, PlaybackState};

/// 宿主媒体会话 API 上报的原始播放状态码
pub mod raw_state {
    pub const STOPPED: i32 = 1;
    pub const PAUSED: i32 = 2;
    pub const PLAYING: i32 = 3;
}

/// 会话上报的曲目元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

impl MediaMetadata {
    pub fn track_id(&self) -> String {
        derive_track_id(
            self.title.as_deref(),
            self.artist.as_deref(),
            self.album.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    /// 宿主原始状态码，见 [`raw_state`]
    pub state: i32,
    #[serde(default)]
    pub position_ms: i64,
}

/// 回调时某个会话的元数据和播放状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// 所属应用包名
    pub source: String,
    #[serde(default)]
    pub metadata: Option<MediaMetadata>,
    #[serde(default)]
    pub playback: Option<PlaybackSnapshot>,
}

impl SessionSnapshot {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            metadata: None,
            playback: None,
        }
    }

    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_playback(mut self, state: i32, position_ms: i64) -> Self {
        self.playback = Some(PlaybackSnapshot { state, position_ms });
        self
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.playback.map(|p| PlaybackState::from_raw(p.state))
    }

    /// 播放或暂停中，只有这类会话值得从通知中跟踪
    pub fn is_active(&self) -> bool {
        matches!(
            self.state(),
            Some(PlaybackState::Playing) | Some(PlaybackState::Paused)
        )
    }
}
