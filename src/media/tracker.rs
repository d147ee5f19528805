//! 媒体状态机
//!
//! 很多应用会同时挂着暂停的会话，每次变化都会各自上报。
//! 只有正在跟踪的曲目能转为暂停或停止，播放上报总是接管。

use std::sync::Arc;
use tracing::debug;

use super::session::SessionSnapshot;
use super::track::{PlaybackState, TrackInfo};

/// 音乐流的系统输出音量
pub trait VolumeSource: Send + Sync {
    /// `(current_level, max_level)`
    fn music_volume(&self) -> (u32, u32);
}

/// 固定音量源，用于没有混音器的宿主和测试
#[derive(Debug, Clone, Copy)]
pub struct FixedVolume {
    pub level: u32,
    pub max: u32,
}

impl FixedVolume {
    pub fn new(level: u32, max: u32) -> Self {
        Self { level, max }
    }
}

impl VolumeSource for FixedVolume {
    fn music_volume(&self) -> (u32, u32) {
        (self.level, self.max)
    }
}

pub fn volume_percent(level: u32, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    level.saturating_mul(100) / max
}

/// 快照没有产出的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    NoMetadata,
    NoPlaybackState,
    /// 无法识别的播放状态码，已清空当前曲目
    UnknownState,
    /// 非当前曲目的暂停上报
    ForeignPaused,
    /// 非当前曲目的停止上报
    ForeignStopped,
    /// 被移除的会话不是当前曲目
    NotCurrent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Emit(TrackInfo),
    Suppressed(Suppression),
}

impl Transition {
    pub fn emitted(&self) -> Option<&TrackInfo> {
        match self {
            Transition::Emit(track) => Some(track),
            Transition::Suppressed(_) => None,
        }
    }
}

pub struct MediaStateTracker {
    current: TrackInfo,
    volume: Arc<dyn VolumeSource>,
}

impl MediaStateTracker {
    pub fn new(volume: Arc<dyn VolumeSource>) -> Self {
        Self {
            current: TrackInfo::empty(),
            volume,
        }
    }

    /// 当前曲目，不含音量（音量在每次产出时计算）
    pub fn current(&self) -> &TrackInfo {
        &self.current
    }

    /// 处理会话变化快照
    pub fn extract(&mut self, snapshot: &SessionSnapshot) -> Transition {
        let Some(metadata) = &snapshot.metadata else {
            return Transition::Suppressed(Suppression::NoMetadata);
        };
        let Some(playback) = snapshot.playback else {
            return Transition::Suppressed(Suppression::NoPlaybackState);
        };

        let id = metadata.track_id();
        let state = PlaybackState::from_raw(playback.state);

        match state {
            PlaybackState::Unknown => {
                debug!(source = %snapshot.source, raw = playback.state, "Unknown playback state, clearing track");
                self.current = TrackInfo::empty();
                return Transition::Suppressed(Suppression::UnknownState);
            }
            // 没有当前曲目时，暂停的会话仍然值得展示
            PlaybackState::Paused if !self.current.is_empty() && id != self.current.id => {
                return Transition::Suppressed(Suppression::ForeignPaused);
            }
            PlaybackState::Stopped if id != self.current.id => {
                return Transition::Suppressed(Suppression::ForeignStopped);
            }
            _ => {}
        }

        let track = TrackInfo {
            id,
            source: Some(snapshot.source.clone()),
            state,
            album: metadata.album.clone(),
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            genre: metadata.genre.clone(),
            duration_ms: metadata.duration_ms,
            position_ms: Some(playback.position_ms),
            volume_percent: None,
        };
        self.current = track.clone();

        Transition::Emit(self.with_volume(track))
    }

    /// 处理会话移除通知
    pub fn session_removed(&mut self, snapshot: &SessionSnapshot) -> Transition {
        let Some(metadata) = &snapshot.metadata else {
            return Transition::Suppressed(Suppression::NoMetadata);
        };

        if self.current.is_empty() || metadata.track_id() != self.current.id {
            return Transition::Suppressed(Suppression::NotCurrent);
        }

        debug!(id = %self.current.id, "Tracked session removed");
        self.current = TrackInfo::empty();
        Transition::Emit(TrackInfo::empty())
    }

    fn with_volume(&self, mut track: TrackInfo) -> TrackInfo {
        let (level, max) = self.volume.music_volume();
        track.volume_percent = Some(volume_percent(level, max));
        track
    }
}
