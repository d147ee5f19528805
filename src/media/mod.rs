//! 媒体播放跟踪 - 把嘈杂的会话快照转换成曲目更新

pub mod session;
pub mod track;
pub mod tracker;

pub use session::{MediaMetadata, PlaybackSnapshot, SessionSnapshot};
pub use track::{derive_track_id, PlaybackState, TrackInfo};
pub use tracker::{FixedVolume, MediaStateTracker, Suppression, Transition, VolumeSource};
