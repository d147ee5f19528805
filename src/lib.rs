//! Notification Relay - 采集通知和媒体会话事件，转发给晚到的消费端

pub mod action;
pub mod capture;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod notification;
pub mod pipeline;
pub mod server;
pub mod service;

pub use action::ActionInvoker;
pub use capture::recorded::{replay_feed, Invocation, InvocationLog, RecordedHandle, RecordedNotice};
pub use capture::{capture_channel, CaptureNotice, CaptureSender, NativeNotification, NotificationKey, RawNotification, ReplyInput};
pub use config::{ConfigStore, FileConfigStore, MemoryConfigStore, PromoteConfig, RelayConfig};
pub use dispatch::{ConsumerBoundary, ConsumerLink, DispatchBridge, JsonLineBoundary, LineSink, OutboundPush, PushMethod, RecordingBoundary};
pub use error::{HandleKind, RelayError, RelayResult};
pub use media::{FixedVolume, MediaStateTracker, PlaybackState, SessionSnapshot, TrackInfo, VolumeSource};
pub use notification::{ActionInfo, CachedNotification, DeliveryQueue, EventSink, NotificationCache, NotificationEvent};
pub use pipeline::{CaptureWorker, Pipeline, PipelineBuilder};
pub use server::CommandServer;
pub use service::{ForegroundController, ForegroundState};
