//! 分发桥 - 把事件和曲目更新推过消费端边界
//!
//! 每次推送携带一个数字句柄，消费端据此路由到对应回调。句柄首次使用时从
//! `ConfigStore` 读取并缓存在内存中。读取和缓存与 `invalidate_handles` 持有同一把锁，
//! 过期的读取不会在失效之后留下来。投递至多一次：失败只记日志并丢弃，不重试。

pub mod lines;
pub mod link;
pub mod recording;

pub use lines::{JsonLineBoundary, LineSink};
pub use link::ConsumerLink;
pub use recording::RecordingBoundary;

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

use crate::config::ConfigStore;
use crate::error::{HandleKind, RelayError, RelayResult};
use crate::media::TrackInfo;
use crate::notification::{EventSink, NotificationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMethod {
    SinkEvent,
    SinkMediaEvent,
}

impl PushMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushMethod::SinkEvent => "sink_event",
            PushMethod::SinkMediaEvent => "sink_media_event",
        }
    }
}

/// 一次出站推送
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPush {
    pub method: PushMethod,
    pub handle: i64,
    pub payload: serde_json::Value,
}

/// 进入消费端运行时的边界
pub trait ConsumerBoundary: Send + Sync {
    /// 边界名称（用于日志）
    fn name(&self) -> &str;

    /// 同步投递，消费端不在时返回 `TransportUnavailable`
    fn push(&self, push: &OutboundPush) -> RelayResult<()>;
}

/// 已解析的句柄，0 表示尚未解析
#[derive(Default)]
struct HandleSlots {
    event: i64,
    media: i64,
}

pub struct DispatchBridge {
    boundary: Arc<dyn ConsumerBoundary>,
    config: Arc<dyn ConfigStore>,
    handles: Mutex<HandleSlots>,
}

impl DispatchBridge {
    pub fn new(boundary: Arc<dyn ConsumerBoundary>, config: Arc<dyn ConfigStore>) -> Self {
        Self {
            boundary,
            config,
            handles: Mutex::new(HandleSlots::default()),
        }
    }

    pub fn send_event(&self, event: &NotificationEvent) -> RelayResult<()> {
        debug!(uid = %event.uid, "Sending notification event");
        let payload = event
            .to_payload()
            .map_err(|e| RelayError::TransportUnavailable(e.to_string()))?;
        self.push(HandleKind::Event, PushMethod::SinkEvent, payload)
    }

    pub fn send_track(&self, track: &TrackInfo) -> RelayResult<()> {
        debug!(id = %track.id, state = ?track.state, "Sending media event");
        let payload = track
            .to_payload()
            .map_err(|e| RelayError::TransportUnavailable(e.to_string()))?;
        self.push(HandleKind::Media, PushMethod::SinkMediaEvent, payload)
    }

    /// 丢弃缓存的句柄，下一次推送重新读取
    pub fn invalidate_handles(&self) {
        *self.handles.lock().unwrap_or_else(PoisonError::into_inner) = HandleSlots::default();
    }

    fn push(&self, kind: HandleKind, method: PushMethod, payload: serde_json::Value) -> RelayResult<()> {
        let handle = match self.resolve(kind) {
            Ok(handle) => handle,
            Err(e) => {
                error!(kind = %kind, "Fatal: no callback registered, dropping {}", method.as_str());
                return Err(e);
            }
        };

        let push = OutboundPush {
            method,
            handle,
            payload,
        };
        self.boundary.push(&push).map_err(|e| {
            warn!(
                boundary = self.boundary.name(),
                method = method.as_str(),
                error = %e,
                "Push failed, event dropped"
            );
            e
        })
    }

    fn resolve(&self, kind: HandleKind) -> RelayResult<i64> {
        let mut slots = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = match kind {
            HandleKind::Event => &mut slots.event,
            HandleKind::Media => &mut slots.media,
        };

        if *slot != 0 {
            return Ok(*slot);
        }

        let handle = match self.config.load() {
            Ok(config) => match kind {
                HandleKind::Event => config.callback_handle,
                HandleKind::Media => config.media_callback_handle,
            },
            Err(e) => {
                warn!(error = %e, "Failed to read callback handles");
                0
            }
        };

        if handle == 0 {
            return Err(RelayError::MisconfiguredHandle { kind });
        }
        *slot = handle;
        Ok(handle)
    }
}

impl EventSink for DispatchBridge {
    fn deliver(&self, event: &NotificationEvent) {
        // 失败已在 push 中记录
        let _ = self.send_event(event);
    }
}
