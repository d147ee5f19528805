//! 中继管道
//!
//! 每个进程显式构建一套对象图。`PipelineBuilder::build` 返回三部分：
//!
//! - `Pipeline`: 可廉价克隆的命令入口，供服务器使用
//! - `CaptureWorker`: 在独立任务上消费采集通道
//! - `CaptureSender`: 交给宿主回调的生产者
//!
//! ```text
//! CaptureSender ──mpsc──▶ CaptureWorker ──▶ NotificationCache
//!                               │      └──▶ DeliveryQueue ──┐
//!                               └─▶ MediaStateTracker ──────┴─▶ DispatchBridge ──▶ ConsumerLink
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::action::ActionInvoker;
use crate::capture::{capture_channel, CaptureNotice, CaptureReceiver, CaptureSender, RawNotification, ReplyInput};
use crate::config::{ConfigStore, MemoryConfigStore, PromoteConfig};
use crate::dispatch::{ConsumerBoundary, ConsumerLink, DispatchBridge};
use crate::error::RelayResult;
use crate::media::{FixedVolume, MediaStateTracker, SessionSnapshot, Transition, VolumeSource};
use crate::notification::{CachedNotification, Delivery, DeliveryQueue, NotificationCache, NotificationEvent};
use crate::service::{ForegroundController, ForegroundState};

pub const DEFAULT_CAPTURE_CAPACITY: usize = 256;

pub struct PipelineBuilder {
    boundary: Option<Arc<dyn ConsumerBoundary>>,
    config: Option<Arc<dyn ConfigStore>>,
    volume: Option<Arc<dyn VolumeSource>>,
    foreground: Option<Arc<dyn ForegroundController>>,
    capacity: usize,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            boundary: None,
            config: None,
            volume: None,
            foreground: None,
            capacity: DEFAULT_CAPTURE_CAPACITY,
        }
    }

    /// 启动时即挂接消费端（否则初始为断开状态）
    pub fn boundary(mut self, boundary: Arc<dyn ConsumerBoundary>) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn config(mut self, config: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn volume(mut self, volume: Arc<dyn VolumeSource>) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn foreground(mut self, foreground: Arc<dyn ForegroundController>) -> Self {
        self.foreground = Some(foreground);
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> (Pipeline, CaptureWorker, CaptureSender) {
        let config: Arc<dyn ConfigStore> = self
            .config
            .unwrap_or_else(|| Arc::new(MemoryConfigStore::default()));
        let volume: Arc<dyn VolumeSource> = self.volume.unwrap_or_else(|| Arc::new(FixedVolume::new(0, 0)));
        let foreground: Arc<dyn ForegroundController> = self
            .foreground
            .unwrap_or_else(|| Arc::new(ForegroundState::new(config.clone())));

        let link = Arc::new(ConsumerLink::new());
        if let Some(boundary) = self.boundary {
            link.attach(boundary);
        }

        let bridge = Arc::new(DispatchBridge::new(link.clone(), config.clone()));
        let cache = Arc::new(NotificationCache::new());
        let queue = Arc::new(DeliveryQueue::new(bridge.clone()));
        let (tx, rx) = capture_channel(self.capacity);

        let pipeline = Pipeline {
            cache: cache.clone(),
            queue: queue.clone(),
            bridge: bridge.clone(),
            invoker: ActionInvoker::new(cache.clone()),
            config: config.clone(),
            foreground: foreground.clone(),
            link,
        };
        let worker = CaptureWorker {
            rx,
            cache,
            queue,
            bridge,
            tracker: MediaStateTracker::new(volume),
            media_keys: HashMap::new(),
            config,
            foreground,
        };
        (pipeline, worker, tx)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 运行中管道的命令入口
#[derive(Clone)]
pub struct Pipeline {
    cache: Arc<NotificationCache>,
    queue: Arc<DeliveryQueue>,
    bridge: Arc<DispatchBridge>,
    invoker: ActionInvoker,
    config: Arc<dyn ConfigStore>,
    foreground: Arc<dyn ForegroundController>,
    link: Arc<ConsumerLink>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// 消费端启动完成：刷出暂存事件，之后直接投递
    pub fn initialization_complete(&self) -> usize {
        self.queue.mark_ready()
    }

    pub fn promote_foreground(&self, config: &PromoteConfig) -> bool {
        self.foreground.promote(config)
    }

    pub fn demote_background(&self) -> bool {
        self.foreground.demote()
    }

    pub fn is_service_running(&self) -> bool {
        self.foreground.is_running()
    }

    pub fn tap(&self, uid: &str) -> RelayResult<()> {
        self.invoker.tap(uid)
    }

    pub fn tap_action(&self, uid: &str, index: usize) -> RelayResult<()> {
        self.invoker.tap_action(uid, index)
    }

    pub fn send_input(&self, uid: &str, index: usize, fields: &ReplyInput) -> RelayResult<()> {
        self.invoker.send_input(uid, index, fields)
    }

    /// 事件载荷，序列化后的原生通知挂在 `raw` 下
    pub fn full_notification(&self, uid: &str) -> RelayResult<serde_json::Value> {
        self.cache.with_entry(uid, |entry| {
            entry.full_payload().unwrap_or_else(|e| {
                warn!(uid = %uid, error = %e, "Failed to serialize notification");
                serde_json::Value::Null
            })
        })
    }

    pub fn notification(&self, uid: &str) -> RelayResult<NotificationEvent> {
        self.cache.get(uid)
    }

    /// 保存新的回调句柄，下一次推送生效
    pub fn register_event_handles(&self, callback: i64, media_callback: i64) -> anyhow::Result<()> {
        self.config.register_event_handles(callback, media_callback)?;
        self.bridge.invalidate_handles();
        info!(callback, media_callback, "Event handles registered");
        Ok(())
    }

    pub fn register_dispatchers(&self, dispatcher: i64, media_dispatcher: i64) -> anyhow::Result<()> {
        self.config.register_dispatchers(dispatcher, media_dispatcher)?;
        info!(dispatcher, media_dispatcher, "Dispatcher handles registered");
        Ok(())
    }

    pub fn link(&self) -> &Arc<ConsumerLink> {
        &self.link
    }

    pub fn cache(&self) -> &NotificationCache {
        &self.cache
    }

    pub fn is_ready(&self) -> bool {
        self.queue.is_ready()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.pending_len()
    }
}

/// 消费采集通道，媒体跟踪器的唯一持有者
pub struct CaptureWorker {
    rx: CaptureReceiver,
    cache: Arc<NotificationCache>,
    queue: Arc<DeliveryQueue>,
    bridge: Arc<DispatchBridge>,
    tracker: MediaStateTracker,
    /// uid -> 通知发布时看到的会话快照
    media_keys: HashMap<String, SessionSnapshot>,
    config: Arc<dyn ConfigStore>,
    foreground: Arc<dyn ForegroundController>,
}

impl CaptureWorker {
    /// 运行直到所有 `CaptureSender` 被丢弃
    pub async fn run(mut self) {
        self.foreground.set_running(true);
        info!("Capture worker started");
        self.restore_promotion();

        while let Some(notice) = self.rx.recv().await {
            self.handle(notice);
        }

        self.foreground.set_running(false);
        info!("Capture worker stopped");
    }

    pub fn handle(&mut self, notice: CaptureNotice) {
        match notice {
            CaptureNotice::Posted(raw) => self.on_posted(raw),
            CaptureNotice::Removed(key) => {
                let uid = key.uid();
                if let Some(snapshot) = self.media_keys.remove(&uid) {
                    let transition = self.tracker.session_removed(&snapshot);
                    self.apply(transition);
                }
                let removed = self.cache.remove(&uid);
                debug!(uid = %uid, removed, "Notification removed");
            }
            CaptureNotice::SessionChanged { key, snapshot } => {
                debug!(key = %key, source = %snapshot.source, "Media session changed");
                let transition = self.tracker.extract(&snapshot);
                self.apply(transition);
            }
            CaptureNotice::SessionRemoved { key, snapshot } => {
                debug!(key = %key, source = %snapshot.source, "Media session removed");
                let transition = self.tracker.session_removed(&snapshot);
                self.apply(transition);
            }
        }
    }

    fn on_posted(&mut self, raw: RawNotification) {
        let uid = raw.uid();

        if let Some(snapshot) = raw.media_session.as_ref().filter(|s| s.is_active()) {
            self.media_keys.insert(uid.clone(), snapshot.clone());
            let transition = self.tracker.extract(snapshot);
            if self.apply(transition) {
                debug!(uid = %uid, "Media notification handled by tracker");
                return;
            }
        }

        let entry = CachedNotification::capture(raw);
        let event = entry.event().clone();
        if self.cache.upsert(entry) {
            debug!(uid = %uid, "Cached notification replaced");
        }
        if let Delivery::Queued(pending) = self.queue.enqueue_or_dispatch(event) {
            debug!(uid = %uid, pending, "Notification held until consumer is ready");
        }
    }

    /// 推送产出的曲目，返回是否有产出
    fn apply(&self, transition: Transition) -> bool {
        match transition {
            Transition::Emit(track) => {
                // 失败已由 bridge 记录
                let _ = self.bridge.send_track(&track);
                true
            }
            Transition::Suppressed(reason) => {
                debug!(?reason, "Media transition suppressed");
                false
            }
        }
    }

    fn restore_promotion(&self) {
        match self.config.load() {
            Ok(config) => {
                if let Some(promote) = config.promote.filter(|p| p.foreground) {
                    self.foreground.promote(&promote);
                }
            }
            Err(e) => warn!(error = %e, "Failed to read stored promotion settings"),
        }
    }
}
