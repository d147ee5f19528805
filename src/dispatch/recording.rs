//! 内存消费端 - 记录每次推送供之后检查
//!
//! 用于测试，以及轮询而非接收回调的嵌入方。

use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{ConsumerBoundary, OutboundPush, PushMethod};
use crate::error::{RelayError, RelayResult};

pub struct RecordingBoundary {
    pushes: Mutex<Vec<OutboundPush>>,
    available: AtomicBool,
    attempts: AtomicUsize,
}

impl Default for RecordingBoundary {
    fn default() -> Self {
        Self {
            pushes: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            attempts: AtomicUsize::new(0),
        }
    }
}

impl RecordingBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟消费端离开或回来
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn pushes(&self) -> Vec<OutboundPush> {
        self.pushes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `sink_event` 推送的载荷，按投递顺序
    pub fn events(&self) -> Vec<Value> {
        self.payloads(PushMethod::SinkEvent)
    }

    /// `sink_media_event` 推送的载荷，按投递顺序
    pub fn tracks(&self) -> Vec<Value> {
        self.payloads(PushMethod::SinkMediaEvent)
    }

    /// 已投递通知事件的 uid
    pub fn event_uids(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|p| p["uid"].as_str().map(str::to_string))
            .collect()
    }

    /// 推送尝试次数，包括被拒绝的
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn payloads(&self, method: PushMethod) -> Vec<Value> {
        self.pushes()
            .into_iter()
            .filter(|p| p.method == method)
            .map(|p| p.payload)
            .collect()
    }
}

impl ConsumerBoundary for RecordingBoundary {
    fn name(&self) -> &str {
        "recording"
    }

    fn push(&self, push: &OutboundPush) -> RelayResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(RelayError::TransportUnavailable("consumer detached".to_string()));
        }
        self.pushes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(push.clone());
        Ok(())
    }
}
