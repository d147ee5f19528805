//! 采集端 - 宿主通知和媒体子系统交给我们的数据
//!
//! 宿主回调从不直接进入分发路径，而是把 `CaptureNotice` 投递到有界通道，
//! 由管道的采集 worker 在独立任务上消费。

pub mod recorded;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use crate::media::SessionSnapshot;
use crate::notification::event::{derive_uid, ActionInfo};

/// 回复字段，按输入字段名索引
pub type ReplyInput = BTreeMap<String, String>;

/// 回放通知上用户动作所需的平台句柄
///
/// 只属于一个缓存条目，条目释放时随之释放
pub trait NativeNotification: Send + Sync {
    /// 触发通知的主（内容）动作
    fn send_content(&self) -> Result<()>;

    /// 触发动作 `index`，可附带回复输入
    fn send_action(&self, index: usize, reply: Option<&ReplyInput>) -> Result<()>;

    /// 动作 `index` 回复输入的结果 key，不接受文本时为 `None`
    fn reply_keys(&self, index: usize) -> Option<Vec<String>>;

    /// 完整的原生表示，由 `get_full_notification` 返回
    fn marshal(&self) -> Value;
}

/// 回调时观察到的已发布通知
pub struct RawNotification {
    pub package_name: String,
    pub id: i64,
    pub posted_at: DateTime<Utc>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub extras: Map<String, Value>,
    pub actions: Vec<ActionInfo>,
    /// 通知附带的媒体会话（如果有）
    pub media_session: Option<SessionSnapshot>,
    pub handle: Box<dyn NativeNotification>,
}

impl RawNotification {
    pub fn new(package_name: impl Into<String>, id: i64, handle: Box<dyn NativeNotification>) -> Self {
        Self {
            package_name: package_name.into(),
            id,
            posted_at: Utc::now(),
            title: None,
            text: None,
            extras: Map::new(),
            actions: Vec::new(),
            media_session: None,
            handle,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_posted_at(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = posted_at;
        self
    }

    pub fn with_extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_actions(mut self, actions: Vec<ActionInfo>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_media_session(mut self, snapshot: SessionSnapshot) -> Self {
        self.media_session = Some(snapshot);
        self
    }

    pub fn uid(&self) -> String {
        derive_uid(&self.package_name, self.id)
    }
}

impl std::fmt::Debug for RawNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawNotification")
            .field("package_name", &self.package_name)
            .field("id", &self.id)
            .field("title", &self.title)
            .field("actions", &self.actions.len())
            .field("media_session", &self.media_session.is_some())
            .finish()
    }
}

/// 被移除通知的标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationKey {
    pub package_name: String,
    pub id: i64,
}

impl NotificationKey {
    pub fn new(package_name: impl Into<String>, id: i64) -> Self {
        Self {
            package_name: package_name.into(),
            id,
        }
    }

    pub fn uid(&self) -> String {
        derive_uid(&self.package_name, self.id)
    }
}

/// 一次宿主回调
#[derive(Debug)]
pub enum CaptureNotice {
    Posted(RawNotification),
    Removed(NotificationKey),
    SessionChanged { key: String, snapshot: SessionSnapshot },
    SessionRemoved { key: String, snapshot: SessionSnapshot },
}

pub type CaptureReceiver = mpsc::Receiver<CaptureNotice>;

/// 采集通道的生产端，克隆给每个宿主回调
#[derive(Clone)]
pub struct CaptureSender {
    tx: mpsc::Sender<CaptureNotice>,
}

impl CaptureSender {
    /// 从异步代码投递，通道满时等待而不是丢弃
    pub async fn post(&self, notice: CaptureNotice) -> Result<()> {
        self.tx
            .send(notice)
            .await
            .map_err(|_| anyhow!("capture worker has stopped"))
    }

    /// 从宿主回调线程投递，不能在运行时内部调用
    pub fn post_blocking(&self, notice: CaptureNotice) -> Result<()> {
        self.tx
            .blocking_send(notice)
            .map_err(|_| anyhow!("capture worker has stopped"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 宿主回调与采集 worker 之间的有界通道
pub fn capture_channel(capacity: usize) -> (CaptureSender, CaptureReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CaptureSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct NoopHandle;

    impl NativeNotification for NoopHandle {
        fn send_content(&self) -> Result<()> {
            Ok(())
        }

        fn send_action(&self, _index: usize, _reply: Option<&ReplyInput>) -> Result<()> {
            Ok(())
        }

        fn reply_keys(&self, _index: usize) -> Option<Vec<String>> {
            None
        }

        fn marshal(&self) -> Value {
            Value::Null
        }
    }

    #[test]
    fn test_raw_notification_uid_matches_removal_key() {
        let raw = RawNotification::new("com.chat", 42, Box::new(NoopHandle)).with_title("hi");
        let key = NotificationKey::new("com.chat", 42);
        assert_eq!(raw.uid(), key.uid());
        assert_eq!(raw.title.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_capture_channel_preserves_order() {
        let (tx, mut rx) = capture_channel(4);
        tx.post(CaptureNotice::Removed(NotificationKey::new("a", 1))).await.unwrap();
        tx.post(CaptureNotice::Removed(NotificationKey::new("a", 2))).await.unwrap();
        drop(tx);

        let mut ids = Vec::new();
        while let Some(notice) = rx.recv().await {
            if let CaptureNotice::Removed(key) = notice {
                ids.push(key.id);
            }
        }
        assert_eq!(ids, vec![1, 2]);
    }

    fn removed_id(notice: Option<CaptureNotice>) -> Option<i64> {
        match notice {
            Some(CaptureNotice::Removed(key)) => Some(key.id),
            _ => None,
        }
    }

    #[test]
    fn test_post_blocking_waits_for_room() {
        let (tx, mut rx) = capture_channel(1);
        tx.post_blocking(CaptureNotice::Removed(NotificationKey::new("a", 1))).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let producer = {
            let tx = tx.clone();
            std::thread::spawn(move || {
                tx.post_blocking(CaptureNotice::Removed(NotificationKey::new("a", 2))).unwrap();
                done_tx.send(()).unwrap();
            })
        };

        // 通道已满：第二次投递被挂起而不是丢弃
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

        assert_eq!(removed_id(rx.blocking_recv()), Some(1));
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(removed_id(rx.blocking_recv()), Some(2));
        producer.join().unwrap();
    }

    #[tokio::test]
    async fn test_post_fails_after_worker_stops() {
        let (tx, rx) = capture_channel(1);
        drop(rx);
        assert!(tx.is_closed());
        assert!(tx.post(CaptureNotice::Removed(NotificationKey::new("a", 1))).await.is_err());
    }
}
