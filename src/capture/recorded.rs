//! 录制的采集数据
//!
//! 宿主回调的 JSON-lines 形式，每行一条通知。回放时与实时回调一样驱动管道，
//! 对通知的点击记录到 `InvocationLog`，而不是发出平台 intent。
//!
//! ```text
//! {"kind":"posted","packageName":"com.chat","id":1,"title":"Alice","actions":[{"label":"Reply","replyKeys":["text"]}]}
//! {"kind":"removed","packageName":"com.chat","id":1}
//! {"kind":"session_changed","key":"player","snapshot":{"source":"com.player","playback":{"state":3}}}
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::{CaptureNotice, CaptureSender, NativeNotification, NotificationKey, RawNotification, ReplyInput};
use crate::media::SessionSnapshot;
use crate::notification::event::{derive_uid, ActionInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAction {
    pub label: String,
    /// 回复输入 key，普通按钮为空
    #[serde(default)]
    pub reply_keys: Vec<String>,
}

impl RecordedAction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reply_keys: Vec::new(),
        }
    }

    pub fn with_reply(label: impl Into<String>, keys: &[&str]) -> Self {
        Self {
            label: label.into(),
            reply_keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn info(&self) -> ActionInfo {
        ActionInfo {
            label: self.label.clone(),
            supports_text_reply: !self.reply_keys.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedNotification {
    pub package_name: String,
    pub id: i64,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub extras: Map<String, Value>,
    #[serde(default)]
    pub actions: Vec<RecordedAction>,
    #[serde(default)]
    pub media_session: Option<SessionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedNotice {
    Posted(RecordedNotification),
    #[serde(rename_all = "camelCase")]
    Removed { package_name: String, id: i64 },
    SessionChanged { key: String, snapshot: SessionSnapshot },
    SessionRemoved { key: String, snapshot: SessionSnapshot },
}

impl RecordedNotice {
    pub fn into_notice(self, log: &InvocationLog) -> CaptureNotice {
        match self {
            RecordedNotice::Posted(recorded) => {
                let raw_json = serde_json::to_value(&recorded).unwrap_or(Value::Null);
                let handle = RecordedHandle::new(
                    derive_uid(&recorded.package_name, recorded.id),
                    recorded.actions.clone(),
                    raw_json,
                    log.clone(),
                );
                let mut raw = RawNotification::new(recorded.package_name, recorded.id, Box::new(handle))
                    .with_extras(recorded.extras)
                    .with_actions(recorded.actions.iter().map(RecordedAction::info).collect());
                raw.title = recorded.title;
                raw.text = recorded.text;
                raw.media_session = recorded.media_session;
                if let Some(posted_at) = recorded.posted_at {
                    raw.posted_at = posted_at;
                }
                CaptureNotice::Posted(raw)
            }
            RecordedNotice::Removed { package_name, id } => {
                CaptureNotice::Removed(NotificationKey::new(package_name, id))
            }
            RecordedNotice::SessionChanged { key, snapshot } => CaptureNotice::SessionChanged { key, snapshot },
            RecordedNotice::SessionRemoved { key, snapshot } => CaptureNotice::SessionRemoved { key, snapshot },
        }
    }
}

/// 一次回放的用户动作
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Content { uid: String },
    Action { uid: String, index: usize, reply: Option<ReplyInput> },
}

/// 所有录制句柄共享的调用日志
#[derive(Clone, Default)]
pub struct InvocationLog {
    entries: Arc<Mutex<Vec<Invocation>>>,
}

impl InvocationLog {
    pub fn entries(&self) -> Vec<Invocation> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, invocation: Invocation) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation);
    }
}

/// 基于录制通知的原生句柄
pub struct RecordedHandle {
    uid: String,
    actions: Vec<RecordedAction>,
    raw: Value,
    log: InvocationLog,
}

impl RecordedHandle {
    pub fn new(uid: impl Into<String>, actions: Vec<RecordedAction>, raw: Value, log: InvocationLog) -> Self {
        Self {
            uid: uid.into(),
            actions,
            raw,
            log,
        }
    }
}

impl NativeNotification for RecordedHandle {
    fn send_content(&self) -> Result<()> {
        info!(uid = %self.uid, "Content intent sent");
        self.log.record(Invocation::Content {
            uid: self.uid.clone(),
        });
        Ok(())
    }

    fn send_action(&self, index: usize, reply: Option<&ReplyInput>) -> Result<()> {
        let action = self
            .actions
            .get(index)
            .with_context(|| format!("{} has no action {}", self.uid, index))?;
        info!(uid = %self.uid, action = %action.label, with_reply = reply.is_some(), "Action intent sent");
        self.log.record(Invocation::Action {
            uid: self.uid.clone(),
            index,
            reply: reply.cloned(),
        });
        Ok(())
    }

    fn reply_keys(&self, index: usize) -> Option<Vec<String>> {
        self.actions
            .get(index)
            .filter(|a| !a.reply_keys.is_empty())
            .map(|a| a.reply_keys.clone())
    }

    fn marshal(&self) -> Value {
        self.raw.clone()
    }
}

/// 把 JSON-lines 数据文件回放到采集通道
///
/// 格式错误的行记录日志后跳过，返回投递的通知数
pub async fn replay_feed(path: &Path, sender: &CaptureSender, log: &InvocationLog) -> Result<usize> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open feed {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut posted = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RecordedNotice>(line) {
            Ok(notice) => {
                sender.post(notice.into_notice(log)).await?;
                posted += 1;
            }
            Err(e) => warn!(error = %e, "Skipping malformed feed line"),
        }
    }

    debug!(posted, feed = %path.display(), "Feed replayed");
    Ok(posted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::capture_channel;

    #[test]
    fn test_parse_posted_notice() {
        let line = r#"{"kind":"posted","packageName":"com.chat","id":1,"title":"Alice","actions":[{"label":"Reply","replyKeys":["text"]},{"label":"Mute"}]}"#;
        let notice: RecordedNotice = serde_json::from_str(line).unwrap();
        let CaptureNotice::Posted(raw) = notice.into_notice(&InvocationLog::default()) else {
            panic!("expected posted notice");
        };
        assert_eq!(raw.uid(), "com.chat#1");
        assert_eq!(raw.title.as_deref(), Some("Alice"));
        assert!(raw.actions[0].supports_text_reply);
        assert!(!raw.actions[1].supports_text_reply);
        assert_eq!(raw.handle.reply_keys(0), Some(vec!["text".to_string()]));
        assert_eq!(raw.handle.reply_keys(1), None);
        assert_eq!(raw.handle.marshal()["packageName"], "com.chat");
    }

    #[test]
    fn test_parse_removed_and_session_notices() {
        let removed: RecordedNotice =
            serde_json::from_str(r#"{"kind":"removed","packageName":"com.chat","id":1}"#).unwrap();
        assert_eq!(
            removed,
            RecordedNotice::Removed {
                package_name: "com.chat".to_string(),
                id: 1
            }
        );

        let changed: RecordedNotice = serde_json::from_str(
            r#"{"kind":"session_changed","key":"p","snapshot":{"source":"com.player","playback":{"state":3}}}"#,
        )
        .unwrap();
        assert!(matches!(changed, RecordedNotice::SessionChanged { .. }));
    }

    #[test]
    fn test_send_action_out_of_range_fails() {
        let handle = RecordedHandle::new("a#1", vec![], Value::Null, InvocationLog::default());
        assert!(handle.send_action(0, None).is_err());
    }

    #[tokio::test]
    async fn test_replay_feed_skips_bad_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("feed.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"kind":"posted","packageName":"a","id":1}"#,
                "\n\nnot json\n",
                r#"{"kind":"removed","packageName":"a","id":1}"#,
                "\n"
            ),
        )
        .unwrap();

        let (tx, mut rx) = capture_channel(8);
        let posted = replay_feed(&path, &tx, &InvocationLog::default()).await.unwrap();
        drop(tx);

        assert_eq!(posted, 2);
        assert!(matches!(rx.recv().await, Some(CaptureNotice::Posted(_))));
        assert!(matches!(rx.recv().await, Some(CaptureNotice::Removed(_))));
        assert!(rx.recv().await.is_none());
    }
}
