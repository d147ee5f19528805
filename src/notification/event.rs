//! 通知事件 - 规范化后的通知数据
//!
//! `NotificationEvent` 是纯数据，跨越消费端边界的就是它。
//! 原生句柄留在 `CachedNotification` 中，不随事件序列化。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::capture::{NativeNotification, RawNotification};

/// 原生通知的稳定 uid：`<package>#<id>`
///
/// 同一条通知的发布和移除回调必须得到相同的 uid，不能掺入时间或顺序相关的内容
pub fn derive_uid(package_name: &str, id: i64) -> String {
    format!("{}#{}", package_name, id)
}

/// 通知上的一个动作按钮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInfo {
    pub label: String,
    #[serde(default)]
    pub supports_text_reply: bool,
}

impl ActionInfo {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            supports_text_reply: false,
        }
    }

    pub fn reply(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            supports_text_reply: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub uid: String,
    pub package_name: String,
    pub id: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// 原样透传
    #[serde(default)]
    pub extras: Map<String, Value>,
    #[serde(default)]
    pub actions: Vec<ActionInfo>,
}

impl NotificationEvent {
    pub fn from_raw(raw: &RawNotification) -> Self {
        Self {
            uid: raw.uid(),
            package_name: raw.package_name.clone(),
            id: raw.id,
            posted_at: raw.posted_at,
            title: raw.title.clone(),
            text: raw.text.clone(),
            extras: raw.extras.clone(),
            actions: raw.actions.clone(),
        }
    }

    /// `sink_event` 的推送载荷
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// 缓存条目：事件加上它独占的原生句柄
pub struct CachedNotification {
    event: NotificationEvent,
    handle: Box<dyn NativeNotification>,
}

impl CachedNotification {
    pub fn capture(raw: RawNotification) -> Self {
        let event = NotificationEvent::from_raw(&raw);
        Self {
            event,
            handle: raw.handle,
        }
    }

    pub fn event(&self) -> &NotificationEvent {
        &self.event
    }

    pub fn uid(&self) -> &str {
        &self.event.uid
    }

    pub fn handle(&self) -> &dyn NativeNotification {
        self.handle.as_ref()
    }

    /// 事件载荷，原生表示挂在 `raw` 下
    pub fn full_payload(&self) -> serde_json::Result<Value> {
        let mut payload = self.event.to_payload()?;
        if let Value::Object(map) = &mut payload {
            map.insert("raw".to_string(), self.handle.marshal());
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for CachedNotification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedNotification")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ReplyInput;
    use chrono::TimeZone;

    struct StubHandle;

    impl NativeNotification for StubHandle {
        fn send_content(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn send_action(&self, _index: usize, _reply: Option<&ReplyInput>) -> anyhow::Result<()> {
            Ok(())
        }

        fn reply_keys(&self, _index: usize) -> Option<Vec<String>> {
            None
        }

        fn marshal(&self) -> Value {
            serde_json::json!({"native": true})
        }
    }

    fn raw() -> RawNotification {
        let mut extras = Map::new();
        extras.insert("android.subText".to_string(), Value::from("work"));
        RawNotification::new("com.chat", 7, Box::new(StubHandle))
            .with_title("Alice")
            .with_text("lunch?")
            .with_posted_at(Utc.timestamp_millis_opt(1_700_000_000_000).unwrap())
            .with_extras(extras)
            .with_actions(vec![ActionInfo::new("Mark read"), ActionInfo::reply("Reply")])
    }

    #[test]
    fn test_uid_is_deterministic() {
        assert_eq!(derive_uid("pkg1", 1), "pkg1#1");
        assert_eq!(derive_uid("pkg1", 1), derive_uid("pkg1", 1));
        assert_ne!(derive_uid("pkg1", 1), derive_uid("pkg1", 2));
    }

    #[test]
    fn test_event_from_raw() {
        let event = NotificationEvent::from_raw(&raw());
        assert_eq!(event.uid, "com.chat#7");
        assert_eq!(event.title.as_deref(), Some("Alice"));
        assert_eq!(event.actions.len(), 2);
        assert!(event.actions[1].supports_text_reply);
    }

    #[test]
    fn test_payload_excludes_native_handle() {
        let event = NotificationEvent::from_raw(&raw());
        let payload = event.to_payload().unwrap();
        assert_eq!(payload["uid"], "com.chat#7");
        assert_eq!(payload["packageName"], "com.chat");
        assert_eq!(payload["postedAt"], 1_700_000_000_000i64);
        assert_eq!(payload["extras"]["android.subText"], "work");
        assert_eq!(payload["actions"][1]["supportsTextReply"], true);
        assert!(payload.get("raw").is_none());
    }

    #[test]
    fn test_full_payload_includes_native_handle() {
        let entry = CachedNotification::capture(raw());
        let payload = entry.full_payload().unwrap();
        assert_eq!(payload["raw"]["native"], true);
        assert_eq!(payload["uid"], "com.chat#7");
    }
}
