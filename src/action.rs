//! 动作回放 - 对缓存中的通知执行点击、动作按钮和文本回复
//!
//! 只持有缓存读锁，从不修改缓存，重试命令是安全的。

use std::sync::Arc;
use tracing::{debug, warn};

use crate::capture::ReplyInput;
use crate::error::{RelayError, RelayResult};
use crate::notification::{CachedNotification, NotificationCache};

#[derive(Clone)]
pub struct ActionInvoker {
    cache: Arc<NotificationCache>,
}

impl ActionInvoker {
    pub fn new(cache: Arc<NotificationCache>) -> Self {
        Self { cache }
    }

    /// 触发通知的主动作
    pub fn tap(&self, uid: &str) -> RelayResult<()> {
        debug!(uid = %uid, "Tap notification");
        let result = self.cache.with_entry(uid, |entry| {
            entry
                .handle()
                .send_content()
                .map_err(|e| RelayError::Invocation(e.to_string()))
        });
        log_outcome(uid, flatten(result))
    }

    /// 触发第 `index` 个动作按钮
    pub fn tap_action(&self, uid: &str, index: usize) -> RelayResult<()> {
        debug!(uid = %uid, index, "Tap notification action");
        let result = self.cache.with_entry(uid, |entry| {
            check_index(entry, index)?;
            entry
                .handle()
                .send_action(index, None)
                .map_err(|e| RelayError::Invocation(e.to_string()))
        });
        log_outcome(uid, flatten(result))
    }

    /// 用 `fields` 填充动作 `index` 的回复输入并触发
    ///
    /// 只发送名称与该动作输入 key 匹配的字段
    pub fn send_input(&self, uid: &str, index: usize, fields: &ReplyInput) -> RelayResult<()> {
        debug!(uid = %uid, index, fields = fields.len(), "Send notification input");
        let result = self.cache.with_entry(uid, |entry| {
            check_index(entry, index)?;

            let unsupported = || RelayError::UnsupportedAction {
                uid: uid.to_string(),
                index,
            };
            if !entry.event().actions[index].supports_text_reply {
                return Err(unsupported());
            }
            let keys = entry
                .handle()
                .reply_keys(index)
                .filter(|keys| !keys.is_empty())
                .ok_or_else(unsupported)?;

            let reply: ReplyInput = keys
                .iter()
                .filter_map(|key| fields.get(key).map(|value| (key.clone(), value.clone())))
                .collect();
            debug!(uid = %uid, index, matched = reply.len(), "Reply input assembled");

            entry
                .handle()
                .send_action(index, Some(&reply))
                .map_err(|e| RelayError::Invocation(e.to_string()))
        });
        log_outcome(uid, flatten(result))
    }
}

fn check_index(entry: &CachedNotification, index: usize) -> RelayResult<()> {
    let len = entry.event().actions.len();
    if index >= len {
        return Err(RelayError::IndexOutOfRange {
            uid: entry.uid().to_string(),
            index,
            len,
        });
    }
    Ok(())
}

fn flatten(result: RelayResult<RelayResult<()>>) -> RelayResult<()> {
    result.and_then(|inner| inner)
}

fn log_outcome(uid: &str, result: RelayResult<()>) -> RelayResult<()> {
    if let Err(e) = &result {
        warn!(uid = %uid, error = %e, "Action replay failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::recorded::{Invocation, InvocationLog, RecordedAction, RecordedHandle};
    use crate::capture::RawNotification;
    use crate::notification::ActionInfo;

    fn setup() -> (ActionInvoker, Arc<NotificationCache>, InvocationLog) {
        let log = InvocationLog::default();
        let cache = Arc::new(NotificationCache::new());
        let actions = vec![
            RecordedAction::new("Archive"),
            RecordedAction::with_reply("Reply", &["reply_text"]),
        ];
        let handle = RecordedHandle::new("chat#1", actions, serde_json::json!({}), log.clone());
        cache.upsert(CachedNotification::capture(
            RawNotification::new("chat", 1, Box::new(handle))
                .with_actions(vec![ActionInfo::new("Archive"), ActionInfo::reply("Reply")]),
        ));
        (ActionInvoker::new(cache.clone()), cache, log)
    }

    #[test]
    fn test_tap_missing_uid() {
        let (invoker, _, log) = setup();
        assert_eq!(invoker.tap("chat#2"), Err(RelayError::not_found("chat#2")));
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_tap_fires_content_and_is_repeatable() {
        let (invoker, _, log) = setup();
        invoker.tap("chat#1").unwrap();
        invoker.tap("chat#1").unwrap();
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0], Invocation::Content { uid: "chat#1".to_string() });
    }

    #[test]
    fn test_tap_action_out_of_range_leaves_cache_unchanged() {
        let (invoker, cache, log) = setup();
        let before = cache.get("chat#1").unwrap();

        assert_eq!(
            invoker.tap_action("chat#1", 2),
            Err(RelayError::IndexOutOfRange {
                uid: "chat#1".to_string(),
                index: 2,
                len: 2
            })
        );
        assert_eq!(cache.get("chat#1").unwrap(), before);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_send_input_on_plain_action_is_unsupported() {
        let (invoker, _, _) = setup();
        let fields = ReplyInput::from([("reply_text".to_string(), "hi".to_string())]);
        assert_eq!(
            invoker.send_input("chat#1", 0, &fields),
            Err(RelayError::UnsupportedAction {
                uid: "chat#1".to_string(),
                index: 0
            })
        );
    }

    #[test]
    fn test_send_input_keeps_only_known_fields() {
        let (invoker, _, log) = setup();
        let fields = ReplyInput::from([
            ("reply_text".to_string(), "on my way".to_string()),
            ("unrelated".to_string(), "x".to_string()),
        ]);
        invoker.send_input("chat#1", 1, &fields).unwrap();

        let expected = ReplyInput::from([("reply_text".to_string(), "on my way".to_string())]);
        assert_eq!(
            log.entries(),
            vec![Invocation::Action {
                uid: "chat#1".to_string(),
                index: 1,
                reply: Some(expected)
            }]
        );
    }
}
