//! 通知缓存 - 按 uid 保存存活的通知
//!
//! 整个 map 由一把 `RwLock` 保护。只有收到移除通知才删除条目，没有 TTL 也没有容量上限。

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::event::{CachedNotification, NotificationEvent};
use crate::error::{RelayError, RelayResult};

#[derive(Default)]
pub struct NotificationCache {
    entries: RwLock<HashMap<String, CachedNotification>>,
}

impl NotificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按 uid 插入或覆盖，替换了旧条目时返回 true
    pub fn upsert(&self, entry: CachedNotification) -> bool {
        let uid = entry.uid().to_string();
        let replaced = self.write().insert(uid.clone(), entry).is_some();
        debug!(uid = %uid, replaced, "Notification cached");
        replaced
    }

    /// 按 uid 移除。uid 不存在也没关系，重复的移除通知是正常的
    pub fn remove(&self, uid: &str) -> bool {
        // 在锁外释放条目（及其原生句柄）
        let removed = self.write().remove(uid);
        debug!(uid = %uid, found = removed.is_some(), "Notification removed");
        removed.is_some()
    }

    pub fn get(&self, uid: &str) -> RelayResult<NotificationEvent> {
        self.with_entry(uid, |entry| entry.event().clone())
    }

    /// 在读锁下对条目执行 `f`
    pub fn with_entry<R>(&self, uid: &str, f: impl FnOnce(&CachedNotification) -> R) -> RelayResult<R> {
        let entries = self.read();
        let entry = entries.get(uid).ok_or_else(|| RelayError::not_found(uid))?;
        Ok(f(entry))
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.read().contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CachedNotification>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedNotification>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
