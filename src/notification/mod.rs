//! 通知路径 - 事件模型、通知缓存、带就绪门控的投递队列
//!
//! ```text
//! posted ──▶ NotificationEvent ──▶ NotificationCache (upsert)
//!                    │
//!                    └──────────▶ DeliveryQueue ──▶ EventSink (DispatchBridge)
//! removed ─────────────────────▶ NotificationCache (remove)
//! ```

pub mod cache;
pub mod event;
pub mod queue;

pub use cache::NotificationCache;
pub use event::{derive_uid, ActionInfo, CachedNotification, NotificationEvent};
pub use queue::{Delivery, DeliveryQueue, EventSink};
