//! 投递队列 - 消费端就绪前暂存通知事件
//!
//! 就绪标志和待发缓冲共用一把 mutex，分发也在持锁期间进行。
//! `mark_ready` 的先排空再切换与 `enqueue_or_dispatch` 的追加或分发不会交错，
//! 消费端在切换前后看到的是同一个到达顺序。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::event::NotificationEvent;

/// 就绪队列的事件去向。不能阻塞，投递失败时不能 panic
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &NotificationEvent);
}

/// 入队事件的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// 已暂存，值为追加后的待发数量
    Queued(usize),
    Dispatched,
}

#[derive(Default)]
struct QueueState {
    ready: bool,
    pending: VecDeque<NotificationEvent>,
}

pub struct DeliveryQueue {
    state: Mutex<QueueState>,
    sink: Arc<dyn EventSink>,
}

impl DeliveryQueue {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            sink,
        }
    }

    pub fn enqueue_or_dispatch(&self, event: NotificationEvent) -> Delivery {
        let mut state = self.lock();
        if !state.ready {
            state.pending.push_back(event);
            debug!(pending = state.pending.len(), "Consumer not ready, event queued");
            return Delivery::Queued(state.pending.len());
        }

        debug!(uid = %event.uid, "Dispatching event immediately");
        self.sink.deliver(&event);
        Delivery::Dispatched
    }

    /// 按到达顺序排空待发事件，然后切换为就绪
    ///
    /// 返回刷出的事件数，已就绪时返回 0
    pub fn mark_ready(&self) -> usize {
        let mut state = self.lock();
        let mut flushed = 0;
        while let Some(event) = state.pending.pop_front() {
            self.sink.deliver(&event);
            flushed += 1;
        }
        if !state.ready {
            info!(flushed, "Consumer ready, queue drained");
        }
        state.ready = true;
        flushed
    }

    pub fn is_ready(&self) -> bool {
        self.lock().ready
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
