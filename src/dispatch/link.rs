//! 可挂接的消费端插槽
//!
//! 消费端会来来去去（冷启动、重启）。未挂接时每次推送都以 `TransportUnavailable` 失败，
//! 采集和缓存照常进行。

use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use super::{ConsumerBoundary, OutboundPush};
use crate::error::{RelayError, RelayResult};

#[derive(Default)]
pub struct ConsumerLink {
    current: RwLock<Option<Arc<dyn ConsumerBoundary>>>,
}

impl ConsumerLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, boundary: Arc<dyn ConsumerBoundary>) {
        info!(boundary = boundary.name(), "Consumer attached");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(boundary);
    }

    pub fn detach(&self) {
        let previous = self.current.write().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(boundary) = previous {
            info!(boundary = boundary.name(), "Consumer detached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.current.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl ConsumerBoundary for ConsumerLink {
    fn name(&self) -> &str {
        "link"
    }

    fn push(&self, push: &OutboundPush) -> RelayResult<()> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner).clone();
        match current {
            Some(boundary) => boundary.push(push),
            None => Err(RelayError::TransportUnavailable("no consumer attached".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{PushMethod, RecordingBoundary};

    fn push() -> OutboundPush {
        OutboundPush {
            method: PushMethod::SinkEvent,
            handle: 1,
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn test_detached_link_refuses_push() {
        let link = ConsumerLink::new();
        assert!(!link.is_attached());
        assert!(matches!(link.push(&push()), Err(RelayError::TransportUnavailable(_))));
    }

    #[test]
    fn test_reattach_resumes_delivery() {
        let link = ConsumerLink::new();
        let first = Arc::new(RecordingBoundary::new());
        let second = Arc::new(RecordingBoundary::new());

        link.attach(first.clone());
        link.push(&push()).unwrap();
        link.detach();
        assert!(link.push(&push()).is_err());
        link.attach(second.clone());
        link.push(&push()).unwrap();

        assert_eq!(first.pushes().len(), 1);
        assert_eq!(second.pushes().len(), 1);
    }
}
