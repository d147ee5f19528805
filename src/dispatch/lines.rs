//! 按行输出 JSON - 命令响应和推送共用

use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use super::{ConsumerBoundary, OutboundPush};
use crate::error::{RelayError, RelayResult};

/// 整行写出 JSON，一行不会被其他写入者打断
pub struct LineSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl LineSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn write_json(&self, value: &Value) -> std::io::Result<()> {
        let line = serde_json::to_string(value)?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

/// 以 JSON-RPC 通知形式推送：`{"jsonrpc":"2.0","method":"sink_event","params":[handle, payload]}`
pub struct JsonLineBoundary {
    sink: std::sync::Arc<LineSink>,
}

impl JsonLineBoundary {
    pub fn new(sink: std::sync::Arc<LineSink>) -> Self {
        Self { sink }
    }
}

impl ConsumerBoundary for JsonLineBoundary {
    fn name(&self) -> &str {
        "json-lines"
    }

    fn push(&self, push: &OutboundPush) -> RelayResult<()> {
        let message = json!({
            "jsonrpc": "2.0",
            "method": push.method.as_str(),
            "params": [push.handle, push.payload],
        });
        self.sink
            .write_json(&message)
            .map_err(|e| RelayError::TransportUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::PushMethod;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_push_written_as_jsonrpc_notification() {
        let buf = SharedBuf::default();
        let boundary = JsonLineBoundary::new(Arc::new(LineSink::new(Box::new(buf.clone()))));

        boundary
            .push(&OutboundPush {
                method: PushMethod::SinkMediaEvent,
                handle: 42,
                payload: json!({"id": "T:A:B"}),
            })
            .unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(text.ends_with('\n'));
        let value: Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["method"], "sink_media_event");
        assert_eq!(value["params"][0], 42);
        assert_eq!(value["params"][1]["id"], "T:A:B");
    }

    #[test]
    fn test_write_failure_maps_to_transport_unavailable() {
        let boundary = JsonLineBoundary::new(Arc::new(LineSink::new(Box::new(BrokenPipe))));
        let result = boundary.push(&OutboundPush {
            method: PushMethod::SinkEvent,
            handle: 1,
            payload: json!({}),
        });
        assert!(matches!(result, Err(RelayError::TransportUnavailable(_))));
    }
}
