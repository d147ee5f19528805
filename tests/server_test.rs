//! 命令服务器测试 - 使用内存中的 stdio 管道

use serde_json::{json, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};

use notification_relay::capture::recorded::{InvocationLog, RecordedAction, RecordedHandle};
use notification_relay::{
    ActionInfo, CaptureNotice, CommandServer, ConfigStore, LineSink, MemoryConfigStore, Pipeline, RawNotification,
};

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

impl SharedBuf {
    fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

fn request(id: i64, method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}).to_string()
}

#[tokio::test]
async fn test_stdio_session_flushes_and_answers() {
    // Given: 消费端出现前已采集一条通知
    let config = Arc::new(MemoryConfigStore::with_handles(5, 6));
    let (pipeline, mut worker, _tx) = Pipeline::builder().config(config.clone()).build();
    let log = InvocationLog::default();
    let handle = RecordedHandle::new("chat#1", vec![RecordedAction::new("Open")], json!({"k": 1}), log.clone());
    worker.handle(CaptureNotice::Posted(
        RawNotification::new("chat", 1, Box::new(handle))
            .with_title("Alice")
            .with_actions(vec![ActionInfo::new("Open")]),
    ));

    // When: 消费端连接、初始化并发出命令
    let input = [
        request(1, "service.initialized", Value::Null),
        request(2, "service.tap_action", json!(["chat#1", 0])),
        "garbage".to_string(),
        request(3, "service.get_full_notification", json!(["chat#1"])),
        request(4, "plugin.registerEventHandle", json!({"callback": 7, "mediaCallback": 8})),
        request(5, "service.unknown", Value::Null),
    ]
    .join("\n");
    let buf = SharedBuf::default();
    let server = CommandServer::new(pipeline.clone());
    server
        .run(input.as_bytes(), Arc::new(LineSink::new(Box::new(buf.clone()))))
        .await
        .unwrap();

    // Then: 暂存事件在第一个响应之前推送
    let lines = buf.lines();
    assert_eq!(lines[0]["method"], "sink_event");
    assert_eq!(lines[0]["params"][0], 5);
    assert_eq!(lines[0]["params"][1]["uid"], "chat#1");
    assert_eq!(lines[1]["id"], 1);
    assert_eq!(lines[1]["result"], true);

    // And: 命令按顺序应答，无效行被跳过
    assert_eq!(lines[2]["result"], true);
    assert_eq!(lines[3]["result"]["raw"]["k"], 1);
    assert_eq!(lines[3]["result"]["title"], "Alice");
    assert_eq!(lines[4]["result"], true);
    assert_eq!(lines[5]["error"]["code"], -32601);
    assert_eq!(lines.len(), 6);

    assert_eq!(log.entries().len(), 1);
    assert_eq!(config.load().unwrap().callback_handle, 7);
    assert!(!pipeline.link().is_attached());
}

#[tokio::test]
async fn test_pushes_after_eof_are_dropped() {
    // Given: 会话已结束
    let (pipeline, mut worker, _tx) = Pipeline::builder()
        .config(Arc::new(MemoryConfigStore::with_handles(1, 2)))
        .build();
    let buf = SharedBuf::default();
    let server = CommandServer::new(pipeline.clone());
    let input = request(1, "service.initialized", Value::Null);
    server
        .run(input.as_bytes(), Arc::new(LineSink::new(Box::new(buf.clone()))))
        .await
        .unwrap();

    // When: 之后到达一条通知
    let handle = RecordedHandle::new("a#1", vec![], Value::Null, InvocationLog::default());
    worker.handle(CaptureNotice::Posted(RawNotification::new("a", 1, Box::new(handle))));

    // Then: 不再写出任何内容，但通知仍在缓存中
    assert_eq!(buf.lines().len(), 1);
    assert!(pipeline.cache().contains("a#1"));
}
