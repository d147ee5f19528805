//! 命令服务器 - 按行读取 JSON-RPC 2.0 请求
//!
//! 每行一个请求。响应和推送共用同一个 `LineSink`，行与行不会交错。
//! `run` 期间挂接消费端，读到 EOF 后断开。

pub mod types;

pub use types::{RpcError, RpcRequest, RpcResponse};

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::capture::ReplyInput;
use crate::config::PromoteConfig;
use crate::dispatch::{JsonLineBoundary, LineSink};
use crate::error::{RelayError, RelayResult};
use crate::pipeline::Pipeline;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandlePair {
    callback: i64,
    media_callback: i64,
}

pub struct CommandServer {
    pipeline: Pipeline,
}

impl CommandServer {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// 持续服务直到 `reader` 读到 EOF
    pub async fn run<R>(&self, reader: R, out: Arc<LineSink>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.pipeline
            .link()
            .attach(Arc::new(JsonLineBoundary::new(out.clone())));
        info!("Command server started");

        let mut lines = reader.lines();
        let outcome = async {
            while let Some(line) = lines.next_line().await? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<RpcRequest>(line) {
                    Ok(request) => {
                        let response = self.handle_request(request);
                        out.write_json(&serde_json::to_value(&response)?)?;
                    }
                    Err(e) => warn!(error = %e, "Failed to parse request"),
                }
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        self.pipeline.link().detach();
        info!("Command server stopped");
        outcome
    }

    pub fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        debug!(method = %request.method, "Handling request");
        let params = request.params.unwrap_or(Value::Null);

        let result = match request.method.as_str() {
            "service.initialized" => {
                let flushed = self.pipeline.initialization_complete();
                debug!(flushed, "Consumer initialized");
                Ok(Value::Bool(true))
            }
            "service.promoteToForeground" => self.handle_promote(params),
            "service.demoteToBackground" => Ok(Value::Bool(self.pipeline.demote_background())),
            "service.tap" => parse::<(String,)>(params).map(|(uid,)| report(self.pipeline.tap(&uid))),
            "service.tap_action" => parse::<(String, usize)>(params)
                .map(|(uid, index)| report(self.pipeline.tap_action(&uid, index))),
            "service.send_input" => parse::<(String, usize, ReplyInput)>(params)
                .map(|(uid, index, fields)| report(self.pipeline.send_input(&uid, index, &fields))),
            "service.get_full_notification" => self.handle_full_notification(params),
            "plugin.registerEventHandle" => parse::<HandlePair>(params).and_then(|h| {
                self.pipeline
                    .register_event_handles(h.callback, h.media_callback)
                    .map(|_| Value::Bool(true))
                    .map_err(RpcError::internal)
            }),
            "plugin.initialize" => parse::<HandlePair>(params).and_then(|h| {
                self.pipeline
                    .register_dispatchers(h.callback, h.media_callback)
                    .map_err(RpcError::internal)?;
                // 消费端运行时（重新）启动：放行期间积压的事件
                let flushed = self.pipeline.initialization_complete();
                debug!(flushed, "Consumer runtime initialized");
                Ok(Value::Bool(true))
            }),
            "plugin.isServiceRunning" => Ok(Value::Bool(self.pipeline.is_service_running())),
            method => Err(RpcError::method_not_found(method)),
        };

        match result {
            Ok(value) => RpcResponse::success(request.id, value),
            Err(error) => RpcResponse::failure(request.id, error),
        }
    }

    /// 显式命令总是请求前台模式
    fn handle_promote(&self, params: Value) -> Result<Value, RpcError> {
        let mut config = if params.is_null() {
            PromoteConfig::default()
        } else {
            parse::<PromoteConfig>(params)?
        };
        config.foreground = true;
        Ok(Value::Bool(self.pipeline.promote_foreground(&config)))
    }

    fn handle_full_notification(&self, params: Value) -> Result<Value, RpcError> {
        let (uid,) = parse::<(String,)>(params)?;
        self.pipeline.full_notification(&uid).map_err(|e| match e {
            RelayError::NotFound { .. } => RpcError {
                code: types::NOT_FOUND,
                message: e.to_string(),
                data: Some(json!(e.code())),
            },
            other => RpcError::internal(other),
        })
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(RpcError::invalid_params)
}

/// 动作命令只返回 bool，失败原因仅记录日志
fn report(result: RelayResult<()>) -> Value {
    Value::Bool(result.is_ok())
}
