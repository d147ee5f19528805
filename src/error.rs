//! 中继管道的错误类型
//!
//! 都不是致命错误：查找失败返回给调用方，投递失败记录日志后丢弃事件。

use thiserror::Error;

/// 分发所需的出站句柄类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Event,
    Media,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleKind::Event => write!(f, "event"),
            HandleKind::Media => write!(f, "media"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    /// uid 不在缓存中
    #[error("notification not found: {uid}")]
    NotFound { uid: String },

    /// 动作索引超出通知的动作数量
    #[error("action index {index} out of range for {uid} ({len} actions)")]
    IndexOutOfRange { uid: String, index: usize, len: usize },

    /// 对没有回复输入的动作请求文本回复
    #[error("action {index} of {uid} does not accept text input")]
    UnsupportedAction { uid: String, index: usize },

    /// 分发句柄从未注册
    #[error("no {kind} callback handle registered")]
    MisconfiguredHandle { kind: HandleKind },

    /// 消费端未挂接或拒绝了推送
    #[error("consumer unavailable: {0}")]
    TransportUnavailable(String),

    /// 原生句柄触发失败
    #[error("invocation failed: {0}")]
    Invocation(String),
}

impl RelayError {
    pub fn not_found(uid: impl Into<String>) -> Self {
        RelayError::NotFound { uid: uid.into() }
    }

    /// 命令接口上使用的稳定短码
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::NotFound { .. } => "notFound",
            RelayError::IndexOutOfRange { .. } => "indexOutOfRange",
            RelayError::UnsupportedAction { .. } => "unsupportedAction",
            RelayError::MisconfiguredHandle { .. } => "misconfiguredHandle",
            RelayError::TransportUnavailable(_) => "transportUnavailable",
            RelayError::Invocation(_) => "invocationFailed",
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
