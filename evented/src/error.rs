//! 事件核心统一错误定义
//!
//! 核心本身几乎不产生错误：空注册、未命中的注销、无人监听的触发均为静默空操作。
//! 这里的错误主要来自处理器：处理器返回的错误会原样沿 `trigger` 向上传播。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    // --- 处理器 ---
    #[error("event handler error: event={event}, reason={reason}")]
    Handler { event: String, reason: String },

    // --- 调用参数/接收者 ---
    #[error("missing argument: event={event}, index={index}")]
    MissingArgument { event: String, index: usize },
    #[error("receiver mismatch: event={event}, expected={expected}")]
    ReceiverMismatch {
        event: String,
        expected: &'static str,
    },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl EventError {
    /// 处理器主动失败时的便捷构造
    pub fn handler(event: impl Into<String>, reason: impl Into<String>) -> Self {
        EventError::Handler {
            event: event.into(),
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;
