//! 发射器配置
//!
use bon::Builder;
use serde::{Deserialize, Serialize};

/// 默认通配事件名
pub const DEFAULT_WILDCARD: &str = "all";

/// 发射器配置
#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// 通配通道的事件名：在此名下注册的处理器接收每一次触发
    #[builder(into, default = DEFAULT_WILDCARD.to_string())]
    wildcard: String,
}

impl EventsConfig {
    pub fn wildcard(&self) -> &str {
        &self.wildcard
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            wildcard: DEFAULT_WILDCARD.to_string(),
        }
    }
}
