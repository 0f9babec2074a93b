//! 注册参数的解析
//!
//! `on`/`once`/`listen_to` 接受多种形态：单个事件名、以空白分隔的多个事件名、
//! 事件名到回调的映射。这些形态在 API 边界处一次性解析为有序的
//! `(事件名, 回调, 上下文)` 三元组，后续注册逻辑只面对这一种规范形式。
//!
use crate::callback::{Callback, Context};

/// 将事件名字符串拆分为单个事件名（任意空白分隔，忽略空片段）
pub(crate) fn split_names(names: &str) -> impl Iterator<Item = &str> {
    names.split_whitespace()
}

/// 事件映射：事件名（可含空白分隔的多个事件名）到回调，保持插入顺序
#[derive(Clone, Debug, Default)]
pub struct EventMap {
    entries: Vec<(String, Callback)>,
}

impl EventMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式追加一项
    pub fn with(mut self, names: impl Into<String>, callback: &Callback) -> Self {
        self.insert(names, callback);
        self
    }

    pub fn insert(&mut self, names: impl Into<String>, callback: &Callback) {
        self.entries.push((names.into(), callback.clone()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Callback)> {
        self.entries.iter().map(|(names, cb)| (names.as_str(), cb))
    }
}

impl<S: Into<String>> FromIterator<(S, Callback)> for EventMap {
    fn from_iter<I: IntoIterator<Item = (S, Callback)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(names, cb)| (names.into(), cb))
                .collect(),
        }
    }
}

/// 注册参数的标签联合
#[derive(Clone, Debug)]
pub enum Bindings {
    /// 单个或空白分隔的多个事件名，共用一个回调；回调缺省时不注册任何记录
    Names {
        names: String,
        callback: Option<Callback>,
    },
    /// 事件映射，尾随的上下文作用于映射中的每一项
    Map(EventMap),
}

impl Bindings {
    /// 解析为规范三元组序列
    pub(crate) fn parse(self, context: Option<&Context>) -> Vec<Binding> {
        let pairs: Vec<(String, Callback)> = match self {
            Bindings::Names {
                callback: None, ..
            } => return Vec::new(),
            Bindings::Names {
                names,
                callback: Some(callback),
            } => vec![(names, callback)],
            Bindings::Map(map) => map.entries,
        };

        pairs
            .iter()
            .flat_map(|(names, callback)| {
                split_names(names).map(move |name| Binding {
                    name: name.to_string(),
                    callback: callback.clone(),
                    context: context.cloned(),
                })
            })
            .collect()
    }
}

impl From<(&str, Callback)> for Bindings {
    fn from((names, callback): (&str, Callback)) -> Self {
        Bindings::Names {
            names: names.to_string(),
            callback: Some(callback),
        }
    }
}

impl From<(&str, &Callback)> for Bindings {
    fn from((names, callback): (&str, &Callback)) -> Self {
        Bindings::from((names, callback.clone()))
    }
}

impl From<(&str, Option<Callback>)> for Bindings {
    fn from((names, callback): (&str, Option<Callback>)) -> Self {
        Bindings::Names {
            names: names.to_string(),
            callback,
        }
    }
}

impl From<(String, Callback)> for Bindings {
    fn from((names, callback): (String, Callback)) -> Self {
        Bindings::Names {
            names,
            callback: Some(callback),
        }
    }
}

impl From<EventMap> for Bindings {
    fn from(map: EventMap) -> Self {
        Bindings::Map(map)
    }
}

/// 规范化后的单条注册
#[derive(Clone, Debug)]
pub(crate) struct Binding {
    pub(crate) name: String,
    pub(crate) callback: Callback,
    pub(crate) context: Option<Context>,
}
