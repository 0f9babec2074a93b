//! 回调、上下文与调用信息
//!
//! - `Callback`：处理器句柄，克隆后仍是“同一个”回调（按分配身份比较）；
//! - `Context`：可选的接收者，按稳定的键比较身份，处理器可向下转型取回具体类型；
//! - `Invocation`：一次调用时传给处理器的事件名、参数与上下文。
//!
use crate::emitter::{Events, WeakEvents};
use crate::error::{EventError, EventResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// 处理器函数签名
pub type HandlerFn = dyn Fn(&Invocation<'_>) -> EventResult<()> + Send + Sync;

/// 事件回调
///
/// 注销时按身份匹配：同一次 `Callback::new` 得到的句柄及其克隆视为同一回调，
/// 即便两个闭包的代码完全相同，分别创建的句柄也互不相等。
#[derive(Clone)]
pub struct Callback(Arc<HandlerFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> EventResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// 是否为同一回调
    pub fn same(&self, other: &Callback) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }

    pub(crate) fn call(&self, invocation: &Invocation<'_>) -> EventResult<()> {
        (self.0)(invocation)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&Arc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// 回调的接收者（调用时绑定的上下文）
///
/// 身份由 `key` 决定：`Context::new` 以自身分配地址为键；
/// 发射器的接收者以发射器核心的地址为键，保证同一对象始终得到同一身份。
#[derive(Clone)]
pub struct Context {
    key: usize,
    value: Arc<dyn Any + Send + Sync>,
    // 以发射器为身份时持有其弱引用，记录存活期间该地址不会被新发射器复用
    anchor: Option<WeakEvents>,
}

impl Context {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// 复用已有的 `Arc`，身份即该分配
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        let key = Arc::as_ptr(&value).cast::<()>() as usize;
        Self {
            key,
            value,
            anchor: None,
        }
    }

    /// 仅按键构造，不持有发射器（用于发射器析构时匹配自身的注册）
    pub(crate) fn keyed(key: usize, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            key,
            value,
            anchor: None,
        }
    }

    /// 以发射器为身份
    pub(crate) fn anchored(events: &Events, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            key: events.key(),
            value,
            anchor: Some(events.downgrade()),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// 是否为同一接收者
    pub fn same(&self, other: &Context) -> bool {
        self.key == other.key
    }

    /// 保留值、身份换成 `events`
    pub(crate) fn rekeyed(self, events: &Events) -> Self {
        Self {
            key: events.key(),
            anchor: Some(events.downgrade()),
            ..self
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Context {}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("key", &self.key).finish()
    }
}

/// 一次处理器调用
///
/// 通配通道（默认 `"all"`）上的处理器收到的 `args` 以被触发的事件名开头，
/// 其余参数依次后移；`event()` 在两种通道上都返回真实的事件名。
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    event: &'a str,
    args: &'a [Value],
    context: Option<&'a Context>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(event: &'a str, args: &'a [Value], context: Option<&'a Context>) -> Self {
        Self {
            event,
            args,
            context,
        }
    }

    pub fn event(&self) -> &'a str {
        self.event
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    pub fn arg(&self, index: usize) -> Option<&'a Value> {
        self.args.get(index)
    }

    /// 将第 `index` 个参数反序列化为 `T`
    pub fn decode_arg<T: DeserializeOwned>(&self, index: usize) -> EventResult<T> {
        let value = self.arg(index).ok_or_else(|| EventError::MissingArgument {
            event: self.event.to_string(),
            index,
        })?;
        Ok(T::deserialize(value)?)
    }

    pub fn context(&self) -> Option<&'a Context> {
        self.context
    }

    /// 取回绑定的接收者；未绑定或类型不符时返回 `ReceiverMismatch`
    pub fn receiver<T: Any>(&self) -> EventResult<&'a T> {
        self.context
            .and_then(|ctx| ctx.downcast_ref::<T>())
            .ok_or_else(|| EventError::ReceiverMismatch {
                event: self.event.to_string(),
                expected: type_name::<T>(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_identity_but_new_handles_do_not() {
        let a = Callback::new(|_| Ok(()));
        let b = Callback::new(|_| Ok(()));
        assert!(a.same(&a.clone()));
        assert_ne!(a, b);
    }

    #[test]
    fn context_identity_follows_the_allocation() {
        let shared = Arc::new(5_u32);
        let a = Context::from_arc(shared.clone());
        let b = Context::from_arc(shared);
        let c = Context::new(5_u32);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<u32>(), Some(&5));
        assert!(a.downcast_ref::<String>().is_none());
    }

    #[test]
    fn decode_arg_reports_missing_and_malformed_arguments() {
        let args = [json!(3), json!("x")];
        let inv = Invocation::new("sum", &args, None);

        assert_eq!(inv.decode_arg::<i64>(0).unwrap(), 3);
        assert!(matches!(
            inv.decode_arg::<i64>(1),
            Err(EventError::Serde { .. })
        ));
        match inv.decode_arg::<i64>(2) {
            Err(EventError::MissingArgument { event, index }) => {
                assert_eq!(event, "sum");
                assert_eq!(index, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn receiver_requires_matching_type() {
        let ctx = Context::new(String::from("me"));
        let inv = Invocation::new("e", &[], Some(&ctx));
        assert_eq!(inv.receiver::<String>().unwrap(), "me");
        assert!(matches!(
            inv.receiver::<u8>(),
            Err(EventError::ReceiverMismatch { .. })
        ));

        let bare = Invocation::new("e", &[], None);
        assert!(bare.receiver::<String>().is_err());
    }
}
