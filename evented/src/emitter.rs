//! 发射器能力（Emitter）
//!
//! - `Events`：能力句柄，独占一张监听表与一本监听关系登记簿，克隆共享同一实例；
//! - `Emitter`：能力 trait，任何内嵌 `Events` 的类型实现 `events()` 即获得完整 API；
//! - `Evented<T>`：工厂，把任意值包装为带事件能力的对象，并作为处理器的接收者。
//!
//! 监听方自身（而非其回调）是关系的身份：`listen_to` 以监听方的接收者作为上下文注册，
//! `stop_listening` 只回放以该接收者限定的 `off`，不会触及他人的注册。
//! 监听方的最后一个句柄被释放时，会自动停止监听所有仍然存活的发射器。
//!
use crate::bindings::Bindings;
use crate::callback::{Callback, Context};
use crate::config::EventsConfig;
use crate::dispatcher::Dispatcher;
use crate::error::EventResult;
use crate::listening::{ListeningRegistry, Relation};
use crate::matcher::Filter;
use crate::table::ListenerTable;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

struct EventsCore {
    table: ListenerTable,
    listening: Arc<ListeningRegistry>,
    config: EventsConfig,
}

impl Drop for EventsCore {
    fn drop(&mut self) {
        // 与 Arc::as_ptr 得到的地址一致，即本发射器的身份
        let key = self as *const Self as usize;

        // 作为被监听方：归还每条记录在监听方关系上的计数
        for record in self.table.remove_matching(&Filter::default()) {
            record.release(key);
        }

        if self.listening.is_empty() {
            return;
        }

        let receiver = Context::keyed(key, Arc::new(()));

        for (emitter_key, relation) in self.listening.snapshot() {
            if let Some(target) = relation.emitter().upgrade() {
                target.off(None, None, Some(&receiver));
            }
            self.listening.forget(emitter_key);
        }
        debug!(emitter = key, "listener dropped, stopped listening");
    }
}

/// 发射器能力句柄
#[derive(Clone)]
pub struct Events {
    core: Arc<EventsCore>,
}

/// 不持有所有权的发射器引用
#[derive(Clone)]
pub struct WeakEvents {
    core: Weak<EventsCore>,
}

impl WeakEvents {
    pub fn upgrade(&self) -> Option<Events> {
        self.core.upgrade().map(|core| Events { core })
    }
}

impl fmt::Debug for WeakEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEvents")
            .field("key", &(self.core.as_ptr() as usize))
            .finish()
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    pub fn new() -> Self {
        Self::with_config(EventsConfig::default())
    }

    pub fn with_config(config: EventsConfig) -> Self {
        Self {
            core: Arc::new(EventsCore {
                table: ListenerTable::new(),
                listening: Arc::new(ListeningRegistry::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EventsConfig {
        &self.core.config
    }

    /// 发射器身份
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.core) as usize
    }

    pub fn downgrade(&self) -> WeakEvents {
        WeakEvents {
            core: Arc::downgrade(&self.core),
        }
    }

    /// 以本发射器为身份的接收者，值为其弱引用
    pub fn context(&self) -> Context {
        Context::anchored(self, Arc::new(self.downgrade()))
    }

    /// 是否为同一发射器
    pub fn same(&self, other: &Events) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// 注册处理器；回调缺省时为空操作，重复注册不去重
    pub fn on(&self, bindings: impl Into<Bindings>, context: Option<&Context>) {
        self.register(bindings.into(), context, false);
    }

    /// 注册只触发一次的处理器（对通配通道同样适用）
    pub fn once(&self, bindings: impl Into<Bindings>, context: Option<&Context>) {
        self.register(bindings.into(), context, true);
    }

    fn register(&self, bindings: Bindings, context: Option<&Context>, once: bool) {
        let ids = self
            .core
            .table
            .insert(bindings.parse(context), once, None);
        trace!(emitter = self.key(), records = ids.len(), once, "registered");
    }

    /// 移除所有满足给定过滤条件的注册，返回移除条数
    ///
    /// 省略的维度匹配一切，`off(None, None, None)` 清空整张表。
    pub fn off(
        &self,
        names: Option<&str>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> usize {
        let filter = Filter::new(names, callback, context);
        let removed = self.core.table.remove_matching(&filter);
        let key = self.key();
        for record in &removed {
            record.release(key);
        }
        trace!(emitter = key, removed = removed.len(), "unregistered");
        removed.len()
    }

    /// 同步触发事件（可为空白分隔的多个事件名）
    ///
    /// 处理器的错误原样返回，且中止本次触发中尚未调用的处理器。
    pub fn trigger(&self, names: &str, args: &[Value]) -> EventResult<()> {
        Dispatcher::new(&self.core.table, self.core.config.wildcard(), self.key())
            .trigger(names, args)
    }

    /// 以本发射器的接收者监听 `target`
    pub fn listen_to(&self, target: &Events, bindings: impl Into<Bindings>) {
        self.listen_with(self.context(), target, bindings.into(), false);
    }

    pub fn listen_to_once(&self, target: &Events, bindings: impl Into<Bindings>) {
        self.listen_with(self.context(), target, bindings.into(), true);
    }

    pub(crate) fn listen_with(
        &self,
        receiver: Context,
        target: &Events,
        bindings: Bindings,
        once: bool,
    ) {
        // 接收者的值可以自定义，身份始终是监听方自己
        let receiver = receiver.rekeyed(self);
        let parsed = bindings.parse(Some(&receiver));
        let count = parsed.len();

        // 先登记后注册：记录一旦进入目标表就可能被移除并归还计数
        let Some(relation) = self.core.listening.track(target, count) else {
            return;
        };
        let registry = Arc::downgrade(&self.core.listening);
        target.core.table.insert(parsed, once, Some(&registry));
        debug!(
            relation,
            emitter = target.key(),
            events = count,
            once,
            "listening"
        );
    }

    /// 停止监听
    ///
    /// - `target` 缺省时作用于所有关系；
    /// - `names`/`callback` 缺省时移除本监听方在目标上的全部注册并删除关系；
    /// - 否则只移除匹配的注册，关系计数相应递减，归零才删除。
    pub fn stop_listening(
        &self,
        target: Option<&dyn Emitter>,
        names: Option<&str>,
        callback: Option<&Callback>,
    ) {
        let relations = match target.map(|target| target.events()) {
            Some(target) => self
                .core
                .listening
                .get(target)
                .map(|relation| vec![(target.key(), relation)])
                .unwrap_or_default(),
            None => self.core.listening.snapshot(),
        };
        if relations.is_empty() {
            return;
        }

        let receiver = self.context();
        for (emitter_key, relation) in relations {
            match relation.emitter().upgrade() {
                Some(emitter) => {
                    let removed = emitter.off(names, callback, Some(&receiver));
                    if names.is_none() && callback.is_none() {
                        self.core.listening.forget(emitter_key);
                    }
                    debug!(relation = relation.id(), removed, "stopped listening");
                }
                None => {
                    self.core.listening.forget(emitter_key);
                    debug!(relation = relation.id(), "emitter gone, relation pruned");
                }
            }
        }
    }

    /// 注册条数；`name` 为 `None` 时统计全部事件
    pub fn listener_count(&self, name: Option<&str>) -> usize {
        self.core.table.len(name)
    }

    pub fn has_listeners(&self, name: Option<&str>) -> bool {
        self.listener_count(name) > 0
    }

    /// 指定接收者在本发射器上的注册条数
    pub fn count_bound_to(&self, context: &Context) -> usize {
        self.core
            .table
            .count_matching(&Filter::new(None, None, Some(context)))
    }

    /// 已注册的事件名
    pub fn event_names(&self) -> Vec<String> {
        self.core.table.names()
    }

    /// 当前持有的监听关系数
    pub fn listening_count(&self) -> usize {
        self.core.listening.len()
    }

    pub fn relation(&self, target: &Events) -> Option<Relation> {
        self.core.listening.get(target)
    }

    pub fn is_listening_to(&self, target: &Events) -> bool {
        self.relation(target).is_some()
    }
}

impl PartialEq for Events {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Events {}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("key", &self.key())
            .field("listeners", &self.listener_count(None))
            .field("listening", &self.listening_count())
            .finish()
    }
}

/// 事件能力
///
/// 实现者只需提供 `events()`；`receiver()` 决定 `listen_to` 时绑定给处理器的接收者，
/// 默认是发射器的弱引用。
pub trait Emitter {
    fn events(&self) -> &Events;

    fn receiver(&self) -> Context {
        self.events().context()
    }

    fn on(&self, bindings: impl Into<Bindings>, context: Option<&Context>)
    where
        Self: Sized,
    {
        self.events().on(bindings, context);
    }

    fn once(&self, bindings: impl Into<Bindings>, context: Option<&Context>)
    where
        Self: Sized,
    {
        self.events().once(bindings, context);
    }

    fn off(
        &self,
        names: Option<&str>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> usize {
        self.events().off(names, callback, context)
    }

    fn trigger(&self, names: &str, args: &[Value]) -> EventResult<()> {
        self.events().trigger(names, args)
    }

    fn listen_to<E>(&self, target: &E, bindings: impl Into<Bindings>)
    where
        Self: Sized,
        E: Emitter + ?Sized,
    {
        self.events()
            .listen_with(self.receiver(), target.events(), bindings.into(), false);
    }

    fn listen_to_once<E>(&self, target: &E, bindings: impl Into<Bindings>)
    where
        Self: Sized,
        E: Emitter + ?Sized,
    {
        self.events()
            .listen_with(self.receiver(), target.events(), bindings.into(), true);
    }

    fn stop_listening(
        &self,
        target: Option<&dyn Emitter>,
        names: Option<&str>,
        callback: Option<&Callback>,
    ) {
        self.events().stop_listening(target, names, callback);
    }
}

impl Emitter for Events {
    fn events(&self) -> &Events {
        self
    }
}

/// 带事件能力的值
///
/// 克隆共享同一个值与同一个发射器；作为接收者时，处理器可经
/// `Invocation::receiver::<T>()` 取回 `&T`。
pub struct Evented<T> {
    value: Arc<T>,
    events: Events,
}

impl<T: Any + Send + Sync> Evented<T> {
    pub fn new(value: T) -> Self {
        Self::with_config(value, EventsConfig::default())
    }

    pub fn with_config(value: T, config: EventsConfig) -> Self {
        Self {
            value: Arc::new(value),
            events: Events::with_config(config),
        }
    }

    pub fn value(&self) -> &Arc<T> {
        &self.value
    }
}

impl<T> Clone for Evented<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T> Deref for Evented<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Evented<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evented")
            .field("value", &self.value)
            .field("events", &self.events)
            .finish()
    }
}

impl<T: Any + Send + Sync> Emitter for Evented<T> {
    fn events(&self) -> &Events {
        &self.events
    }

    fn receiver(&self) -> Context {
        Context::anchored(&self.events, self.value.clone())
    }
}
