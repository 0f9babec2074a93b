//! 分发器（Dispatcher）
//!
//! 对被触发事件的监听快照逐个调用处理器：
//! 1. 先取该事件与通配通道各自的快照；
//! 2. 依注册顺序调用该事件的处理器；
//! 3. 再调用通配通道的处理器，参数前插真实事件名；
//! 4. `once` 记录在调用前被认领并从实时表删除，重入的触发不会再次看到它；
//! 5. 多事件名从左到右逐个重复以上过程。
//!
//! 处理器返回错误时立即向上传播，快照中剩余的处理器（包括通配通道）不再调用。
//!
use crate::bindings::split_names;
use crate::callback::Invocation;
use crate::error::EventResult;
use crate::table::{ListenerRecord, ListenerTable};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) struct Dispatcher<'a> {
    table: &'a ListenerTable,
    wildcard: &'a str,
    emitter_key: usize,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(table: &'a ListenerTable, wildcard: &'a str, emitter_key: usize) -> Self {
        Self {
            table,
            wildcard,
            emitter_key,
        }
    }

    pub(crate) fn trigger(&self, names: &str, args: &[Value]) -> EventResult<()> {
        for name in split_names(names) {
            self.dispatch(name, args)?;
        }
        Ok(())
    }

    fn dispatch(&self, name: &str, args: &[Value]) -> EventResult<()> {
        // 直接触发通配名时，通配监听者在两个通道上各被调用一次
        let specific = self.table.snapshot(name);
        let all = self.table.snapshot(self.wildcard);

        trace!(
            event = name,
            listeners = specific.len(),
            wildcard = all.len(),
            "dispatching"
        );

        self.invoke(name, name, &specific, args)?;

        if !all.is_empty() {
            let mut prefixed = Vec::with_capacity(args.len() + 1);
            prefixed.push(Value::String(name.to_string()));
            prefixed.extend_from_slice(args);
            self.invoke(self.wildcard, name, &all, &prefixed)?;
        }

        Ok(())
    }

    fn invoke(
        &self,
        channel: &str,
        event: &str,
        records: &[Arc<ListenerRecord>],
        args: &[Value],
    ) -> EventResult<()> {
        for record in records {
            if record.is_once() {
                if !record.claim() {
                    continue;
                }
                self.retire(channel, record);
            }

            let invocation = Invocation::new(event, args, record.context());
            if let Err(err) = record.callback().call(&invocation) {
                debug!(event, channel, record = record.id(), error = %err, "handler failed, dispatch aborted");
                return Err(err);
            }
        }
        Ok(())
    }

    fn retire(&self, channel: &str, record: &ListenerRecord) {
        // 若已被 off 移除，计数已在那里归还
        if let Some(removed) = self.table.remove(channel, record.id()) {
            removed.release(self.emitter_key);
        }
    }
}
