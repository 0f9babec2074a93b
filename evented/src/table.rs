//! 监听表（ListenerTable）
//!
//! 每个发射器独占一张表：事件名 → 按注册顺序排列的监听记录。
//! 表只负责存取，不调用任何处理器；所有读写都在分片锁内完成且不跨越回调，
//! 因此处理器可以在分发过程中自由地重入 `on`/`off`/`trigger`。
//!
use crate::bindings::Binding;
use crate::callback::{Callback, Context};
use crate::listening::ListeningRegistry;
use crate::matcher::Filter;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub type RecordId = u64;

/// 一条注册
///
/// 记录创建后不再修改；`once` 记录在首次被认领时从表中删除，而不是改写。
#[derive(Debug)]
pub struct ListenerRecord {
    id: RecordId,
    name: String,
    callback: Callback,
    context: Option<Context>,
    once: bool,
    fired: AtomicBool,
    // 经 listen_to 注册时指向监听方的登记簿，记录被移除时据此归还计数
    listener: Option<Weak<ListeningRegistry>>,
}

impl ListenerRecord {
    pub(crate) fn new(
        id: RecordId,
        binding: Binding,
        once: bool,
        listener: Option<Weak<ListeningRegistry>>,
    ) -> Self {
        Self {
            id,
            name: binding.name,
            callback: binding.callback,
            context: binding.context,
            once,
            fired: AtomicBool::new(false),
            listener,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    /// 认领一次性记录：只有第一个调用者得到 `true`
    pub(crate) fn claim(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }

    /// 记录离开监听表后，归还监听方关系上的一次计数
    pub(crate) fn release(&self, emitter_key: usize) {
        if let Some(registry) = self.listener.as_ref().and_then(Weak::upgrade) {
            registry.release(emitter_key, 1);
        }
    }
}

/// 发射器的监听表
#[derive(Debug, Default)]
pub struct ListenerTable {
    events: DashMap<String, Vec<Arc<ListenerRecord>>>,
    next_id: AtomicU64,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序追加一批注册，返回新记录的 id
    pub(crate) fn insert(
        &self,
        bindings: Vec<Binding>,
        once: bool,
        listener: Option<&Weak<ListeningRegistry>>,
    ) -> Vec<RecordId> {
        bindings
            .into_iter()
            .map(|binding| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let record = ListenerRecord::new(id, binding, once, listener.cloned());
                self.events
                    .entry(record.name.clone())
                    .or_default()
                    .push(Arc::new(record));
                id
            })
            .collect()
    }

    /// 某事件当前记录的快照（仅克隆 `Arc`）
    pub(crate) fn snapshot(&self, name: &str) -> Vec<Arc<ListenerRecord>> {
        self.events
            .get(name)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    /// 按记录身份从实时表中删除；已不在表中则返回 `None`
    pub(crate) fn remove(&self, name: &str, id: RecordId) -> Option<Arc<ListenerRecord>> {
        let removed = {
            let mut records = self.events.get_mut(name)?;
            let pos = records.iter().position(|r| r.id == id)?;
            records.remove(pos)
        };
        self.events.remove_if(name, |_, records| records.is_empty());
        Some(removed)
    }

    /// 删除所有满足过滤条件的记录，返回被删除的记录
    pub(crate) fn remove_matching(&self, filter: &Filter<'_>) -> Vec<Arc<ListenerRecord>> {
        let mut removed = Vec::new();

        match filter.names() {
            Some(names) => {
                for name in names {
                    if let Some(mut records) = self.events.get_mut(name) {
                        let (gone, kept): (Vec<_>, Vec<_>) =
                            records.drain(..).partition(|r| filter.matches(r));
                        *records = kept;
                        removed.extend(gone);
                    }
                    self.events.remove_if(name, |_, records| records.is_empty());
                }
            }
            None if filter.is_unscoped() => {
                let all: Vec<String> = self.names();
                for name in all {
                    if let Some((_, records)) = self.events.remove(&name) {
                        removed.extend(records);
                    }
                }
            }
            None => {
                self.events.retain(|_, records| {
                    let (gone, kept): (Vec<_>, Vec<_>) =
                        records.drain(..).partition(|r| filter.matches(r));
                    *records = kept;
                    removed.extend(gone);
                    !records.is_empty()
                });
            }
        }

        removed
    }

    /// 已注册的事件名
    pub fn names(&self) -> Vec<String> {
        self.events.iter().map(|e| e.key().clone()).collect()
    }

    /// 记录数；`name` 为 `None` 时统计全部事件
    pub fn len(&self, name: Option<&str>) -> usize {
        match name {
            Some(name) => self.events.get(name).map_or(0, |records| records.len()),
            None => self.events.iter().map(|e| e.value().len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 满足过滤条件的记录数
    pub(crate) fn count_matching(&self, filter: &Filter<'_>) -> usize {
        self.events
            .iter()
            .flat_map(|e| e.value().clone())
            .filter(|r| filter.matches(r))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str, callback: &Callback) -> Binding {
        Binding {
            name: name.into(),
            callback: callback.clone(),
            context: None,
        }
    }

    fn ids(records: &[Arc<ListenerRecord>]) -> Vec<RecordId> {
        records.iter().map(|r| r.id()).collect()
    }

    #[test]
    fn records_keep_registration_order() {
        let table = ListenerTable::new();
        let (f, g) = (Callback::new(|_| Ok(())), Callback::new(|_| Ok(())));
        let first = table.insert(vec![binding("e", &f)], false, None);
        let second = table.insert(vec![binding("e", &g), binding("e", &f)], false, None);

        let snapshot = table.snapshot("e");
        assert_eq!(ids(&snapshot), [first, second].concat());
        assert_eq!(table.len(Some("e")), 3);
        assert!(table.snapshot("missing").is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let table = ListenerTable::new();
        let f = Callback::new(|_| Ok(()));
        table.insert(vec![binding("e", &f)], false, None);

        let snapshot = table.snapshot("e");
        table.remove_matching(&Filter::default());
        table.insert(vec![binding("e", &f), binding("e", &f)], false, None);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(table.len(Some("e")), 2);
    }

    #[test]
    fn remove_by_id_targets_exactly_one_record() {
        let table = ListenerTable::new();
        let f = Callback::new(|_| Ok(()));
        let ids = table.insert(vec![binding("e", &f), binding("e", &f)], true, None);

        let removed = table.remove("e", ids[0]).expect("record present");
        assert_eq!(removed.id(), ids[0]);
        assert!(table.remove("e", ids[0]).is_none());
        assert_eq!(ids_of(&table, "e"), [ids[1]]);

        table.remove("e", ids[1]);
        assert!(table.is_empty());
    }

    fn ids_of(table: &ListenerTable, name: &str) -> Vec<RecordId> {
        ids(&table.snapshot(name))
    }

    #[test]
    fn remove_matching_by_name_and_callback() {
        let table = ListenerTable::new();
        let (f, g) = (Callback::new(|_| Ok(())), Callback::new(|_| Ok(())));
        table.insert(
            vec![binding("a", &f), binding("a", &g), binding("b", &f)],
            false,
            None,
        );

        let removed = table.remove_matching(&Filter::new(Some("a"), Some(&f), None));
        assert_eq!(removed.len(), 1);
        assert_eq!(table.len(Some("a")), 1);
        assert_eq!(table.len(Some("b")), 1);

        let removed = table.remove_matching(&Filter::new(None, Some(&f), None));
        assert_eq!(removed.len(), 1);
        assert_eq!(table.names(), ["a"]);
    }

    #[test]
    fn unscoped_removal_clears_the_table() {
        let table = ListenerTable::new();
        let f = Callback::new(|_| Ok(()));
        table.insert(vec![binding("a", &f), binding("b", &f)], false, None);

        let removed = table.remove_matching(&Filter::default());
        assert_eq!(removed.len(), 2);
        assert!(table.is_empty());
        assert_eq!(table.len(None), 0);
    }

    #[test]
    fn once_records_are_claimed_a_single_time() {
        let table = ListenerTable::new();
        let f = Callback::new(|_| Ok(()));
        table.insert(vec![binding("e", &f)], true, None);
        let record = &table.snapshot("e")[0];

        assert!(record.is_once());
        assert!(record.claim());
        assert!(!record.claim());
    }
}
