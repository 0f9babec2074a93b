//! 监听关系登记簿（ListeningRegistry）
//!
//! 记录“我正在监听哪些发射器”，按发射器身份为键，每条关系带有：
//! - `id`：关系存续期间稳定，由登记簿自有的单调计数器分配（不使用全局状态）；
//! - `emitter`：对发射器的弱引用，监听方不拥有发射器的生命周期；
//! - `event_count`：该关系下当前仍存活的注册数，归零即删除关系。
//!
//! `stop_listening` 只需回放按接收者限定的 `off`，计数由被移除的记录逐条归还。
//!
use crate::emitter::{Events, WeakEvents};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub type RelationId = u64;

/// 一条监听关系
#[derive(Clone, Debug)]
pub struct Relation {
    id: RelationId,
    emitter: WeakEvents,
    event_count: usize,
}

impl Relation {
    pub fn id(&self) -> RelationId {
        self.id
    }

    pub fn emitter(&self) -> &WeakEvents {
        &self.emitter
    }

    pub fn event_count(&self) -> usize {
        self.event_count
    }
}

#[derive(Debug, Default)]
pub struct ListeningRegistry {
    relations: DashMap<usize, Relation>,
    next_id: AtomicU64,
}

impl ListeningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记对 `emitter` 新增的 `count` 条注册，必要时创建关系
    pub(crate) fn track(&self, emitter: &Events, count: usize) -> Option<RelationId> {
        if count == 0 {
            return None;
        }

        let mut relation = self
            .relations
            .entry(emitter.key())
            .or_insert_with(|| Relation {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                emitter: emitter.downgrade(),
                event_count: 0,
            });
        relation.event_count += count;
        Some(relation.id)
    }

    /// 归还 `count` 条注册；计数归零时删除关系
    pub(crate) fn release(&self, emitter_key: usize, count: usize) {
        let emptied = match self.relations.get_mut(&emitter_key) {
            Some(mut relation) => {
                relation.event_count = relation.event_count.saturating_sub(count);
                relation.event_count == 0
            }
            None => false,
        };

        if !emptied {
            return;
        }
        if let Some((_, relation)) = self
            .relations
            .remove_if(&emitter_key, |_, r| r.event_count == 0)
        {
            debug!(relation = relation.id, "listening relation closed");
        }
    }

    /// 直接删除关系（不论计数）
    pub(crate) fn forget(&self, emitter_key: usize) -> Option<Relation> {
        self.relations.remove(&emitter_key).map(|(_, r)| r)
    }

    pub fn get(&self, emitter: &Events) -> Option<Relation> {
        self.relations.get(&emitter.key()).map(|r| r.value().clone())
    }

    /// 当前全部关系的快照（键为发射器身份）
    pub(crate) fn snapshot(&self) -> Vec<(usize, Relation)> {
        self.relations
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}
