//! 注销匹配谓词
//!
//! 按可选的（事件名、回调、上下文）过滤条件挑选待移除的监听记录：
//! 省略的维度匹配一切。回调比较的是注册时的原始回调，`once` 记录同样适用。
//!
use crate::bindings::split_names;
use crate::callback::{Callback, Context};
use crate::table::ListenerRecord;

#[derive(Clone, Copy, Debug, Default)]
pub struct Filter<'a> {
    pub names: Option<&'a str>,
    pub callback: Option<&'a Callback>,
    pub context: Option<&'a Context>,
}

impl<'a> Filter<'a> {
    pub fn new(
        names: Option<&'a str>,
        callback: Option<&'a Callback>,
        context: Option<&'a Context>,
    ) -> Self {
        Self {
            names,
            callback,
            context,
        }
    }

    /// 指定的事件名；`None` 表示所有事件
    pub(crate) fn names(&self) -> Option<impl Iterator<Item = &'a str>> {
        self.names.map(split_names)
    }

    /// 记录是否满足回调与上下文两个维度（事件名由表按键处理）
    pub(crate) fn matches(&self, record: &ListenerRecord) -> bool {
        let callback_ok = self
            .callback
            .is_none_or(|cb| record.callback().same(cb));
        let context_ok = self.context.is_none_or(|ctx| {
            record
                .context()
                .is_some_and(|bound| bound.same(ctx))
        });
        callback_ok && context_ok
    }

    /// 是否三个维度都未指定
    pub(crate) fn is_unscoped(&self) -> bool {
        self.names.is_none() && self.callback.is_none() && self.context.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Binding;

    fn record(callback: &Callback, context: Option<&Context>) -> ListenerRecord {
        ListenerRecord::new(
            0,
            Binding {
                name: "e".into(),
                callback: callback.clone(),
                context: context.cloned(),
            },
            false,
            None,
        )
    }

    #[test]
    fn empty_filter_matches_everything() {
        let cb = Callback::new(|_| Ok(()));
        let filter = Filter::default();
        assert!(filter.is_unscoped());
        assert!(filter.matches(&record(&cb, None)));
    }

    #[test]
    fn callback_dimension_uses_identity() {
        let (f, g) = (Callback::new(|_| Ok(())), Callback::new(|_| Ok(())));
        let filter = Filter::new(None, Some(&f), None);
        assert!(filter.matches(&record(&f, None)));
        assert!(!filter.matches(&record(&g, None)));
    }

    #[test]
    fn context_dimension_rejects_unbound_records() {
        let f = Callback::new(|_| Ok(()));
        let (ctx, other) = (Context::new(1_u8), Context::new(1_u8));
        let filter = Filter::new(None, None, Some(&ctx));
        assert!(filter.matches(&record(&f, Some(&ctx))));
        assert!(!filter.matches(&record(&f, Some(&other))));
        assert!(!filter.matches(&record(&f, None)));
    }

    #[test]
    fn names_split_on_whitespace() {
        let filter = Filter::new(Some("a  b"), None, None);
        let names: Vec<_> = filter.names().into_iter().flatten().collect();
        assert_eq!(names, ["a", "b"]);
    }
}
