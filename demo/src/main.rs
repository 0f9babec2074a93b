use anyhow::Result;
use evented::{Callback, Emitter, EventMap, EventResult, Evented, Events};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 带属性的文档：`set` 在值变化时触发 `change:<attr>` 与 `change`
#[derive(Default)]
struct Document {
    events: Events,
    attrs: Mutex<BTreeMap<String, Value>>,
}

impl Emitter for Document {
    fn events(&self) -> &Events {
        &self.events
    }
}

impl Document {
    fn get(&self, key: &str) -> Option<Value> {
        self.attrs.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> EventResult<()> {
        let changed = match self.attrs.lock() {
            Ok(mut attrs) => attrs.insert(key.to_string(), value.clone()).as_ref() != Some(&value),
            Err(_) => return Err(evented::EventError::handler("set", "attributes poisoned")),
        };
        if changed {
            self.trigger(&format!("change:{key}"), &[value])?;
            self.trigger("change", &[])?;
        }
        Ok(())
    }
}

/// 视图：只统计渲染次数
#[derive(Default)]
struct Sidebar {
    renders: AtomicUsize,
}

fn render() -> Callback {
    Callback::new(|inv| {
        let view = inv.receiver::<Sidebar>()?;
        let n = view.renders.fetch_add(1, Ordering::SeqCst) + 1;
        info!(event = inv.event(), renders = n, "sidebar rendered");
        Ok(())
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let doc = Arc::new(Document::default());
    let sidebar = Evented::new(Sidebar::default());

    // 标题变化时自动维护 slug：处理器内部再次 set，只在值真正变化时递归一次
    let weak: Weak<Document> = Arc::downgrade(&doc);
    doc.on(
        (
            "change:title",
            Callback::new(move |inv| {
                let title: String = inv.decode_arg(0)?;
                match weak.upgrade() {
                    Some(doc) => doc.set("slug", json!(title.to_lowercase().replace(' ', "-"))),
                    None => Ok(()),
                }
            }),
        ),
        None,
    );

    let audit = Callback::new(|inv| {
        info!(event = ?inv.arg(0), "audit");
        Ok(())
    });
    doc.on(("all", &audit), None);

    let render = render();
    sidebar.listen_to(
        &*doc,
        EventMap::new()
            .with("change:title", &render)
            .with("change:slug", &render),
    );
    sidebar.listen_to_once(&*doc, ("change:author", &render));

    doc.set("title", json!("Hello World"))?;
    doc.set("author", json!("ada"))?;
    doc.set("author", json!("grace"))?;
    info!(slug = ?doc.get("slug"), renders = sidebar.renders.load(Ordering::SeqCst), "after edits");

    sidebar.stop_listening(Some(&*doc), Some("change:slug"), None);
    doc.set("title", json!("Second Draft"))?;
    info!(
        renders = sidebar.renders.load(Ordering::SeqCst),
        relation = ?sidebar.events().relation(doc.events()).map(|r| r.event_count()),
        "after partial stop"
    );

    sidebar.stop_listening(None, None, None);
    doc.set("title", json!("Final"))?;
    info!(
        renders = sidebar.renders.load(Ordering::SeqCst),
        listening = sidebar.events().listening_count(),
        listeners = doc.events().listener_count(None),
        "after stop_listening"
    );

    Ok(())
}
