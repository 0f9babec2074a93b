use evented::{Callback, Emitter, EventResult, Events};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// 最小的数据记录：`set` 只在值变化时触发 `change:<key>` 与 `change`
#[derive(Default)]
struct Record {
    events: Events,
    attrs: Mutex<HashMap<String, Value>>,
}

impl Emitter for Record {
    fn events(&self) -> &Events {
        &self.events
    }
}

impl Record {
    fn set(&self, key: &str, value: Value) -> EventResult<()> {
        let changed = {
            let mut attrs = self.attrs.lock().unwrap();
            attrs.insert(key.to_string(), value.clone()) != Some(value.clone())
        };
        if changed {
            self.trigger(&format!("change:{key}"), &[value])?;
            self.trigger("change", &[])?;
        }
        Ok(())
    }
}

fn recorder(log: &Arc<Mutex<Vec<String>>>) -> Callback {
    let log = log.clone();
    Callback::new(move |inv| {
        log.lock().unwrap().push(inv.decode_arg::<String>(0)?);
        Ok(())
    })
}

#[test]
fn change_handler_calling_set_terminates_and_keeps_outer_wildcard() {
    let record = Arc::new(Record::default());
    let log = Arc::new(Mutex::new(Vec::new()));

    let weak: Weak<Record> = Arc::downgrade(&record);
    record.on(
        (
            "change",
            Callback::new(move |_| match weak.upgrade() {
                Some(record) => record.set("seen", json!(true)),
                None => Ok(()),
            }),
        ),
        None,
    );
    record.on(("all", recorder(&log)), None);

    record.set("name", json!("x")).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        ["change:name", "change:seen", "change", "change"]
    );
}

#[test]
fn handler_may_trigger_other_events_on_the_same_emitter() {
    let events = Events::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let relay = {
        let events = events.downgrade();
        Callback::new(move |_| match events.upgrade() {
            Some(events) => events.trigger("b", &[]),
            None => Ok(()),
        })
    };
    events.on(("a", relay), None);
    events.on(("all", recorder(&log)), None);

    events.trigger("a", &[]).unwrap();
    assert_eq!(*log.lock().unwrap(), ["b", "a"]);
}

#[test]
fn handler_may_stop_listening_mid_dispatch() {
    let (a, b) = (Events::new(), Events::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let quitter = {
        let a = a.downgrade();
        let b = b.downgrade();
        Callback::new(move |_| {
            if let (Some(a), Some(b)) = (a.upgrade(), b.upgrade()) {
                a.stop_listening(Some(&b), None, None);
            }
            Ok(())
        })
    };
    a.listen_to(&b, ("x", quitter));
    b.on(("all", recorder(&log)), None);

    b.trigger("x", &[]).unwrap();
    b.trigger("x", &[]).unwrap();

    assert!(!a.is_listening_to(&b));
    assert_eq!(*log.lock().unwrap(), ["x", "x"]);
}

#[test]
fn failing_handler_in_nested_trigger_propagates_to_the_outer_caller() {
    let events = Events::new();
    let relay = {
        let events = events.downgrade();
        Callback::new(move |_| match events.upgrade() {
            Some(events) => events.trigger("inner", &[]),
            None => Ok(()),
        })
    };
    events.on(("outer", relay), None);
    events.on(
        (
            "inner",
            Callback::new(|inv| Err(evented::EventError::handler(inv.event(), "nope"))),
        ),
        None,
    );

    let err = events.trigger("outer", &[]).unwrap_err();
    assert!(err.to_string().contains("event=inner"));
}
