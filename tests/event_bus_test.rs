use std::cell::RefCell;
use std::rc::Rc;

use anyhow::bail;
use fleet_console::tui::EventBus;
use serde_json::{Value, json};

fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> impl Fn(&Value) -> anyhow::Result<()> + 'static {
    let log = log.clone();
    move |_payload| {
        log.borrow_mut().push(tag.to_string());
        Ok(())
    }
}

#[test]
fn test_emit_without_listeners_is_noop() {
    let bus = EventBus::new();
    bus.emit("Nobody", json!({"x": 1}));
    assert_eq!(bus.total_listeners(), 0);
}

#[test]
fn test_on_then_off_leaves_registry_unchanged() {
    let bus = EventBus::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let keep = bus.on("Tick", recorder(&log, "keep"));
    let before = bus.listener_count("Tick");

    let id = bus.on("Tick", recorder(&log, "temp"));
    assert!(bus.off("Tick", id));
    assert!(!bus.off("Tick", id));

    assert_eq!(bus.listener_count("Tick"), before);
    assert!(bus.is_registered("Tick", keep));
    bus.emit("Tick", json!({}));
    assert_eq!(*log.borrow(), vec!["keep"]);
}

#[test]
fn test_failing_handlers_do_not_stop_delivery() {
    let bus = EventBus::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    bus.on("Save", recorder(&log, "first"));
    bus.on("Save", |_| bail!("backend said no"));
    bus.on("Save", |_| panic!("handler bug"));
    bus.on("Save", recorder(&log, "last"));

    bus.emit("Save", json!({}));
    assert_eq!(*log.borrow(), vec!["first", "last"]);
}

#[test]
fn test_handlers_run_in_registration_order_with_payload() {
    let bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    for tag in ["a", "b", "c"] {
        let seen = seen.clone();
        bus.on("Fleet", move |payload| {
            seen.borrow_mut().push(format!("{}:{}", tag, payload["FleetId"].as_str().unwrap_or("")));
            Ok(())
        });
    }
    bus.emit("Fleet", json!({"FleetId": "f-1"}));
    assert_eq!(*seen.borrow(), vec!["a:f-1", "b:f-1", "c:f-1"]);
}

#[test]
fn test_handler_may_emit_and_unsubscribe() {
    let bus = EventBus::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    bus.on("Second", recorder(&log, "second"));

    let inner = bus.clone();
    let id = Rc::new(RefCell::new(None));
    let own_id = id.clone();
    let registered = bus.on("First", move |_| {
        if let Some(id) = *own_id.borrow() {
            inner.off("First", id);
        }
        inner.emit("Second", json!({}));
        Ok(())
    });
    *id.borrow_mut() = Some(registered);

    bus.emit("First", json!({}));
    bus.emit("First", json!({}));
    assert_eq!(*log.borrow(), vec!["second"]);
    assert_eq!(bus.listener_count("First"), 0);
}
