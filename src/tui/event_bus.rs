//! Synchronous publish/subscribe bus shared by the console's components.
//!
//! One bus is created per application session and handed to every component
//! that needs it. Cloning an [`EventBus`] yields another handle to the same
//! registry.
//!
//! Dispatch is single-threaded: [`EventBus::emit`] runs every handler
//! registered for the event before it returns, in registration order.
//! Handlers may subscribe, unsubscribe or emit while they are being run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use anyhow::Result;
use log::{error, trace, warn};
use serde_json::Value;

/// Handler invoked with the payload of an emitted event
pub type Handler = Rc<dyn Fn(&Value) -> Result<()>>;

/// Identifies one registration made with [`EventBus::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<Registration>>,
}

impl Registry {
    fn contains(&self, event: &str, id: ListenerId) -> bool {
        self.listeners
            .get(event)
            .is_some_and(|regs| regs.iter().any(|r| r.id == id))
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event`.
    ///
    /// Registering the same logic twice creates two independent registrations,
    /// each with its own [`ListenerId`].
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) -> Result<()> + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(Registration {
                id,
                handler: Rc::new(handler),
            });
        trace!("Listener {:?} registered for '{}'", id, event);
        id
    }

    /// Remove a registration. Unknown ids are ignored.
    ///
    /// Returns true if a registration was removed.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        let Some(regs) = registry.listeners.get_mut(event) else {
            return false;
        };

        let before = regs.len();
        regs.retain(|r| r.id != id);
        let removed = regs.len() != before;

        // Drop the key entirely so the registry looks exactly as it did
        // before the first subscription.
        if regs.is_empty() {
            registry.listeners.remove(event);
        }

        if removed {
            trace!("Listener {:?} removed from '{}'", id, event);
        }
        removed
    }

    /// Deliver `payload` to every handler currently registered for `event`.
    ///
    /// A handler returning `Err` or panicking is logged and skipped; the
    /// remaining handlers still run.
    pub fn emit(&self, event: &str, payload: Value) {
        let snapshot: Vec<(ListenerId, Handler)> = {
            let registry = self.registry.borrow();
            match registry.listeners.get(event) {
                Some(regs) => regs.iter().map(|r| (r.id, r.handler.clone())).collect(),
                None => {
                    trace!("No listeners for '{}'", event);
                    return;
                }
            }
        };

        for (id, handler) in snapshot {
            // An earlier handler in this dispatch may have unsubscribed it
            if !self.registry.borrow().contains(event, id) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| handler(&payload))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!("Listener {:?} for '{}' failed: {:#}", id, event, err);
                }
                Err(_) => {
                    error!("Listener {:?} for '{}' panicked", id, event);
                }
            }
        }
    }

    /// Number of registrations for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .borrow()
            .listeners
            .get(event)
            .map_or(0, |regs| regs.len())
    }

    /// Whether `id` is still registered for `event`
    pub fn is_registered(&self, event: &str, id: ListenerId) -> bool {
        self.registry.borrow().contains(event, id)
    }

    /// Total registrations across all events
    pub fn total_listeners(&self) -> usize {
        self.registry
            .borrow()
            .listeners
            .values()
            .map(|regs| regs.len())
            .sum()
    }
}

/// Registrations owned by one component.
///
/// Everything registered through a `ListenerSet` is removed by
/// [`ListenerSet::remove_all`], and again on drop, so the set of events a
/// component subscribes to always matches the set it unsubscribes from.
pub struct ListenerSet {
    bus: EventBus,
    ids: Vec<(String, ListenerId)>,
}

impl ListenerSet {
    pub fn new(bus: &EventBus) -> Self {
        Self {
            bus: bus.clone(),
            ids: Vec::new(),
        }
    }

    pub fn on<F>(&mut self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) -> Result<()> + 'static,
    {
        let id = self.bus.on(event, handler);
        self.ids.push((event.to_string(), id));
        id
    }

    /// Register a handler that mutates shared component state.
    ///
    /// Only a weak reference is captured: once the owner drops the state,
    /// late events are ignored.
    pub fn on_state<S, F>(&mut self, event: &str, state: &Rc<RefCell<S>>, handler: F) -> ListenerId
    where
        S: 'static,
        F: Fn(&mut S, &Value) -> Result<()> + 'static,
    {
        let weak = Rc::downgrade(state);
        let name = event.to_string();
        self.on(event, move |payload| {
            let Some(state) = weak.upgrade() else {
                trace!("Dropping '{}' for a released component", name);
                return Ok(());
            };
            let mut state = state.borrow_mut();
            handler(&mut state, payload)
        })
    }

    pub fn remove_all(&mut self) {
        for (event, id) in self.ids.drain(..) {
            self.bus.off(&event, id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Drop for ListenerSet {
    fn drop(&mut self) {
        self.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_emit_in_registration_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = log.clone();
            bus.on("Ping", move |_| {
                log.borrow_mut().push(tag);
                Ok(())
            });
        }

        bus.emit("Ping", json!({}));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_emit_without_listeners_is_noop() {
        let bus = EventBus::new();
        bus.emit("Nobody", json!({"x": 1}));
        assert_eq!(bus.total_listeners(), 0);
    }

    #[test]
    fn test_on_then_off_restores_registry() {
        let bus = EventBus::new();
        let existing = bus.on("Tick", |_| Ok(()));
        assert_eq!(bus.listener_count("Tick"), 1);

        let id = bus.on("Tick", |_| Ok(()));
        assert_eq!(bus.listener_count("Tick"), 2);

        assert!(bus.off("Tick", id));
        assert_eq!(bus.listener_count("Tick"), 1);
        assert!(bus.is_registered("Tick", existing));
    }

    #[test]
    fn test_off_unknown_is_noop() {
        let bus = EventBus::new();
        let id = bus.on("Tick", |_| Ok(()));
        assert!(!bus.off("Other", id));
        assert!(bus.off("Tick", id));
        assert!(!bus.off("Tick", id));
        assert_eq!(bus.listener_count("Tick"), 0);
    }

    #[test]
    fn test_duplicates_are_independent() {
        let bus = EventBus::new();
        let hits = Rc::new(Cell::new(0));
        let handler = {
            let hits = hits.clone();
            move |_: &Value| -> Result<()> {
                hits.set(hits.get() + 1);
                Ok(())
            }
        };

        let first = bus.on("Tick", handler.clone());
        bus.on("Tick", handler);
        bus.emit("Tick", Value::Null);
        assert_eq!(hits.get(), 2);

        bus.off("Tick", first);
        bus.emit("Tick", Value::Null);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn test_failing_handlers_do_not_stop_delivery() {
        let bus = EventBus::new();
        let reached = Rc::new(Cell::new(false));

        bus.on("Boom", |_| Err(anyhow::anyhow!("handler error")));
        bus.on("Boom", |_| panic!("handler panic"));
        {
            let reached = reached.clone();
            bus.on("Boom", move |_| {
                reached.set(true);
                Ok(())
            });
        }

        bus.emit("Boom", Value::Null);
        assert!(reached.get());
    }

    #[test]
    fn test_handler_removed_mid_dispatch_is_skipped() {
        let bus = EventBus::new();
        let second_ran = Rc::new(Cell::new(false));
        let second_id = Rc::new(Cell::new(None));

        {
            let bus_handle = bus.clone();
            let second_id = second_id.clone();
            bus.on("Evt", move |_| {
                if let Some(id) = second_id.get() {
                    bus_handle.off("Evt", id);
                }
                Ok(())
            });
        }
        {
            let second_ran = second_ran.clone();
            let id = bus.on("Evt", move |_| {
                second_ran.set(true);
                Ok(())
            });
            second_id.set(Some(id));
        }

        bus.emit("Evt", Value::Null);
        assert!(!second_ran.get());
        assert_eq!(bus.listener_count("Evt"), 1);
    }

    #[test]
    fn test_listener_set_removes_everything() {
        let bus = EventBus::new();
        {
            let mut set = ListenerSet::new(&bus);
            set.on("A", |_| Ok(()));
            set.on("B", |_| Ok(()));
            assert_eq!(bus.total_listeners(), 2);
            set.remove_all();
            assert_eq!(bus.total_listeners(), 0);
            set.on("C", |_| Ok(()));
        }
        // Dropped with a live registration
        assert_eq!(bus.total_listeners(), 0);
    }

    #[test]
    fn test_on_state_ignores_released_state() {
        let bus = EventBus::new();
        let mut set = ListenerSet::new(&bus);
        let state = Rc::new(RefCell::new(0u32));
        set.on_state("Inc", &state, |count, _| {
            *count += 1;
            Ok(())
        });

        bus.emit("Inc", Value::Null);
        assert_eq!(*state.borrow(), 1);

        drop(state);
        bus.emit("Inc", Value::Null);
    }
}
