//! Events and Listeners
//!
//! Dispatch runs the listeners of the target, then (for bubbling events)
//! of each ancestor, crossing from shadow roots to their hosts. There is no
//! capture phase.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::node::Node;
use crate::value::Value;

thread_local! {
    static NEXT_LISTENER: Cell<u64> = const { Cell::new(1) };
}

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// The listener cannot cancel the event.
    pub passive: bool,
    /// The listener is removed before its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    pub fn passive() -> Self {
        Self {
            passive: true,
            once: false,
        }
    }
}

pub(crate) struct Listener {
    id: ListenerId,
    event_type: String,
    callback: Rc<dyn Fn(&Event)>,
    options: ListenerOptions,
}

struct EventInner {
    event_type: String,
    bubbles: Cell<bool>,
    cancelable: Cell<bool>,
    detail: RefCell<Value>,
    target: RefCell<Option<Node>>,
    current_target: RefCell<Option<Node>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_stopped: Cell<bool>,
    in_passive_listener: Cell<bool>,
}

/// A dispatched event. Clones share state.
#[derive(Clone)]
pub struct Event(Rc<EventInner>);

impl Event {
    /// A non-bubbling, non-cancelable event.
    pub fn new(event_type: &str) -> Self {
        Event(Rc::new(EventInner {
            event_type: event_type.to_string(),
            bubbles: Cell::new(false),
            cancelable: Cell::new(false),
            detail: RefCell::new(Value::Null),
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_stopped: Cell::new(false),
            in_passive_listener: Cell::new(false),
        }))
    }

    /// A bubbling event carrying `detail`.
    pub fn custom(event_type: &str, detail: impl Into<Value>) -> Self {
        Self::new(event_type).bubbles(true).detail(detail)
    }

    pub fn bubbles(self, bubbles: bool) -> Self {
        self.0.bubbles.set(bubbles);
        self
    }

    pub fn cancelable(self, cancelable: bool) -> Self {
        self.0.cancelable.set(cancelable);
        self
    }

    pub fn detail(self, detail: impl Into<Value>) -> Self {
        *self.0.detail.borrow_mut() = detail.into();
        self
    }

    pub fn event_type(&self) -> &str {
        &self.0.event_type
    }

    pub fn does_bubble(&self) -> bool {
        self.0.bubbles.get()
    }

    pub fn is_cancelable(&self) -> bool {
        self.0.cancelable.get()
    }

    pub fn get_detail(&self) -> Value {
        self.0.detail.borrow().clone()
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> Option<Node> {
        self.0.target.borrow().clone()
    }

    /// The node whose listeners are currently running.
    pub fn current_target(&self) -> Option<Node> {
        self.0.current_target.borrow().clone()
    }

    /// Ignored for non-cancelable events and inside passive listeners.
    pub fn prevent_default(&self) {
        if self.0.in_passive_listener.get() {
            tracing::warn!(
                event = %self.0.event_type,
                "prevent_default ignored inside a passive listener"
            );
            return;
        }
        if self.0.cancelable.get() {
            self.0.default_prevented.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.0.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.0.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.0.propagation_stopped.set(true);
        self.0.immediate_stopped.set(true);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.0.event_type)
            .field("bubbles", &self.does_bubble())
            .field("target", &self.target())
            .finish()
    }
}

impl Node {
    pub fn add_event_listener(
        &self,
        event_type: &str,
        callback: impl Fn(&Event) + 'static,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = NEXT_LISTENER.with(|n| {
            let id = n.get();
            n.set(id + 1);
            ListenerId(id)
        });
        self.0.listeners.borrow_mut().push(Listener {
            id,
            event_type: event_type.to_string(),
            callback: Rc::new(callback),
            options,
        });
        id
    }

    /// Returns whether the listener was registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event_type)
            .count()
    }

    /// Dispatch `event` with this node as target. Returns `false` when a
    /// listener cancelled it.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        *event.0.target.borrow_mut() = Some(self.clone());
        event.0.propagation_stopped.set(false);
        event.0.immediate_stopped.set(false);

        let mut path = vec![self.clone()];
        if event.does_bubble() {
            let mut node = self.clone();
            while let Some(next) = node.parent_or_host() {
                path.push(next.clone());
                node = next;
            }
        }

        for node in path {
            *event.0.current_target.borrow_mut() = Some(node.clone());
            node.invoke_listeners(event);
            if event.0.propagation_stopped.get() {
                break;
            }
        }
        *event.0.current_target.borrow_mut() = None;
        !event.default_prevented()
    }

    fn invoke_listeners(&self, event: &Event) {
        let matching: Vec<(ListenerId, Rc<dyn Fn(&Event)>, ListenerOptions)> = self
            .0
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.event_type == event.0.event_type)
            .map(|l| (l.id, Rc::clone(&l.callback), l.options))
            .collect();

        for (id, callback, options) in matching {
            // A listener removed by an earlier one in this pass is skipped.
            let still_registered = self.0.listeners.borrow().iter().any(|l| l.id == id);
            if !still_registered {
                continue;
            }
            if options.once {
                self.remove_event_listener(id);
            }
            event.0.in_passive_listener.set(options.passive);
            callback(event);
            event.0.in_passive_listener.set(false);
            if event.0.immediate_stopped.get() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Element, ShadowRootMode};

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&Event)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = {
            let log = Rc::clone(&log);
            move |name: &str| -> Box<dyn Fn(&Event)> {
                let (log, name) = (Rc::clone(&log), name.to_string());
                Box::new(move |_: &Event| log.borrow_mut().push(name.clone()))
            }
        };
        (log, make)
    }

    #[test]
    fn events_bubble_to_ancestors() {
        let (log, make) = recorder();
        let outer = Element::new("div");
        let inner = Element::new("button");
        outer.append_child(&inner);
        outer.add_event_listener("click", make("outer"), ListenerOptions::default());
        inner.add_event_listener("click", make("inner"), ListenerOptions::default());

        inner.click();
        assert_eq!(*log.borrow(), vec!["inner", "outer"]);

        inner.dispatch_event(&Event::new("click"));
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn stop_propagation_halts_bubbling() {
        let (log, make) = recorder();
        let outer = Element::new("div");
        let inner = Element::new("button");
        outer.append_child(&inner);
        outer.add_event_listener("click", make("outer"), ListenerOptions::default());
        inner.add_event_listener("click", |e| e.stop_propagation(), ListenerOptions::default());

        inner.click();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn once_listeners_fire_once() {
        let (log, make) = recorder();
        let el = Element::new("div");
        el.add_event_listener(
            "ping",
            make("once"),
            ListenerOptions {
                once: true,
                ..Default::default()
            },
        );
        el.dispatch_event(&Event::new("ping"));
        el.dispatch_event(&Event::new("ping"));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(el.listener_count("ping"), 0);
    }

    #[test]
    fn passive_listeners_cannot_cancel() {
        let el = Element::new("div");
        el.add_event_listener("wheel", |e| e.prevent_default(), ListenerOptions::passive());
        let event = Event::new("wheel").cancelable(true);
        assert!(el.dispatch_event(&event));

        el.add_event_listener("submit", |e| e.prevent_default(), ListenerOptions::default());
        assert!(!el.dispatch_event(&Event::new("submit").cancelable(true)));
    }

    #[test]
    fn bubbling_crosses_shadow_boundary() {
        let (log, make) = recorder();
        let document = Document::new();
        let host = Element::new("x-card");
        document.body().append_child(&host);
        let shadow = host.attach_shadow(ShadowRootMode::Open);
        let button = Element::new("button");
        shadow.append_child(&button);
        host.add_event_listener("click", make("host"), ListenerOptions::default());

        button.click();
        assert_eq!(*log.borrow(), vec!["host"]);
    }

    #[test]
    fn custom_event_carries_detail() {
        let el = Element::new("div");
        let seen = Rc::new(RefCell::new(Value::Null));
        el.add_event_listener(
            "change",
            {
                let seen = Rc::clone(&seen);
                move |e| *seen.borrow_mut() = e.get_detail()
            },
            ListenerOptions::default(),
        );
        el.dispatch_event(&Event::custom("change", 7));
        assert_eq!(*seen.borrow(), Value::Int(7));
    }
}
