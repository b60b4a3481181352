//! Sensor Implementation
//!
//! A Sensor exposes imperative element state (a checkbox being checked, a
//! pointer being inside) as a signal. Event handlers compute the next value
//! from the event and the previous value; the sensor stores it and marks its
//! dependents dirty. Dependents recompute when they are next read or
//! flushed: push to mark dirty, pull to materialize.
//!
//! Listeners are attached on the first read, not at construction, and
//! removed on [`Sensor::dispose`] or when the last handle is dropped.
//!
//! Passive event types (scroll, resize, touch, wheel by default) never
//! write synchronously. Their writes go through the frame scheduler under
//! one key per sensor and event type, so a burst of events commits only
//! the last computed value.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::Runtime;
use super::scheduler::{schedule, DedupeKey};
use super::signal::Signal;
use crate::config::with_config;
use crate::dom::{Element, Event, ListenerId, ListenerOptions};
use crate::error::Result;
use crate::graph::{Node, NodeId};

/// What a sensor handler sees.
pub struct SensorEvent<'a, T> {
    pub event: &'a Event,
    /// The element the sensor listens on.
    pub target: &'a Element,
    pub previous: &'a T,
}

type Handler<T> = Rc<dyn Fn(&SensorEvent<'_, T>) -> Option<T>>;

struct SensorInner<T> {
    id: NodeId,
    target: Element,
    value: RefCell<T>,
    equals: Box<dyn Fn(&T, &T) -> bool>,
    handlers: RefCell<Vec<(String, Handler<T>)>>,
    listeners: RefCell<Vec<ListenerId>>,
    started: Cell<bool>,
    disposed: Cell<bool>,
}

impl<T: Clone + 'static> SensorInner<T> {
    fn write(&self, next: T) {
        let changed = !(self.equals)(&self.value.borrow(), &next);
        if changed {
            *self.value.borrow_mut() = next;
            tracing::trace!(node = ?self.id, "sensor changed");
            Runtime::notify_signal_change(self.id);
        }
    }

    fn start(self: &Rc<Self>) {
        if self.started.replace(true) || self.disposed.get() {
            return;
        }
        let handlers = self.handlers.borrow().clone();
        let mut listeners = Vec::with_capacity(handlers.len());
        for (event_type, handler) in handlers {
            let passive = with_config(|c| c.is_passive(&event_type));
            let weak = Rc::downgrade(self);
            let key = DedupeKey::named(format!("sensor-{:?}-{event_type}", self.id));
            let options = ListenerOptions {
                passive,
                once: false,
            };
            let id = self.target.add_event_listener(
                &event_type,
                move |event| Self::handle(&weak, &handler, event, passive, &key),
                options,
            );
            listeners.push(id);
        }
        *self.listeners.borrow_mut() = listeners;
        tracing::trace!(node = ?self.id, "sensor started");
    }

    fn handle(weak: &Weak<Self>, handler: &Handler<T>, event: &Event, passive: bool, key: &DedupeKey) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let next = {
            let previous = inner.value.borrow().clone();
            handler(&SensorEvent {
                event,
                target: &inner.target,
                previous: &previous,
            })
        };
        let Some(next) = next else {
            return;
        };
        if passive {
            let weak = Weak::clone(weak);
            schedule(
                move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.write(next);
                    }
                },
                Some(key.clone()),
            );
        } else {
            inner.write(next);
        }
    }

    fn stop(&self) {
        for id in self.listeners.borrow_mut().drain(..) {
            self.target.remove_event_listener(id);
        }
        self.started.set(false);
    }
}

impl<T> Drop for SensorInner<T> {
    fn drop(&mut self) {
        for id in self.listeners.borrow_mut().drain(..) {
            self.target.remove_event_listener(id);
        }
        Runtime::unregister(self.id);
    }
}

/// A signal driven by events on an element.
///
/// # Example
///
/// ```rust
/// use letruc_core::dom::Element;
/// use letruc_core::reactive::Sensor;
///
/// let button = Element::new("button");
/// let pressed = Sensor::new(&button, false)
///     .on("pointerdown", |_| Some(true))
///     .on("pointerup", |_| Some(false));
/// assert!(!pressed.get());
/// ```
pub struct Sensor<T: 'static> {
    inner: Rc<SensorInner<T>>,
}

impl<T> Sensor<T>
where
    T: Clone + PartialEq + 'static,
{
    pub fn new(target: &Element, initial: T) -> Self {
        Self::with_equals(target, initial, |a, b| a == b)
    }
}

impl<T> Sensor<T>
where
    T: Clone + 'static,
{
    pub fn with_equals(target: &Element, initial: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        let id = Runtime::register(Node::source().with_label("sensor"));
        Self {
            inner: Rc::new(SensorInner {
                id,
                target: target.clone(),
                value: RefCell::new(initial),
                equals: Box::new(equals),
                handlers: RefCell::default(),
                listeners: RefCell::default(),
                started: Cell::new(false),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Add a handler for `event_type`. Returning `None` keeps the value.
    ///
    /// Handlers added after the sensor started apply from the next start.
    pub fn on(self, event_type: &str, handler: impl Fn(&SensorEvent<'_, T>) -> Option<T> + 'static) -> Self {
        self.inner
            .handlers
            .borrow_mut()
            .push((event_type.to_string(), Rc::new(handler)));
        self
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Read the latest value, starting the listeners on first use.
    pub fn get(&self) -> T {
        self.inner.start();
        Runtime::track(self.inner.id);
        self.inner.value.borrow().clone()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }

    /// Remove the listeners. The sensor keeps its last value and never
    /// starts again.
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
        self.inner.stop();
    }
}

impl<T: Clone + 'static> Signal<T> for Sensor<T> {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn try_get(&self) -> Result<T> {
        Ok(self.get())
    }
}

impl<T> Clone for Sensor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Sensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("started", &self.is_started())
            .finish()
    }
}
