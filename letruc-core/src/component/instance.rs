//! Component Instances
//!
//! One [`ComponentInner`] lives in each upgraded element of a defined
//! component, installed through the custom element registry. It owns the
//! property slots, the ui, and the cleanup of the effects attached on the
//! last connect.
//!
//! # Lifecycle
//!
//! ```text
//! Unattached --connect--> Connected --disconnect--> Disconnected
//!                             ^                          |
//!                             +---------connect----------+
//! ```
//!
//! The first successful connect resolves the properties and builds the ui;
//! later connects reuse both. Every connect runs `setup` and attaches its
//! effects; every disconnect runs their cleanup.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::define::{attribute_name, Definition, Setup};
use super::parsers::parse_like;
use super::props::Initializer;
use super::slot::SignalSlot;
use super::ui::{Queries, Ui, UiEntry, HOST};
use crate::dom::registry::{self, CustomElementHooks};
use crate::dom::{Element, NodeKey, PropertyAccessor};
use crate::effects::{run_effects, Effects};
use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::reactive::{untrack, AnySignal, Cleanup, Collection, CollectionChange, Memo, State};
use crate::value::Value;

thread_local! {
    /// Signal initializers bound to a live instance, by signal id.
    static BINDINGS: RefCell<HashMap<NodeId, NodeKey>> = RefCell::new(HashMap::new());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unattached,
    Connected,
    Disconnected,
}

pub(crate) struct ComponentInner {
    definition: Rc<Definition>,
    key: NodeKey,
    this: Weak<ComponentInner>,
    lifecycle: Cell<Lifecycle>,
    resolved: Cell<bool>,
    slots: RefCell<IndexMap<String, Rc<SignalSlot>>>,
    ui: RefCell<Option<Ui>>,
    pending_values: RefCell<IndexMap<String, Value>>,
    pending_passes: RefCell<IndexMap<String, AnySignal<Value>>>,
    cleanup: RefCell<Option<Cleanup>>,
    last_error: RefCell<Option<Error>>,
}

impl ComponentInner {
    pub(crate) fn install(definition: &Rc<Definition>, element: &Element) -> Rc<Self> {
        let inner = Rc::new_cyclic(|this| Self {
            definition: Rc::clone(definition),
            key: element.key(),
            this: Weak::clone(this),
            lifecycle: Cell::new(Lifecycle::Unattached),
            resolved: Cell::new(false),
            slots: RefCell::default(),
            ui: RefCell::new(None),
            pending_values: RefCell::default(),
            pending_passes: RefCell::default(),
            cleanup: RefCell::new(None),
            last_error: RefCell::new(None),
        });
        for name in definition.props.names() {
            element.define_property(
                name,
                Rc::new(PropAccessor {
                    inner: Rc::downgrade(&inner),
                    name: name.to_string(),
                }),
            );
        }
        inner
    }

    fn component(&self, element: &Element) -> Option<Component> {
        self.this.upgrade().map(|inner| Component {
            element: element.clone(),
            inner,
        })
    }

    fn slot(&self, name: &str) -> Option<Rc<SignalSlot>> {
        self.slots.borrow().get(name).cloned()
    }

    fn bind_signals(&self) -> Result<()> {
        for (name, init) in self.definition.props.iter() {
            let Initializer::Signal(signal) = init else {
                continue;
            };
            let id = signal.id();
            let owner = BINDINGS.with(|b| {
                let mut bindings = b.borrow_mut();
                match bindings.get(&id) {
                    Some(owner) if *owner != self.key => Some(*owner),
                    _ => {
                        bindings.insert(id, self.key);
                        None
                    }
                }
            });
            if let Some(owner) = owner {
                self.unbind_signals();
                return Err(Error::InvalidReactives {
                    component: self.definition.name.clone(),
                    reason: format!("signal of \"{name}\" is already bound to live instance {owner}"),
                });
            }
        }
        Ok(())
    }

    fn unbind_signals(&self) {
        let _ = BINDINGS.try_with(|b| b.borrow_mut().retain(|_, owner| *owner != self.key));
    }

    fn fail(&self, error: Error) {
        tracing::error!(component = %self.definition.name, %error, "component failed to connect");
        *self.last_error.borrow_mut() = Some(error);
    }
}

impl CustomElementHooks for ComponentInner {
    fn connected(&self, element: &Element) {
        self.lifecycle.set(Lifecycle::Connected);
        let Some(component) = self.component(element) else {
            return;
        };
        match untrack(|| component.attach()) {
            Ok(()) => {
                self.last_error.borrow_mut().take();
                tracing::debug!(component = %self.definition.name, node = %self.key, "component connected");
            }
            Err(error) => self.fail(error),
        }
    }

    fn disconnected(&self, _element: &Element) {
        self.lifecycle.set(Lifecycle::Disconnected);
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
        self.unbind_signals();
        tracing::debug!(component = %self.definition.name, node = %self.key, "component disconnected");
    }

    fn attribute_changed(&self, element: &Element, name: &str, _old: Option<&str>, new: Option<&str>) {
        if !self.resolved.get() {
            return;
        }
        let parser = self
            .definition
            .props
            .iter()
            .find(|(prop, _)| attribute_name(prop) == name)
            .and_then(|(prop, init)| match init {
                Initializer::Parser(parser) => Some((prop.to_string(), Rc::clone(parser))),
                _ => None,
            });
        let (Some((prop, parser)), Some(ui)) = (parser, self.ui.borrow().clone()) else {
            return;
        };
        let Some(slot) = self.slot(&prop) else {
            return;
        };
        let previous = slot.get_untracked().ok();
        let value = untrack(|| parser(&ui, new, previous.as_ref()));
        if let Err(error) = slot.set(value) {
            tracing::warn!(
                component = %self.definition.name,
                tag = element.tag_name(),
                %prop,
                %error,
                "parsed attribute rejected"
            );
        }
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl Drop for ComponentInner {
    fn drop(&mut self) {
        if let Some(ui) = self.ui.get_mut().take() {
            ui.dispose();
        }
        self.unbind_signals();
    }
}

struct PropAccessor {
    inner: Weak<ComponentInner>,
    name: String,
}

impl PropAccessor {
    fn component(&self, element: &Element) -> Result<Component> {
        self.inner
            .upgrade()
            .map(|inner| Component {
                element: element.clone(),
                inner,
            })
            .ok_or_else(|| Error::DetachedComponent {
                component: element.tag_name().to_string(),
            })
    }
}

impl PropertyAccessor for PropAccessor {
    fn get(&self, element: &Element) -> Result<Value> {
        self.component(element)?.get(&self.name)
    }

    fn set(&self, element: &Element, value: Value) -> Result<()> {
        self.component(element)?.set(&self.name, value)
    }
}

/// Handle to a component instance: its host element and its state.
#[derive(Clone)]
pub struct Component {
    element: Element,
    inner: Rc<ComponentInner>,
}

impl Component {
    /// The component upgraded into `element`, if it is one.
    pub fn from_element(element: &Element) -> Option<Self> {
        let inner = registry::hooks(element)?
            .into_any()
            .downcast::<ComponentInner>()
            .ok()?;
        Some(Self {
            element: element.clone(),
            inner,
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.definition.name
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.get()
    }

    /// The error of the last failed connect, cleared by a successful one.
    pub fn error(&self) -> Option<Error> {
        self.inner.last_error.borrow().clone()
    }

    pub fn ui(&self) -> Option<Ui> {
        self.inner.ui.borrow().clone()
    }

    pub fn has_prop(&self, name: &str) -> bool {
        self.inner.definition.props.get(name).is_some()
    }

    pub fn prop_names(&self) -> Vec<String> {
        self.inner.definition.props.names().map(String::from).collect()
    }

    fn unknown(&self, name: &str) -> Error {
        Error::InvalidPropertyName {
            component: self.name().to_string(),
            prop: name.to_string(),
            reason: "is not a declared property",
        }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}.{name}", self.name())
    }

    /// Read a property. Tracked once the component is resolved.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(slot) = self.inner.slot(name) {
            return slot.get();
        }
        let init = self
            .inner
            .definition
            .props
            .get(name)
            .ok_or_else(|| self.unknown(name))?;
        if let Some(value) = self.inner.pending_values.borrow().get(name) {
            return Ok(value.clone());
        }
        Ok(match init {
            Initializer::Value(initial) => self
                .element
                .attribute(&attribute_name(name))
                .map_or_else(|| initial.clone(), |attr| parse_like(initial, &attr)),
            _ => Value::Null,
        })
    }

    /// Write a property.
    ///
    /// Nullish values, values of another kind than the current one, and
    /// writes to read-only signals are rejected. Before the first connect
    /// the value is kept and applied at resolution.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if !self.has_prop(name) {
            return Err(self.unknown(name));
        }
        if value.is_nullish() {
            return Err(Error::NullishSignalValue {
                name: self.qualified(name),
            });
        }
        let Some(slot) = self.inner.slot(name) else {
            self.inner
                .pending_values
                .borrow_mut()
                .insert(name.to_string(), value);
            return Ok(());
        };
        if !slot.is_writable() {
            return Err(Error::ReadonlySignal {
                name: self.qualified(name),
            });
        }
        let current = slot.get_untracked()?;
        if !current.is_nullish() && current.kind() != value.kind() {
            return Err(Error::InvalidSignalValue {
                name: self.qualified(name),
                reason: format!("expected {}, got {}", current.kind(), value.kind()),
            });
        }
        slot.set(value)
    }

    /// The property as a signal that reads and writes through its slot.
    pub fn signal(&self, name: &str) -> Option<AnySignal<Value>> {
        self.inner
            .slot(name)
            .map(|slot| -> AnySignal<Value> { Rc::new(slot) })
    }

    /// Back the descendant property `name` with `signal` until
    /// [`restore`](Self::restore).
    pub(crate) fn pass_signal(&self, name: &str, signal: AnySignal<Value>) -> Result<()> {
        if !self.has_prop(name) {
            return Err(Error::InvalidReactives {
                component: self.name().to_string(),
                reason: format!("no property named \"{name}\""),
            });
        }
        match self.inner.slot(name) {
            Some(slot) => slot.replace(signal),
            None => {
                self.inner
                    .pending_passes
                    .borrow_mut()
                    .insert(name.to_string(), signal);
            }
        }
        tracing::debug!(component = self.name(), prop = name, "signal passed");
        Ok(())
    }

    pub(crate) fn restore(&self, name: &str) {
        self.inner.pending_passes.borrow_mut().shift_remove(name);
        if let Some(slot) = self.inner.slot(name) {
            slot.restore();
        }
        tracing::debug!(component = self.name(), prop = name, "signal restored");
    }

    fn attach(&self) -> Result<()> {
        let definition = Rc::clone(&self.inner.definition);
        if self.inner.resolved.get() {
            self.inner.bind_signals()?;
        } else {
            let mut queries = Queries::new(&definition.name, &self.element);
            (definition.select)(&mut queries)?;
            let ui = queries.finish();
            if let Err(error) = self.resolve(&ui) {
                ui.dispose();
                return Err(error);
            }
            *self.inner.ui.borrow_mut() = Some(ui);
        }

        let Some(ui) = self.ui() else {
            return Ok(());
        };
        let setup = (definition.setup)(&ui);
        let cleanup = self.attach_setup(&ui, setup)?;
        *self.inner.cleanup.borrow_mut() = Some(cleanup);
        Ok(())
    }

    fn resolve(&self, ui: &Ui) -> Result<()> {
        let mut slots = IndexMap::new();
        for (name, init) in self.inner.definition.props.iter() {
            let attr = self.element.attribute(&attribute_name(name));
            let signal: AnySignal<Value> = match init {
                Initializer::Value(initial) => Rc::new(State::new(
                    attr.map_or_else(|| initial.clone(), |a| parse_like(initial, &a)),
                )),
                Initializer::Signal(signal) => Rc::clone(signal),
                Initializer::Parser(parser) => Rc::new(State::new(parser(ui, attr.as_deref(), None))),
                Initializer::Reader(reader) => {
                    let (reader, ui) = (Rc::clone(reader), ui.clone());
                    Rc::new(Memo::try_new(move || reader(&ui)))
                }
                Initializer::Producer(producer) => producer(ui)?,
            };
            slots.insert(name.to_string(), SignalSlot::new(name, signal));
        }
        self.inner.bind_signals()?;
        *self.inner.slots.borrow_mut() = slots;
        self.inner.resolved.set(true);

        let values = std::mem::take(&mut *self.inner.pending_values.borrow_mut());
        for (name, value) in values {
            if let Err(error) = self.set(&name, value) {
                tracing::warn!(component = self.name(), prop = %name, %error, "early property write rejected");
            }
        }
        let passes = std::mem::take(&mut *self.inner.pending_passes.borrow_mut());
        for (name, signal) in passes {
            if let Some(slot) = self.inner.slot(&name) {
                slot.replace(signal);
            }
        }
        tracing::debug!(component = self.name(), props = self.inner.slots.borrow().len(), "properties resolved");
        Ok(())
    }

    fn attach_setup(&self, ui: &Ui, setup: Setup) -> Result<Cleanup> {
        let entries = setup.into_entries();
        if let Some(key) = entries.keys().find(|key| !ui.has(key)) {
            return Err(Error::InvalidEffects {
                component: self.name().to_string(),
                reason: format!("no ui entry named \"{key}\""),
            });
        }

        let mut cleanups = Vec::with_capacity(entries.len());
        for (key, effects) in entries {
            let attached = match ui.entry(&key) {
                _ if key == HOST => run_effects(&effects, self, &self.element),
                Some(UiEntry::One(Some(target))) => run_effects(&effects, self, target),
                Some(UiEntry::All(collection)) => self.attach_all(collection, effects),
                Some(UiEntry::One(None)) | None => Ok(Cleanup::noop()),
            };
            match attached {
                Ok(cleanup) => cleanups.push(cleanup),
                Err(error) => {
                    Cleanup::all(cleanups).run();
                    return Err(error);
                }
            }
        }
        Ok(Cleanup::all(cleanups))
    }

    /// Attach `effects` to every element of `collection`, now and as
    /// elements join. Elements that leave get their effects cleaned up.
    fn attach_all(&self, collection: &Collection, effects: Effects) -> Result<Cleanup> {
        let attached: Rc<RefCell<IndexMap<NodeKey, Cleanup>>> = Rc::default();
        for target in collection.get() {
            match run_effects(&effects, self, &target) {
                Ok(cleanup) => {
                    attached.borrow_mut().insert(target.key(), cleanup);
                }
                Err(error) => {
                    let partial = std::mem::take(&mut *attached.borrow_mut());
                    Cleanup::all(partial.into_values()).run();
                    return Err(error);
                }
            }
        }

        let on_add = collection.on(CollectionChange::Add, {
            let (host, attached) = (self.clone(), Rc::clone(&attached));
            move |targets| {
                for target in targets {
                    match untrack(|| run_effects(&effects, &host, target)) {
                        Ok(cleanup) => {
                            attached.borrow_mut().insert(target.key(), cleanup);
                        }
                        Err(error) => {
                            tracing::error!(component = host.name(), %error, "effects failed on added element")
                        }
                    }
                }
            }
        });
        let on_remove = collection.on(CollectionChange::Remove, {
            let attached = Rc::clone(&attached);
            move |targets| {
                for target in targets {
                    let cleanup = attached.borrow_mut().shift_remove(&target.key());
                    if let Some(cleanup) = cleanup {
                        cleanup.run();
                    }
                }
            }
        });
        Ok(Cleanup::new(move || {
            on_add.run();
            on_remove.run();
            let remaining = std::mem::take(&mut *attached.borrow_mut());
            Cleanup::all(remaining.into_values()).run();
        }))
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name())
            .field("node", &self.inner.key)
            .field("lifecycle", &self.lifecycle())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
