//! Collection Implementation
//!
//! A Collection is a live, ordered view of the elements under a root that
//! match a selector. A mutation observer on the root's subtree keeps it in
//! sync: after the observer's records are delivered (at the next microtask
//! checkpoint) membership matches the document again, without any manual
//! refresh.
//!
//! Reads are tracked like any signal. Membership changes notify dependents
//! and the `Add`/`Remove` listeners registered with [`Collection::on`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::effect::Cleanup;
use super::runtime::Runtime;
use super::signal::Signal;
use crate::dom::{Element, MutationObserver, MutationObserverInit, Node, Selector, WeakNode};
use crate::error::Result;
use crate::graph::{Node as GraphNode, NodeId};

/// Which membership change a listener wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionChange {
    Add,
    Remove,
}

type Listener = Rc<dyn Fn(&[Element])>;

struct CollectionInner {
    id: NodeId,
    root: WeakNode,
    selector: Selector,
    elements: RefCell<Vec<Element>>,
    observer: RefCell<Option<MutationObserver>>,
    listeners: RefCell<Vec<(u64, CollectionChange, Listener)>>,
    next_listener: Cell<u64>,
}

impl CollectionInner {
    fn query(&self) -> Vec<Element> {
        self.root
            .upgrade()
            .map(|root| root.select_all(&self.selector))
            .unwrap_or_default()
    }

    fn sync(&self) {
        let current = self.query();
        let (added, removed) = {
            let previous = self.elements.borrow();
            if *previous == current {
                return;
            }
            let added: Vec<Element> = current
                .iter()
                .filter(|e| !previous.contains(e))
                .cloned()
                .collect();
            let removed: Vec<Element> = previous
                .iter()
                .filter(|e| !current.contains(e))
                .cloned()
                .collect();
            (added, removed)
        };
        *self.elements.borrow_mut() = current;
        tracing::trace!(
            node = ?self.id,
            added = added.len(),
            removed = removed.len(),
            "collection changed"
        );

        self.emit(CollectionChange::Add, &added);
        self.emit(CollectionChange::Remove, &removed);
        Runtime::notify_signal_change(self.id);
    }

    fn emit(&self, change: CollectionChange, elements: &[Element]) {
        if elements.is_empty() {
            return;
        }
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, c, _)| *c == change)
            .map(|(_, _, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(elements);
        }
    }

    fn disconnect(&self) {
        if let Some(observer) = self.observer.borrow_mut().take() {
            observer.disconnect();
        }
    }
}

impl Drop for CollectionInner {
    fn drop(&mut self) {
        self.disconnect();
        Runtime::unregister(self.id);
    }
}

/// A live list of the elements matching a selector under a root.
#[derive(Clone)]
pub struct Collection {
    inner: Rc<CollectionInner>,
}

impl Collection {
    /// Observe `root` for elements matching `selector`. The collection does
    /// not keep `root` alive.
    pub fn new(root: &Node, selector: &str) -> Result<Self> {
        let selector = Selector::parse(selector)?;
        let id = Runtime::register(GraphNode::source().with_label("collection"));
        let inner = Rc::new(CollectionInner {
            id,
            root: root.downgrade(),
            elements: RefCell::new(root.select_all(&selector)),
            observer: RefCell::new(None),
            listeners: RefCell::default(),
            next_listener: Cell::new(0),
            selector,
        });

        let weak: Weak<CollectionInner> = Rc::downgrade(&inner);
        let observer = MutationObserver::new(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.sync();
            }
        });
        let attribute_filter = inner.selector.attribute_names();
        observer.observe(
            root,
            MutationObserverInit {
                child_list: true,
                subtree: true,
                attribute_filter: (!attribute_filter.is_empty()).then_some(attribute_filter),
                ..Default::default()
            },
        );
        *inner.observer.borrow_mut() = Some(observer);
        Ok(Self { inner })
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn selector(&self) -> &Selector {
        &self.inner.selector
    }

    /// The current elements in document order.
    pub fn get(&self) -> Vec<Element> {
        Runtime::track(self.inner.id);
        self.inner.elements.borrow().clone()
    }

    pub fn len(&self) -> usize {
        Runtime::track(self.inner.id);
        self.inner.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at(&self, index: usize) -> Option<Element> {
        Runtime::track(self.inner.id);
        self.inner.elements.borrow().get(index).cloned()
    }

    /// Stable keys: the `id` attribute when present, the node key otherwise.
    pub fn keys(&self) -> Vec<String> {
        Runtime::track(self.inner.id);
        self.inner.elements.borrow().iter().map(key_of).collect()
    }

    pub fn by_key(&self, key: &str) -> Option<Element> {
        Runtime::track(self.inner.id);
        self.inner
            .elements
            .borrow()
            .iter()
            .find(|e| key_of(e) == key)
            .cloned()
    }

    /// Call `listener` with the elements of every future change of kind
    /// `change`. The returned cleanup unsubscribes.
    pub fn on(&self, change: CollectionChange, listener: impl Fn(&[Element]) + 'static) -> Cleanup {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, change, Rc::new(listener)));

        let weak = Rc::downgrade(&self.inner);
        Cleanup::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(l, _, _)| *l != id);
            }
        })
    }

    /// Stop observing. The collection keeps its last membership.
    pub fn dispose(&self) {
        self.inner.disconnect();
        self.inner.listeners.borrow_mut().clear();
    }
}

/// The key a collection uses for `element`.
pub fn key_of(element: &Element) -> String {
    element
        .attribute("id")
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| element.key().to_string())
}

impl Signal<Vec<Element>> for Collection {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn try_get(&self) -> Result<Vec<Element>> {
        Ok(self.get())
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("selector", &self.inner.selector)
            .field("len", &self.inner.elements.borrow().len())
            .finish()
    }
}
