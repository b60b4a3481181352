//! Mutation Observers
//!
//! Tree and attribute changes are recorded synchronously and delivered to
//! interested observers in one batch at the next microtask checkpoint.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::event_loop::queue_microtask;
use super::node::{Node, WeakNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
}

#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: Node,
    pub added_nodes: Vec<Node>,
    pub removed_nodes: Vec<Node>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
    /// Only report these attributes. Implies `attributes`.
    pub attribute_filter: Option<Vec<String>>,
    pub attribute_old_value: bool,
}

pub(crate) struct Registration {
    observer: Weak<ObserverInner>,
    init: MutationObserverInit,
}

type Callback = Box<dyn Fn(&[MutationRecord])>;

struct ObserverInner {
    callback: Callback,
    queue: RefCell<Vec<MutationRecord>>,
    scheduled: Cell<bool>,
    targets: RefCell<Vec<WeakNode>>,
}

/// Observes mutations on one or more nodes.
#[derive(Clone)]
pub struct MutationObserver(Rc<ObserverInner>);

impl MutationObserver {
    pub fn new(callback: impl Fn(&[MutationRecord]) + 'static) -> Self {
        MutationObserver(Rc::new(ObserverInner {
            callback: Box::new(callback),
            queue: RefCell::default(),
            scheduled: Cell::new(false),
            targets: RefCell::default(),
        }))
    }

    /// Start observing `target`. Observing the same target again replaces
    /// the options.
    pub fn observe(&self, target: &Node, init: MutationObserverInit) {
        let mut registrations = target.0.registrations.borrow_mut();
        registrations.retain(|r| r.observer.strong_count() > 0);
        match registrations
            .iter_mut()
            .find(|r| r.observer.as_ptr() == Rc::as_ptr(&self.0))
        {
            Some(existing) => existing.init = init,
            None => {
                registrations.push(Registration {
                    observer: Rc::downgrade(&self.0),
                    init,
                });
                self.0.targets.borrow_mut().push(target.downgrade());
            }
        }
    }

    /// Stop observing every target and drop undelivered records.
    pub fn disconnect(&self) {
        let targets = std::mem::take(&mut *self.0.targets.borrow_mut());
        for target in targets.iter().filter_map(WeakNode::upgrade) {
            target
                .0
                .registrations
                .borrow_mut()
                .retain(|r| r.observer.as_ptr() != Rc::as_ptr(&self.0));
        }
        self.0.queue.borrow_mut().clear();
    }

    /// Take the undelivered records.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.0.queue.borrow_mut())
    }
}

fn deliver(observer: &Weak<ObserverInner>) {
    let Some(observer) = observer.upgrade() else {
        return;
    };
    observer.scheduled.set(false);
    let records = std::mem::take(&mut *observer.queue.borrow_mut());
    if !records.is_empty() {
        (observer.callback)(&records);
    }
}

/// Queue `record` for every observer registered on `target`, or on an
/// ancestor with `subtree`, whose options accept it.
fn enqueue(target: &Node, record: MutationRecord, accepts: impl Fn(&MutationObserverInit) -> bool) {
    let mut interested: Vec<(Rc<ObserverInner>, bool)> = Vec::new();
    let mut node = Some(target.clone());
    let mut is_target = true;
    while let Some(current) = node {
        for registration in current.0.registrations.borrow().iter() {
            if !(is_target || registration.init.subtree) || !accepts(&registration.init) {
                continue;
            }
            let Some(observer) = registration.observer.upgrade() else {
                continue;
            };
            if !interested.iter().any(|(o, _)| Rc::ptr_eq(o, &observer)) {
                interested.push((observer, registration.init.attribute_old_value));
            }
        }
        node = current.parent();
        is_target = false;
    }

    for (observer, keep_old_value) in interested {
        let mut record = record.clone();
        if record.kind == MutationKind::Attributes && !keep_old_value {
            record.old_value = None;
        }
        observer.queue.borrow_mut().push(record);
        if !observer.scheduled.replace(true) {
            let weak = Rc::downgrade(&observer);
            queue_microtask(move || deliver(&weak));
        }
    }
}

pub(crate) fn queue_child_list(target: &Node, added: Vec<Node>, removed: Vec<Node>) {
    let record = MutationRecord {
        kind: MutationKind::ChildList,
        target: target.clone(),
        added_nodes: added,
        removed_nodes: removed,
        attribute_name: None,
        old_value: None,
    };
    enqueue(target, record, |init| init.child_list);
}

pub(crate) fn queue_attribute(target: &Node, name: &str, old_value: Option<String>) {
    let record = MutationRecord {
        kind: MutationKind::Attributes,
        target: target.clone(),
        added_nodes: Vec::new(),
        removed_nodes: Vec::new(),
        attribute_name: Some(name.to_string()),
        old_value,
    };
    enqueue(target, record, |init| {
        match &init.attribute_filter {
            Some(filter) => filter.iter().any(|f| f.eq_ignore_ascii_case(name)),
            None => init.attributes,
        }
    });
}
