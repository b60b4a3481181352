//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.

use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::error::Result;

new_key_type! {
    /// Unique identifier for a node in the dependency graph.
    ///
    /// Keys carry a generation counter, so a key kept by a disposed observer
    /// never aliases a newer node that reused the slot.
    pub struct NodeId;
}

/// Edge list of a node. Most nodes have a handful of edges.
pub type Edges = SmallVec<[NodeId; 4]>;

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (state, sensor, collection). Sources have no
    /// dependencies, only dependents.
    Source,

    /// A derived node (memo, task). These have dependencies and may have
    /// dependents. They cache their computed value.
    Derived,

    /// An effect node. These are leaves of the graph.
    Effect,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The node's value is up-to-date.
    Clean,

    /// A transitive dependency changed. The direct sources must be brought
    /// up to date before we know whether this node has to re-run.
    MaybeDirty,

    /// A direct source changed. The node has to re-run.
    Dirty,
}

/// Something the graph can ask to re-evaluate.
///
/// Implemented by memos, tasks, and effects. `update` returns whether the
/// node's observable value changed, which decides if its observers must
/// re-run too. Effects always report `false`.
pub trait Computation {
    fn update(&self) -> Result<bool>;
}

/// How a node refers to its computation.
pub(crate) enum Handler {
    /// The handle owns the computation (memos): dropping the handle drops
    /// the node.
    Weak(Weak<dyn Computation>),
    /// The graph owns the computation until it is disposed (effects).
    Owned(Rc<dyn Computation>),
}

impl Handler {
    pub(crate) fn get(&self) -> Option<Rc<dyn Computation>> {
        match self {
            Handler::Weak(weak) => weak.upgrade(),
            Handler::Owned(rc) => Some(Rc::clone(rc)),
        }
    }
}

/// A node in the dependency graph.
pub struct Node {
    kind: NodeKind,
    dirty: DirtyState,

    /// Nodes this node read during its last run.
    sources: Edges,

    /// Nodes that read this node during their last run.
    observers: Edges,

    /// Set while the node's computation is on the stack.
    computing: bool,

    /// Creation order. Effects flush in this order.
    order: u64,

    /// Human readable name used in errors and logs.
    label: &'static str,

    pub(crate) handler: Option<Handler>,
}

impl Node {
    /// Create a new node with the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            dirty: match kind {
                NodeKind::Source => DirtyState::Clean,
                // Start dirty to ensure first computation
                NodeKind::Derived | NodeKind::Effect => DirtyState::Dirty,
            },
            sources: Edges::new(),
            observers: Edges::new(),
            computing: false,
            order: 0,
            label: match kind {
                NodeKind::Source => "source",
                NodeKind::Derived => "derived",
                NodeKind::Effect => "effect",
            },
            handler: None,
        }
    }

    /// Create a new source node.
    pub fn source() -> Self {
        Self::new(NodeKind::Source)
    }

    /// Create a new derived node.
    pub fn derived() -> Self {
        Self::new(NodeKind::Derived)
    }

    /// Create a new effect node.
    pub fn effect() -> Self {
        Self::new(NodeKind::Effect)
    }

    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub(crate) fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn order(&self) -> u64 {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: u64) {
        self.order = order;
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Mark the node as maybe dirty. Never downgrades `Dirty`.
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn is_computing(&self) -> bool {
        self.computing
    }

    pub(crate) fn set_computing(&mut self, computing: bool) {
        self.computing = computing;
    }

    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub fn observers(&self) -> &[NodeId] {
        &self.observers
    }

    pub(crate) fn add_source(&mut self, id: NodeId) {
        if !self.sources.contains(&id) {
            self.sources.push(id);
        }
    }

    pub(crate) fn remove_source(&mut self, id: NodeId) {
        self.sources.retain(|s| *s != id);
    }

    pub(crate) fn take_sources(&mut self) -> Edges {
        std::mem::take(&mut self.sources)
    }

    pub(crate) fn add_observer(&mut self, id: NodeId) {
        if !self.observers.contains(&id) {
            self.observers.push(id);
        }
    }

    pub(crate) fn remove_observer(&mut self, id: NodeId) {
        self.observers.retain(|o| *o != id);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("dirty", &self.dirty)
            .field("sources", &self.sources.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_node_starts_clean() {
        let node = Node::source();
        assert_eq!(node.kind(), NodeKind::Source);
        assert!(node.is_clean());
    }

    #[test]
    fn derived_node_starts_dirty() {
        let node = Node::derived();
        assert_eq!(node.kind(), NodeKind::Derived);
        assert_eq!(node.dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn maybe_dirty_never_downgrades_dirty() {
        let mut node = Node::derived();
        node.mark_maybe_dirty();
        assert_eq!(node.dirty_state(), DirtyState::Dirty);

        node.mark_clean();
        node.mark_maybe_dirty();
        assert_eq!(node.dirty_state(), DirtyState::MaybeDirty);
    }

    #[test]
    fn edges_are_deduplicated() {
        let mut arena = slotmap::SlotMap::<NodeId, ()>::with_key();
        let a = arena.insert(());
        let b = arena.insert(());

        let mut node = Node::effect();
        node.add_source(a);
        node.add_source(a);
        node.add_source(b);
        assert_eq!(node.sources(), &[a, b]);

        node.remove_source(a);
        assert_eq!(node.sources(), &[b]);
    }
}
