//! Node Arena
//!
//! The arena owns every node of the dependency graph and keeps both edge
//! directions consistent.
//!
//! # Algorithm
//!
//! Invalidation is push-based, re-evaluation is pull-based:
//!
//! 1. When a source changes, its direct observers become `Dirty`.
//! 2. Everything further downstream becomes `MaybeDirty`, recursively.
//! 3. Effects reached by the walk are returned to the caller for queueing.
//! 4. Nothing recomputes here. A node is brought up to date when it is read
//!    (or when a queued effect flushes): `MaybeDirty` nodes first refresh
//!    their sources and only re-run if one of them actually changed.
//!
//! Step 4 is what keeps diamonds to one evaluation per node.

use slotmap::SlotMap;

use super::node::{DirtyState, Edges, Node, NodeId, NodeKind};

/// Storage for all nodes of one reactive runtime.
pub struct ReactiveGraph {
    nodes: SlotMap<NodeId, Node>,
    next_order: u64,
}

impl ReactiveGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            next_order: 0,
        }
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.set_order(self.next_order);
        self.next_order += 1;
        self.nodes.insert(node)
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(node_id)?;

        for dep_id in node.sources() {
            if let Some(dep) = self.nodes.get_mut(*dep_id) {
                dep.remove_observer(node_id);
            }
        }

        for observer_id in node.observers() {
            if let Some(observer) = self.nodes.get_mut(*observer_id) {
                observer.remove_source(node_id);
            }
        }

        Some(node)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Add a dependency edge: `observer` depends on `source`.
    pub fn add_edge(&mut self, source: NodeId, observer: NodeId) {
        if !self.nodes.contains_key(source) || !self.nodes.contains_key(observer) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(source) {
            node.add_observer(observer);
        }
        if let Some(node) = self.nodes.get_mut(observer) {
            node.add_source(source);
        }
    }

    /// Remove a dependency edge.
    pub fn remove_edge(&mut self, source: NodeId, observer: NodeId) {
        if let Some(node) = self.nodes.get_mut(source) {
            node.remove_observer(observer);
        }
        if let Some(node) = self.nodes.get_mut(observer) {
            node.remove_source(source);
        }
    }

    /// Replace the complete source set of `observer`.
    ///
    /// Dependencies from the previous run are dropped, not merged.
    pub fn replace_sources(&mut self, observer: NodeId, sources: &[NodeId]) {
        let old = match self.nodes.get_mut(observer) {
            Some(node) => node.take_sources(),
            None => return,
        };
        for source in old {
            if let Some(node) = self.nodes.get_mut(source) {
                node.remove_observer(observer);
            }
        }
        for &source in sources {
            self.add_edge(source, observer);
        }
    }

    /// Mark a source node as changed and propagate dirty flags.
    ///
    /// Returns the effects that went from clean to stale, in no particular
    /// order.
    pub fn mark_changed(&mut self, source_id: NodeId) -> Vec<NodeId> {
        let mut effects = Vec::new();
        let direct: Edges = match self.nodes.get(source_id) {
            Some(node) => node.observers().iter().copied().collect(),
            None => return effects,
        };

        for observer_id in direct {
            self.mark(observer_id, DirtyState::Dirty, &mut effects);
        }
        effects
    }

    /// Mark the direct observers of a derived node whose value changed
    /// during re-evaluation.
    pub fn mark_observers_dirty(&mut self, node_id: NodeId) -> Vec<NodeId> {
        self.mark_changed(node_id)
    }

    fn mark(&mut self, node_id: NodeId, state: DirtyState, effects: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return;
        };
        let was_clean = node.is_clean();
        match state {
            DirtyState::Dirty => node.mark_dirty(),
            DirtyState::MaybeDirty => node.mark_maybe_dirty(),
            DirtyState::Clean => return,
        }
        if !was_clean {
            // Already stale: its downstream was marked when it went stale.
            return;
        }
        if node.kind() == NodeKind::Effect {
            effects.push(node_id);
            return;
        }
        let downstream: Edges = node.observers().iter().copied().collect();
        for observer_id in downstream {
            self.mark(observer_id, DirtyState::MaybeDirty, effects);
        }
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for ReactiveGraph {
    fn default() -> Self {
        Self::new()
    }
}
