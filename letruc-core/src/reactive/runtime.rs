//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the dependency graph, runs batches, and flushes stale
//! effects when the outermost batch ends.
//!
//! # How It Works
//!
//! 1. Every signal, memo, and effect registers a node with the runtime.
//!
//! 2. When a memo or effect runs, the runtime records the sources it read,
//!    replacing the ones from its previous run.
//!
//! 3. When a source changes, the runtime:
//!    a. Marks direct observers dirty and everything downstream maybe-dirty
//!    b. Queues the effects that became stale
//!    c. Flushes the queue once no batch is open
//!    d. Memos are lazy - they recompute on next access
//!
//! # Threading
//!
//! The runtime is thread-local. Signals are `!Send`; each thread that uses
//! the library gets its own independent graph.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use super::context::{run_tracked, ReactiveContext};
use crate::config::with_config;
use crate::error::{Error, Result};
use crate::graph::{Computation, DirtyState, Edges, Node, NodeId, NodeKind, ReactiveGraph};

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

/// The per-thread reactive runtime.
pub struct Runtime {
    graph: RefCell<ReactiveGraph>,
    batch_depth: Cell<u32>,
    flushing: Cell<bool>,
    pending: RefCell<Vec<NodeId>>,
}

/// Snapshot of runtime counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub node_count: usize,
    pub pending_effects: usize,
    pub batch_depth: u32,
}

impl Runtime {
    fn new() -> Self {
        Self {
            graph: RefCell::new(ReactiveGraph::new()),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            pending: RefCell::new(Vec::new()),
        }
    }

    fn with<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
        RUNTIME.try_with(f).ok()
    }

    fn with_graph<R>(f: impl FnOnce(&mut ReactiveGraph) -> R) -> Option<R> {
        Self::with(|rt| f(&mut rt.graph.borrow_mut()))
    }

    /// Register a node with the runtime.
    pub fn register(node: Node) -> NodeId {
        Self::with_graph(|g| g.add_node(node)).unwrap_or_default()
    }

    /// Remove a node and all its edges.
    ///
    /// The node's computation (if owned by the graph) is dropped after the
    /// graph borrow is released.
    pub fn unregister(id: NodeId) {
        let removed = Self::with_graph(|g| g.remove_node(id)).flatten();
        drop(removed);
    }

    pub fn contains(id: NodeId) -> bool {
        Self::with_graph(|g| g.contains(id)).unwrap_or(false)
    }

    /// Record that the current computation read `id`.
    pub fn track(id: NodeId) {
        ReactiveContext::track_dependency(id);
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    pub fn label(id: NodeId) -> &'static str {
        Self::with_graph(|g| g.get_node(id).map(Node::label))
            .flatten()
            .unwrap_or("disposed node")
    }

    pub fn dirty_state(id: NodeId) -> Option<DirtyState> {
        Self::with_graph(|g| g.get_node(id).map(Node::dirty_state)).flatten()
    }

    pub fn is_computing(id: NodeId) -> bool {
        Self::with_graph(|g| g.get_node(id).is_some_and(Node::is_computing)).unwrap_or(false)
    }

    /// Number of computations currently depending on `id`.
    pub fn observer_count(id: NodeId) -> usize {
        Self::with_graph(|g| g.get_node(id).map_or(0, |n| n.observers().len())).unwrap_or(0)
    }

    /// Number of sources `id` read during its last run.
    pub fn source_count(id: NodeId) -> usize {
        Self::with_graph(|g| g.get_node(id).map_or(0, |n| n.sources().len())).unwrap_or(0)
    }

    pub fn stats() -> RuntimeStats {
        Self::with(|rt| RuntimeStats {
            node_count: rt.graph.borrow().node_count(),
            pending_effects: rt.pending.borrow().len(),
            batch_depth: rt.batch_depth.get(),
        })
        .unwrap_or(RuntimeStats {
            node_count: 0,
            pending_effects: 0,
            batch_depth: 0,
        })
    }

    /// Notify the graph that source `id` changed its value.
    ///
    /// Outside a batch this flushes stale effects before returning.
    pub fn notify_signal_change(id: NodeId) {
        let effects = Self::with_graph(|g| g.mark_changed(id)).unwrap_or_default();
        Self::enqueue(effects);
        Self::flush_if_idle();
    }

    /// Run `f` as the body of computation `id`.
    ///
    /// Fails with [`Error::CircularDependency`] if `id` is already on the
    /// stack. On success the node's sources are replaced by what `f` read and
    /// the node is marked clean.
    pub fn evaluate<R>(id: NodeId, f: impl FnOnce() -> R) -> Result<R> {
        let entered = Self::with_graph(|g| match g.get_node_mut(id) {
            Some(node) if node.is_computing() => Err(Error::CircularDependency {
                node: node.label().to_string(),
            }),
            Some(node) => {
                node.set_computing(true);
                Ok(())
            }
            None => Ok(()),
        })
        .unwrap_or(Ok(()));
        entered?;

        let _computing = ComputingGuard(id);
        let (result, deps) = run_tracked(Some(id), f);
        // A node never depends on itself.
        let deps: Edges = deps.into_iter().filter(|d| *d != id).collect();

        Self::with_graph(|g| {
            g.replace_sources(id, &deps);
            if let Some(node) = g.get_node_mut(id) {
                node.mark_clean();
            }
        });
        tracing::trace!(node = ?id, sources = deps.len(), "evaluated");
        Ok(result)
    }

    /// A derived node produced a different value: its observers must re-run.
    pub fn mark_observers_dirty(id: NodeId) {
        let effects = Self::with_graph(|g| g.mark_observers_dirty(id)).unwrap_or_default();
        Self::enqueue(effects);
    }

    /// Mark a derived node dirty without a source change (manual invalidation).
    pub fn invalidate(id: NodeId) {
        let effects = Self::with_graph(|g| {
            let mut effects = Vec::new();
            if let Some(node) = g.get_node_mut(id) {
                node.mark_dirty();
                if node.kind() == NodeKind::Effect {
                    effects.push(id);
                } else {
                    effects = g.mark_changed(id);
                }
            }
            effects
        })
        .unwrap_or_default();
        Self::enqueue(effects);
        Self::flush_if_idle();
    }

    /// Bring node `id` up to date.
    ///
    /// `MaybeDirty` nodes refresh their sources in order and stop at the
    /// first one that changed; if none changed the node is clean without
    /// re-running. `Dirty` nodes re-run.
    pub fn refresh(id: NodeId) -> Result<()> {
        let Some((state, kind, sources)) = Self::with_graph(|g| {
            g.get_node(id).map(|n| {
                let sources: SmallVec<[NodeId; 4]> = n.sources().iter().copied().collect();
                (n.dirty_state(), n.kind(), sources)
            })
        })
        .flatten() else {
            return Ok(());
        };

        if kind == NodeKind::Source || state == DirtyState::Clean {
            return Ok(());
        }

        if state == DirtyState::MaybeDirty {
            for source in sources {
                Self::refresh(source)?;
                if Self::dirty_state(id) == Some(DirtyState::Dirty) {
                    break;
                }
            }
            if Self::dirty_state(id) == Some(DirtyState::MaybeDirty) {
                Self::with_graph(|g| {
                    if let Some(node) = g.get_node_mut(id) {
                        node.mark_clean();
                    }
                });
                return Ok(());
            }
        }

        if Self::dirty_state(id) != Some(DirtyState::Dirty) {
            return Ok(());
        }

        let handler = Self::with_graph(|g| {
            g.get_node(id)
                .and_then(|n| n.handler.as_ref())
                .and_then(|h| h.get())
        })
        .flatten();
        match handler {
            Some(computation) => {
                computation.update()?;
            }
            None => {
                Self::with_graph(|g| {
                    if let Some(node) = g.get_node_mut(id) {
                        node.mark_clean();
                    }
                });
            }
        }
        Ok(())
    }

    fn enqueue(effects: Vec<NodeId>) {
        if effects.is_empty() {
            return;
        }
        Self::with(|rt| rt.pending.borrow_mut().extend(effects));
    }

    fn flush_if_idle() {
        let idle = Self::with(|rt| rt.batch_depth.get() == 0 && !rt.flushing.get()).unwrap_or(false);
        if idle {
            Self::flush();
        }
    }

    /// Run every queued effect that is still stale, in creation order.
    ///
    /// Effects that invalidate other effects are picked up by a further
    /// round, up to the configured maximum.
    pub fn flush() {
        let already = Self::with(|rt| rt.flushing.replace(true)).unwrap_or(true);
        if already {
            return;
        }
        let _flushing = FlushGuard;
        let max_rounds = with_config(|c| c.max_flush_rounds);
        let mut rounds = 0;

        loop {
            let mut queue = Self::with(|rt| std::mem::take(&mut *rt.pending.borrow_mut()))
                .unwrap_or_default();
            if queue.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > max_rounds {
                tracing::error!(
                    rounds,
                    dropped = queue.len(),
                    "effects kept invalidating each other; dropping the remaining queue"
                );
                break;
            }

            Self::with_graph(|g| {
                queue.retain(|id| g.contains(*id));
                queue.sort_by_key(|id| g.get_node(*id).map_or(u64::MAX, Node::order));
            });
            queue.dedup();
            tracing::trace!(round = rounds, effects = queue.len(), "flushing effects");

            for id in queue {
                if let Err(error) = Self::refresh(id) {
                    tracing::error!(%error, node = ?id, "effect failed to refresh");
                }
            }
        }
    }
}

/// Clears the computing flag of a node, also when its computation panics.
struct ComputingGuard(NodeId);

impl Drop for ComputingGuard {
    fn drop(&mut self) {
        Runtime::with_graph(|g| {
            if let Some(node) = g.get_node_mut(self.0) {
                node.set_computing(false);
            }
        });
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        Runtime::with(|rt| rt.flushing.set(false));
    }
}

struct BatchGuard;

impl BatchGuard {
    fn open() -> Self {
        Runtime::with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
        BatchGuard
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        Runtime::with(|rt| rt.batch_depth.set(rt.batch_depth.get().saturating_sub(1)));
    }
}

/// Run `f` with effect execution deferred until it returns.
///
/// Nested batches coalesce into the outermost one: every effect whose
/// dependencies changed inside the batch runs at most once, after the
/// outermost batch exits, and observes the final values.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let guard = BatchGuard::open();
    let result = f();
    drop(guard);
    Runtime::flush_if_idle();
    result
}

/// Register a computation owned by the graph, used for effects.
pub(crate) fn register_owned<C>(node: Node, build: impl FnOnce(NodeId) -> Rc<C>) -> Rc<C>
where
    C: Computation + 'static,
{
    let id = Runtime::register(node);
    let computation = build(id);
    let handler: Rc<dyn Computation> = computation.clone();
    Runtime::with_graph(|g| {
        if let Some(node) = g.get_node_mut(id) {
            node.handler = Some(crate::graph::Handler::Owned(handler));
        }
    });
    computation
}

/// Register a computation owned by its handle, used for memos and tasks.
pub(crate) fn attach_weak(id: NodeId, computation: std::rc::Weak<dyn Computation>) {
    Runtime::with_graph(|g| {
        if let Some(node) = g.get_node_mut(id) {
            node.handler = Some(crate::graph::Handler::Weak(computation));
        }
    });
}
