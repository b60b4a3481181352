//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or effect), we push
//! a frame onto the stack. When the computation completes, the guard pops it,
//! even if the computation panicked.
//!
//! This design supports nested reactive contexts (e.g., a memo that reads
//! from another memo).

use std::cell::RefCell;

use crate::graph::{Edges, NodeId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The computation this frame belongs to, if any.
    observer: Option<NodeId>,
    /// Whether reads inside this frame are recorded.
    tracking: bool,
    /// Sources read during this frame, each recorded once.
    dependencies: Edges,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    depth: usize,
}

impl ReactiveContext {
    /// Enter a new tracking frame for the given observer.
    ///
    /// While this context is active, any signal that is read is recorded as
    /// a dependency of the frame. The frame is popped when the returned
    /// guard is dropped.
    pub fn enter(observer: Option<NodeId>) -> Self {
        Self::push(observer, true)
    }

    /// Enter a frame in which reads are not recorded.
    pub fn untracked() -> Self {
        Self::push(None, false)
    }

    fn push(observer: Option<NodeId>, tracking: bool) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(ContextEntry {
                observer,
                tracking,
                dependencies: Edges::new(),
            });
            stack.len()
        });
        Self { depth }
    }

    /// Check if reads are currently being recorded.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().last().is_some_and(|e| e.tracking))
    }

    /// Get the computation of the innermost frame, if any.
    pub fn current_observer() -> Option<NodeId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|entry| entry.tracking)
                .and_then(|entry| entry.observer)
        })
    }

    /// Record a dependency on the given node.
    ///
    /// Called by signals when they are read. Reads outside any frame are
    /// simply not recorded.
    pub fn track_dependency(source: NodeId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.tracking && !entry.dependencies.contains(&source) {
                    entry.dependencies.push(source);
                }
            }
        });
    }

    /// Get the dependencies collected in the current frame.
    pub fn get_dependencies() -> Edges {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext dropped out of order"
            );
            stack.truncate(self.depth.saturating_sub(1));
        });
    }
}

/// Run `f` inside a fresh tracking frame and return its result together with
/// every source it read.
pub fn run_tracked<R>(observer: Option<NodeId>, f: impl FnOnce() -> R) -> (R, Edges) {
    let _ctx = ReactiveContext::enter(observer);
    let result = f();
    (result, ReactiveContext::get_dependencies())
}

/// Run `f` without recording any of its reads.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}
