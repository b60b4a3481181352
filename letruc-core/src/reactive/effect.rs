//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued and re-runs when the
//!    current batch ends.
//!
//! 3. Each run replaces the dependency set of the previous run: an effect
//!    depends on exactly what it read last time.
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos are owned by their handles; effects are owned by the runtime
//!   until disposed.
//!
//! # Cleanup
//!
//! Effects can optionally return a [`Cleanup`]. It is called before the
//! effect re-runs and when the effect is disposed, exactly once each time.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::context::untrack;
use super::runtime::{register_owned, Runtime};
use crate::error::{Error, Result};
use crate::graph::{Computation, Node, NodeId};

/// A deferred teardown action.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    /// A cleanup that does nothing.
    pub fn noop() -> Self {
        Self(Box::new(|| {}))
    }

    /// Run the cleanup. Reads inside it are never tracked.
    pub fn run(self) {
        untrack(self.0);
    }

    /// Combine several cleanups into one that runs them in order.
    pub fn all(cleanups: impl IntoIterator<Item = Cleanup>) -> Self {
        let cleanups: Vec<Cleanup> = cleanups.into_iter().collect();
        Self::new(move || {
            for cleanup in cleanups {
                cleanup.run();
            }
        })
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// What an effect function may return.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

/// A failing run is logged; the effect stays subscribed and runs again when
/// its dependencies change.
impl<C: IntoCleanup> IntoCleanup for Result<C, Error> {
    fn into_cleanup(self) -> Option<Cleanup> {
        match self {
            Ok(c) => c.into_cleanup(),
            Err(error) => {
                tracing::error!(%error, "effect run failed");
                None
            }
        }
    }
}

type RunFn = Box<dyn FnMut() -> Option<Cleanup>>;

struct EffectInner {
    id: NodeId,
    run: RefCell<RunFn>,
    cleanup: RefCell<Option<Cleanup>>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
    }
}

impl Computation for EffectInner {
    fn update(&self) -> Result<bool> {
        if self.disposed.get() {
            return Ok(false);
        }
        self.run_cleanup();

        let cleanup = Runtime::evaluate(self.id, || {
            let mut run = self.run.borrow_mut();
            (*run)()
        })?;
        *self.cleanup.borrow_mut() = cleanup;
        self.run_count.set(self.run_count.get() + 1);
        tracing::trace!(node = ?self.id, runs = self.run_count.get(), "effect ran");
        Ok(false)
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use letruc_core::reactive::{Effect, State};
///
/// let count = State::new(0);
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies,
    /// also inside an open batch. It may return
    /// `()`, a [`Cleanup`], an `Option<Cleanup>`, or a `Result` of those.
    pub fn new<F, C>(mut run: F) -> Self
    where
        F: FnMut() -> C + 'static,
        C: IntoCleanup,
    {
        let inner = register_owned(Node::effect().with_label("effect"), |id| {
            Rc::new(EffectInner {
                id,
                run: RefCell::new(Box::new(move || run().into_cleanup())),
                cleanup: RefCell::new(None),
                disposed: Cell::new(false),
                run_count: Cell::new(0),
            })
        });
        let id = inner.id;

        if let Err(error) = Runtime::refresh(id) {
            tracing::error!(%error, "initial effect run failed");
        }
        Self { inner }
    }

    /// Get the effect's node id.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Dispose of the effect.
    ///
    /// Runs the last cleanup and unsubscribes from every dependency. After
    /// disposal the effect never runs again. Disposing twice is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.run_cleanup();
        Runtime::unregister(self.inner.id);
    }

    /// Turn the effect into a cleanup that disposes it.
    pub fn into_cleanup(self) -> Cleanup {
        Cleanup::new(move || self.dispose())
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies of the last run.
    pub fn dependency_count(&self) -> usize {
        Runtime::source_count(self.inner.id)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
