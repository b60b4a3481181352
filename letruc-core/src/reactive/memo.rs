//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. Nothing runs at construction. On first access, the memo runs its
//!    computation inside a tracking frame and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a direct dependency changes, the memo is marked dirty; when a
//!    dependency further upstream changes, it is marked maybe-dirty.
//!
//! 4. On next access, a maybe-dirty memo first brings its sources up to date
//!    and recomputes only if one of them actually produced a new value.
//!
//! 5. A recomputation that yields a value equal to the cached one does not
//!    invalidate the memo's own dependents.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)
//!
//! It also keeps diamonds cheap: in `a -> (b, c) -> d`, one write to `a`
//! recomputes `b`, `c`, and `d` once each.
//!
//! # Errors
//!
//! A memo that reads itself, directly or through other memos, fails with
//! [`Error::CircularDependency`] instead of looping. Errors are cached like
//! values, so a memo keeps failing until one of its sources changes.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::{attach_weak, Runtime};
use super::signal::Signal;
use crate::error::{Error, Result};
use crate::graph::{Computation, DirtyState, Node, NodeId};

type ComputeFn<T> = Box<dyn Fn() -> Result<T>>;

struct MemoInner<T> {
    id: NodeId,
    compute: ComputeFn<T>,
    value: RefCell<Option<Result<T>>>,
    equals: Box<dyn Fn(&T, &T) -> bool>,
    run_count: Cell<usize>,
}

impl<T: Clone + 'static> MemoInner<T> {
    fn store(&self, next: Result<T>) -> bool {
        let changed = match (&*self.value.borrow(), &next) {
            (Some(Ok(old)), Ok(new)) => !(self.equals)(old, new),
            (Some(Err(old)), Err(new)) => old != new,
            _ => true,
        };
        *self.value.borrow_mut() = Some(next);
        changed
    }
}

impl<T: Clone + 'static> Computation for MemoInner<T> {
    fn update(&self) -> Result<bool> {
        let next = Runtime::evaluate(self.id, || (self.compute)())?;
        self.run_count.set(self.run_count.get() + 1);

        let changed = self.store(next);
        if changed {
            Runtime::mark_observers_dirty(self.id);
        }
        tracing::trace!(node = ?self.id, changed, "memo recomputed");
        Ok(changed)
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust
/// use letruc_core::reactive::{Memo, State};
///
/// let count = State::new(2);
/// let doubled = Memo::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), Ok(4));
///
/// count.set(5);
/// assert_eq!(doubled.get(), Ok(10));
/// ```
pub struct Memo<T: 'static> {
    inner: Rc<MemoInner<T>>,
}

/// Alias kept for readers coming from other signal libraries.
pub type Computed<T> = Memo<T>;

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::try_new(move || Ok(compute()))
    }

    /// Create a memo whose computation can fail, typically because it reads
    /// other memos with `?`.
    pub fn try_new(compute: impl Fn() -> Result<T> + 'static) -> Self {
        Self::with_equals(compute, |a, b| a == b)
    }
}

impl<T> Memo<T>
where
    T: Clone + 'static,
{
    /// Create a memo with a custom equality used for change cut-off.
    pub fn with_equals(
        compute: impl Fn() -> Result<T> + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self {
        let id = Runtime::register(Node::derived().with_label("memo"));
        let inner = Rc::new(MemoInner {
            id,
            compute: Box::new(compute),
            value: RefCell::new(None),
            equals: Box::new(equals),
            run_count: Cell::new(0),
        });
        let computation: Rc<dyn Computation> = inner.clone();
        attach_weak(id, Rc::downgrade(&computation));
        Self { inner }
    }

    /// Get the memo's node id.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> Result<T> {
        let id = self.inner.id;
        if Runtime::is_computing(id) {
            return Err(Error::CircularDependency {
                node: Runtime::label(id).to_string(),
            });
        }
        Runtime::track(id);
        Runtime::refresh(id)?;

        if let Some(value) = self.inner.value.borrow().as_ref() {
            return value.clone();
        }

        // Not registered with a live runtime: compute in place.
        let value = (self.inner.compute)();
        self.inner.store(value.clone());
        value
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> Result<T> {
        super::context::untrack(|| self.get())
    }

    /// Force recomputation on the next read.
    pub fn mark_dirty(&self) {
        Runtime::invalidate(self.inner.id);
    }

    /// Get the current dirty state.
    pub fn state(&self) -> DirtyState {
        Runtime::dirty_state(self.inner.id).unwrap_or(DirtyState::Dirty)
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Number of times the computation ran.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of sources read during the last computation.
    pub fn dependency_count(&self) -> usize {
        Runtime::source_count(self.inner.id)
    }

    /// Number of computations depending on this memo.
    pub fn dependent_count(&self) -> usize {
        Runtime::observer_count(self.inner.id)
    }
}

impl<T: Clone + 'static> Signal<T> for Memo<T> {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn try_get(&self) -> Result<T> {
        self.get()
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, Effect, State};

    #[test]
    fn memo_computes_on_first_access() {
        let memo = Memo::new(|| 42);

        // Not computed yet
        assert!(!memo.has_value());
        assert_eq!(memo.run_count(), 0);

        // First access triggers computation
        assert_eq!(memo.get(), Ok(42));
        assert_eq!(memo.run_count(), 1);
        assert!(memo.has_value());
    }

    #[test]
    fn memo_caches_value_when_clean() {
        let source = State::new(1);
        let memo = Memo::new({
            let source = source.clone();
            move || source.get() + 41
        });

        assert_eq!(memo.get(), Ok(42));
        assert_eq!(memo.get(), Ok(42));
        assert_eq!(memo.get(), Ok(42));
        assert_eq!(memo.run_count(), 1);
    }

    #[test]
    fn memo_recomputes_after_source_change() {
        let source = State::new(1);
        let memo = Memo::new({
            let source = source.clone();
            move || source.get() * 10
        });

        assert_eq!(memo.get(), Ok(10));
        source.set(2);
        assert_eq!(memo.state(), DirtyState::Dirty);
        assert_eq!(memo.get(), Ok(20));
        assert_eq!(memo.run_count(), 2);
    }

    #[test]
    fn memo_state_transitions() {
        let source = State::new(1);
        let first = Memo::new({
            let source = source.clone();
            move || source.get()
        });
        let second = Memo::try_new({
            let first = first.clone();
            move || Ok(first.get()? + 1)
        });

        // Starts dirty
        assert_eq!(second.state(), DirtyState::Dirty);

        // After get, becomes clean
        assert_eq!(second.get(), Ok(2));
        assert_eq!(second.state(), DirtyState::Clean);

        source.set(5);
        assert_eq!(first.state(), DirtyState::Dirty);
        assert_eq!(second.state(), DirtyState::MaybeDirty);

        assert_eq!(second.get(), Ok(6));
        assert_eq!(second.state(), DirtyState::Clean);
    }

    #[test]
    fn equal_result_stops_propagation() {
        let source = State::new(3);
        let parity = Memo::new({
            let source = source.clone();
            move || source.get() % 2
        });
        let label = Memo::try_new({
            let parity = parity.clone();
            move || Ok(if parity.get()? == 0 { "even" } else { "odd" })
        });

        assert_eq!(label.get(), Ok("odd"));
        source.set(5);
        assert_eq!(label.get(), Ok("odd"));
        assert_eq!(parity.run_count(), 2);
        assert_eq!(label.run_count(), 1);
    }

    #[test]
    fn dynamic_dependencies_replace_previous_ones() {
        let use_a = State::new(true);
        let a = State::new(1);
        let b = State::new(2);
        let memo = Memo::new({
            let (use_a, a, b) = (use_a.clone(), a.clone(), b.clone());
            move || if use_a.get() { a.get() } else { b.get() }
        });

        assert_eq!(memo.get(), Ok(1));
        assert_eq!(memo.dependency_count(), 2);

        use_a.set(false);
        assert_eq!(memo.get(), Ok(2));
        assert_eq!(a.subscriber_count(), 0);

        a.set(100);
        assert_eq!(memo.state(), DirtyState::Clean);
        assert_eq!(memo.run_count(), 2);
    }

    #[test]
    fn self_reference_is_a_circular_dependency() {
        let slot: Rc<RefCell<Option<Memo<i32>>>> = Rc::new(RefCell::new(None));
        let memo = Memo::try_new({
            let slot = Rc::clone(&slot);
            move || {
                let me = slot.borrow().clone();
                match me {
                    Some(me) => Ok(me.get()? + 1),
                    None => Ok(0),
                }
            }
        });
        *slot.borrow_mut() = Some(memo.clone());

        assert!(matches!(memo.get(), Err(Error::CircularDependency { .. })));
        // The error is cached, not recomputed on every read.
        assert!(matches!(memo.get(), Err(Error::CircularDependency { .. })));
        assert_eq!(memo.run_count(), 1);
        slot.borrow_mut().take();
    }

    #[test]
    fn memo_feeds_effects_once_per_batch() {
        let a = State::new(1);
        let b = State::new(2);
        let sum = Memo::new({
            let (a, b) = (a.clone(), b.clone());
            move || a.get() + b.get()
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let effect = Effect::new({
            let (sum, seen) = (sum.clone(), Rc::clone(&seen));
            move || seen.borrow_mut().push(sum.get().unwrap_or_default())
        });

        batch(|| {
            a.set(10);
            b.set(20);
        });

        assert_eq!(*seen.borrow(), vec![3, 30]);
        effect.dispose();
    }
}
