//! Signal Implementation
//!
//! A [`State`] is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it. The [`Signal`] trait is the
//! common read (and optionally write) interface of every signal kind, so
//! components can hold any of them behind one type.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    read is recorded as a dependency of that context.
//!
//! 2. When a signal's value changes, all dependents are invalidated.
//!
//! 3. Stale effects re-run once the current batch ends. A write outside any
//!    batch is its own batch.
//!
//! Writes of a value equal to the current one are dropped entirely: no
//! invalidation, no notification.
//!
//! # Memory Layout
//!
//! Each state consists of:
//! - A graph node id (8 bytes)
//! - The value, behind `Rc<RefCell<_>>`
//! - The equality function

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::runtime::Runtime;
use crate::error::{Error, Result};
use crate::graph::{Node, NodeId};

/// Read access shared by every signal kind.
pub trait Signal<T>: 'static {
    /// The signal's node in the dependency graph.
    fn id(&self) -> NodeId;

    /// Read the current value, recording a dependency when tracked.
    fn try_get(&self) -> Result<T>;

    /// Write a new value. Derived signals are read-only.
    fn try_set(&self, _value: T) -> Result<()> {
        Err(Error::ReadonlySignal {
            name: Runtime::label(self.id()).to_string(),
        })
    }

    fn is_writable(&self) -> bool {
        false
    }
}

/// A type-erased signal handle.
pub type AnySignal<T> = Rc<dyn Signal<T>>;

type EqualsFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

struct StateInner<T> {
    id: NodeId,
    value: RefCell<T>,
    equals: EqualsFn<T>,
}

impl<T> Drop for StateInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// A directly settable reactive value.
///
/// # Example
///
/// ```rust
/// use letruc_core::reactive::State;
///
/// let count = State::new(0);
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct State<T: 'static> {
    inner: Rc<StateInner<T>>,
}

impl<T> State<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new state with the given initial value, compared with
    /// `PartialEq` on write.
    pub fn new(value: T) -> Self {
        Self::with_equals(value, |a, b| a == b)
    }
}

impl<T> State<T>
where
    T: Clone + 'static,
{
    /// Create a state with a custom equality function.
    pub fn with_equals(value: T, equals: impl Fn(&T, &T) -> bool + 'static) -> Self {
        let id = Runtime::register(Node::source().with_label("state"));
        Self {
            inner: Rc::new(StateInner {
                id,
                value: RefCell::new(value),
                equals: Rc::new(equals),
            }),
        }
    }

    /// Get the signal's node id.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        Runtime::track(self.inner.id);
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning it. Tracked like [`get`](Self::get).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track(self.inner.id);
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify dependents if it differs from the current one.
    pub fn set(&self, value: T) {
        let changed = {
            let current = self.inner.value.borrow();
            !(self.inner.equals)(&current, &value)
        };
        if !changed {
            return;
        }
        *self.inner.value.borrow_mut() = value;
        tracing::trace!(node = ?self.inner.id, "state changed");
        Runtime::notify_signal_change(self.inner.id);
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Get the number of computations depending on this state.
    pub fn subscriber_count(&self) -> usize {
        Runtime::observer_count(self.inner.id)
    }
}

impl<T: Clone + 'static> Signal<T> for State<T> {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn try_get(&self) -> Result<T> {
        Ok(self.get())
    }

    fn try_set(&self, value: T) -> Result<()> {
        self.set(value);
        Ok(())
    }

    fn is_writable(&self) -> bool {
        true
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for State<T>
where
    T: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn state_get_and_set() {
        let state = State::new(0);
        assert_eq!(state.get(), 0);

        state.set(42);
        assert_eq!(state.get(), 42);
    }

    #[test]
    fn state_update() {
        let state = State::new(10);
        state.update(|v| v + 5);
        assert_eq!(state.get(), 15);
    }

    #[test]
    fn state_clone_shares_value() {
        let state1 = State::new(0);
        let state2 = state1.clone();

        state1.set(42);
        assert_eq!(state2.get(), 42);
        assert_eq!(state1.id(), state2.id());
    }

    #[test]
    fn equal_writes_do_not_notify() {
        let state = State::new(String::from("a"));
        let runs = Rc::new(Cell::new(0));
        let effect = {
            let state = state.clone();
            let runs = Rc::clone(&runs);
            Effect::new(move || {
                state.get();
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        state.set("a".into());
        assert_eq!(runs.get(), 1);

        state.set("b".into());
        assert_eq!(runs.get(), 2);
        effect.dispose();
    }

    #[test]
    fn custom_equality_decides_changes() {
        let state = State::with_equals(1.0_f64, |a, b| (a - b).abs() < 0.5);
        let runs = Rc::new(Cell::new(0));
        let effect = {
            let state = state.clone();
            let runs = Rc::clone(&runs);
            Effect::new(move || {
                state.get();
                runs.set(runs.get() + 1);
            })
        };

        state.set(1.2);
        assert_eq!(runs.get(), 1);
        assert_eq!(state.get_untracked(), 1.0);

        state.set(2.0);
        assert_eq!(runs.get(), 2);
        effect.dispose();
    }

    #[test]
    fn dropping_last_handle_unregisters() {
        let state = State::new(1);
        let id = state.id();
        assert!(Runtime::contains(id));
        drop(state);
        assert!(!Runtime::contains(id));
    }

    #[test]
    fn signal_trait_writes_through() {
        let state = State::new(3);
        let erased: AnySignal<i32> = Rc::new(state.clone());
        assert!(erased.is_writable());
        erased.try_set(4).unwrap();
        assert_eq!(state.get(), 4);
    }
}
