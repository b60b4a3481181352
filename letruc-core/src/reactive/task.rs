//! Task Implementation
//!
//! A Task is an async derived value. Its closure runs synchronously inside a
//! tracking frame and returns a future; every signal read before the future
//! is created becomes a dependency. The future is spawned locally, so tasks
//! must be read inside [`run_local`](super::run_local).
//!
//! # Lifecycle
//!
//! 1. First read starts a run and returns `Ok(None)` (pending).
//! 2. When the future resolves, the value is stored and dependents are
//!    invalidated like after a signal write.
//! 3. When a dependency changes, the next read starts a new run. The value
//!    goes back to pending, and the resolution of the superseded run is
//!    discarded whenever it arrives.
//! 4. A run that takes longer than the configured dependency timeout
//!    resolves to [`Error::DependencyTimeout`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use super::local;
use super::runtime::{attach_weak, Runtime};
use super::signal::Signal;
use crate::config::with_config;
use crate::error::{Error, Result};
use crate::graph::{Computation, Node, NodeId};

type StartFn<T> = Box<dyn Fn() -> LocalBoxFuture<'static, Result<T>>>;

struct TaskInner<T> {
    id: NodeId,
    start: StartFn<T>,
    value: RefCell<Option<Result<T>>>,
    generation: Cell<u64>,
    pending: Cell<bool>,
    this: Weak<TaskInner<T>>,
}

impl<T: Clone + 'static> TaskInner<T> {
    fn resolve(&self, generation: u64, result: Result<T>) {
        if generation != self.generation.get() {
            tracing::trace!(node = ?self.id, generation, "discarding stale task result");
            return;
        }
        self.pending.set(false);
        *self.value.borrow_mut() = Some(result);
        tracing::trace!(node = ?self.id, generation, "task resolved");
        Runtime::notify_signal_change(self.id);
    }
}

impl<T: Clone + 'static> Computation for TaskInner<T> {
    fn update(&self) -> Result<bool> {
        let future = Runtime::evaluate(self.id, || (self.start)())?;
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.pending.set(true);
        let had_value = self.value.borrow_mut().take().is_some();
        if had_value {
            Runtime::mark_observers_dirty(self.id);
        }

        let timeout = with_config(|c| c.dependency_timeout());
        let label = Runtime::label(self.id);
        let weak = Weak::clone(&self.this);
        let spawned = local::spawn("task read", async move {
            let result = match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => Err(Error::DependencyTimeout {
                    node: label.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };
            if let Some(inner) = weak.upgrade() {
                inner.resolve(generation, result);
            }
        });
        if let Err(error) = spawned {
            *self.value.borrow_mut() = Some(Err(error));
            self.pending.set(false);
            Runtime::mark_observers_dirty(self.id);
            return Ok(true);
        }
        tracing::trace!(node = ?self.id, generation, "task started");
        Ok(had_value)
    }
}

impl<T> Drop for TaskInner<T> {
    fn drop(&mut self) {
        Runtime::unregister(self.id);
    }
}

/// An async derived value.
///
/// # Example
///
/// ```rust
/// use letruc_core::reactive::{State, Task};
///
/// # async fn demo() {
/// let id = State::new(1);
/// let user = Task::new({
///     let id = id.clone();
///     move || {
///         let id = id.get();
///         async move { Ok(format!("user {id}")) }
///     }
/// });
/// assert_eq!(user.get(), Ok(None)); // pending
/// # }
/// ```
pub struct Task<T: 'static> {
    inner: Rc<TaskInner<T>>,
}

impl<T> Task<T>
where
    T: Clone + 'static,
{
    /// Create a task. Signals read by `start` before it returns its future
    /// are tracked; reads inside the future are not.
    pub fn new<F, Fut>(start: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T>> + 'static,
    {
        let id = Runtime::register(Node::derived().with_label("task"));
        let inner = Rc::new_cyclic(|this| TaskInner {
            id,
            start: Box::new(move || start().boxed_local()),
            value: RefCell::new(None),
            generation: Cell::new(0),
            pending: Cell::new(false),
            this: Weak::clone(this),
        });
        let computation: Rc<dyn Computation> = inner.clone();
        attach_weak(id, Rc::downgrade(&computation));
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The resolved value, `Ok(None)` while a run is pending.
    pub fn get(&self) -> Result<Option<T>> {
        Runtime::track(self.inner.id);
        Runtime::refresh(self.inner.id)?;
        match self.inner.value.borrow().as_ref() {
            Some(Ok(value)) => Ok(Some(value.clone())),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(None),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.get()
    }

    /// Number of runs started so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }
}

impl<T: Clone + 'static> Signal<Option<T>> for Task<T> {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn try_get(&self) -> Result<Option<T>> {
        self.get()
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("pending", &self.is_pending())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{configure, Config};
    use crate::reactive::{run_local, Effect, State};
    use std::time::Duration;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn resolves_and_notifies_dependents() {
        run_local(async {
            let source = State::new(2);
            let doubled = Task::new({
                let source = source.clone();
                move || {
                    let n = source.get();
                    async move { Ok(n * 2) }
                }
            });
            let seen = Rc::new(RefCell::new(Vec::new()));
            let effect = Effect::new({
                let (doubled, seen) = (doubled.clone(), Rc::clone(&seen));
                move || seen.borrow_mut().push(doubled.get().ok().flatten())
            });

            settle().await;
            assert_eq!(doubled.get(), Ok(Some(4)));

            source.set(5);
            settle().await;
            assert_eq!(doubled.get(), Ok(Some(10)));
            assert_eq!(*seen.borrow(), vec![None, Some(4), None, Some(10)]);
            effect.dispose();
        })
        .await;
    }

    #[tokio::test]
    async fn read_outside_local_scope_is_an_error() {
        let task = Task::new(|| async { Ok(1) });
        assert!(matches!(task.get(), Err(Error::InvalidCallback { .. })));
        assert!(!task.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_results_are_discarded() {
        run_local(async {
            let delay = State::new(50_u64);
            let task = Task::new({
                let delay = delay.clone();
                move || {
                    let ms = delay.get();
                    async move {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                        Ok(ms)
                    }
                }
            });

            assert_eq!(task.get(), Ok(None));
            delay.set(10);
            assert_eq!(task.get(), Ok(None));
            assert_eq!(task.generation(), 2);

            tokio::time::sleep(Duration::from_millis(100)).await;
            settle().await;
            assert_eq!(task.get(), Ok(Some(10)));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_time_out() {
        configure(Config {
            dependency_timeout_ms: 20,
            ..Config::default()
        });
        run_local(async {
            let task: Task<u32> = Task::new(|| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(1)
            });
            assert_eq!(task.get(), Ok(None));

            tokio::time::sleep(Duration::from_millis(50)).await;
            settle().await;
            assert_eq!(
                task.get(),
                Err(Error::DependencyTimeout {
                    node: "task".into(),
                    timeout_ms: 20
                })
            );
        })
        .await;
    }
}
