//! Local Executor Scope
//!
//! Tasks and deferred effects hold `Rc` state, so their futures go through
//! `tokio::task::spawn_local`. Tokio panics when that is called outside a
//! `LocalSet` and has no way to ask whether one is active. [`run_local`]
//! drives a `LocalSet` and marks the thread while it is being polled;
//! [`spawn`] checks the mark and reports misuse as an error.

use std::cell::Cell;
use std::future::Future;
use std::pin::pin;

use futures_util::future::poll_fn;
use tokio::task::{JoinHandle, LocalSet};

use crate::error::{Error, Result};

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct Entered;

impl Entered {
    fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Entered
    }
}

impl Drop for Entered {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get() - 1));
    }
}

/// Run `future` on a fresh `LocalSet`. Tasks and deferred effects can only
/// start inside this scope.
///
/// ```rust
/// use letruc_core::reactive::{run_local, Task};
///
/// # async fn demo() {
/// run_local(async {
///     let answer = Task::new(|| async { Ok(42) });
///     assert_eq!(answer.get(), Ok(None));
/// })
/// .await;
/// # }
/// ```
pub async fn run_local<F: Future>(future: F) -> F::Output {
    let local = LocalSet::new();
    let mut run = pin!(local.run_until(future));
    poll_fn(|cx| {
        let _entered = Entered::enter();
        run.as_mut().poll(cx)
    })
    .await
}

/// Whether the current thread is inside [`run_local`].
pub fn in_local_scope() -> bool {
    DEPTH.with(Cell::get) > 0
}

/// Spawn `future` on the active local scope. `context` names the caller in
/// the error returned outside one.
pub(crate) fn spawn<F>(context: &str, future: F) -> Result<JoinHandle<F::Output>>
where
    F: Future + 'static,
    F::Output: 'static,
{
    if !in_local_scope() {
        return Err(Error::InvalidCallback {
            context: format!("{context} outside run_local"),
        });
    }
    Ok(tokio::task::spawn_local(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_outside_scope_is_an_error() {
        assert!(!in_local_scope());
        assert!(matches!(
            spawn("test", async {}),
            Err(Error::InvalidCallback { .. })
        ));
    }

    #[tokio::test]
    async fn runtime_alone_is_not_a_scope() {
        assert!(!in_local_scope());
        assert!(spawn("test", async {}).is_err());
    }

    #[tokio::test]
    async fn spawned_futures_run_inside_the_scope() {
        let value = run_local(async {
            assert!(in_local_scope());
            let handle = spawn("test", async { in_local_scope() }).unwrap();
            handle.await.unwrap()
        })
        .await;
        assert!(value);
        assert!(!in_local_scope());
    }
}
