//! Frame Scheduler
//!
//! Defers work to the next animation frame. Calls sharing a [`DedupeKey`]
//! collapse into the most recent one: an earlier closure scheduled under
//! the same key before the frame fires is dropped without running.
//!
//! At most one frame request is outstanding. Everything scheduled for a
//! frame runs inside one batch, so writes made by different callbacks
//! trigger each dependent effect once.

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;

use super::runtime::batch;
use crate::dom::request_animation_frame;

/// Identifies a deduplication slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupeKey {
    /// Never collides with another key.
    Unique(u64),
    Named(String),
}

impl DedupeKey {
    pub fn unique() -> Self {
        SCHEDULER
            .try_with(|s| {
                let id = s.next_unique.get();
                s.next_unique.set(id + 1);
                DedupeKey::Unique(id)
            })
            .unwrap_or(DedupeKey::Unique(u64::MAX))
    }

    pub fn named(name: impl Into<String>) -> Self {
        DedupeKey::Named(name.into())
    }
}

type Job = Box<dyn FnOnce()>;

#[derive(Default)]
struct Scheduler {
    pending: RefCell<IndexMap<DedupeKey, Job>>,
    requested: Cell<bool>,
    next_unique: Cell<u64>,
}

thread_local! {
    static SCHEDULER: Scheduler = Scheduler::default();
}

/// Run `job` on the next animation frame. Without a key the job is never
/// deduplicated.
pub fn schedule(job: impl FnOnce() + 'static, key: Option<DedupeKey>) {
    let key = key.unwrap_or_else(DedupeKey::unique);
    let request = SCHEDULER
        .try_with(|s| {
            if let Some(replaced) = s.pending.borrow_mut().insert(key.clone(), Box::new(job)) {
                drop(replaced);
                tracing::trace!(?key, "scheduled job superseded");
            }
            !s.requested.replace(true)
        })
        .unwrap_or(false);
    if request {
        request_animation_frame(run_scheduled);
    }
}

fn run_scheduled() {
    let jobs = SCHEDULER
        .try_with(|s| {
            s.requested.set(false);
            std::mem::take(&mut *s.pending.borrow_mut())
        })
        .unwrap_or_default();
    tracing::trace!(jobs = jobs.len(), "running scheduled jobs");
    batch(|| {
        for (_, job) in jobs {
            job();
        }
    });
}

/// Number of jobs waiting for the next frame.
pub fn pending_jobs() -> usize {
    SCHEDULER
        .try_with(|s| s.pending.borrow().len())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::run_animation_frame;
    use std::rc::Rc;

    fn log() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn same_key_keeps_only_last_job() {
        let seen = log();
        let key = DedupeKey::named("resize");
        for name in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            schedule(move || seen.borrow_mut().push(name), Some(key.clone()));
        }
        assert_eq!(pending_jobs(), 1);
        assert!(seen.borrow().is_empty());

        run_animation_frame();
        assert_eq!(*seen.borrow(), vec!["c"]);
    }

    #[test]
    fn jobs_without_key_all_run_in_order() {
        let seen = log();
        for name in ["a", "b"] {
            let seen = Rc::clone(&seen);
            schedule(move || seen.borrow_mut().push(name), None);
        }
        run_animation_frame();
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
        assert_eq!(pending_jobs(), 0);
    }

    #[test]
    fn job_scheduled_during_frame_waits_for_next() {
        let seen = log();
        {
            let seen = Rc::clone(&seen);
            schedule(
                move || {
                    seen.borrow_mut().push("first");
                    let seen = Rc::clone(&seen);
                    schedule(move || seen.borrow_mut().push("second"), None);
                },
                None,
            );
        }
        run_animation_frame();
        assert_eq!(*seen.borrow(), vec!["first"]);
        run_animation_frame();
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn scheduled_writes_are_batched() {
        use crate::reactive::{Effect, State};

        let a = State::new(0);
        let b = State::new(0);
        let runs = Rc::new(Cell::new(0));
        let effect = Effect::new({
            let (a, b, runs) = (a.clone(), b.clone(), Rc::clone(&runs));
            move || {
                a.get();
                b.get();
                runs.set(runs.get() + 1);
            }
        });
        {
            let a = a.clone();
            schedule(move || a.set(1), None);
        }
        {
            let b = b.clone();
            schedule(move || b.set(1), None);
        }
        run_animation_frame();
        assert_eq!(runs.get(), 2);
        effect.dispose();
    }
}
