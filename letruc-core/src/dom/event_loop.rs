//! Host Event Loop
//!
//! A deterministic stand-in for the browser's task queues. Nothing runs on
//! its own: the embedder (or a test) drives the loop by calling
//! [`perform_microtask_checkpoint`] and [`run_animation_frame`].
//!
//! A frame runs pending microtasks, then every frame callback that was
//! requested before the frame started, then microtasks again. Callbacks
//! requested during a frame wait for the next one.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::node::Element;

type Task = Box<dyn FnOnce()>;

/// Handle returned by [`request_animation_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Executes a `<script>` element re-created by an HTML effect.
pub type ScriptRunner = Rc<dyn Fn(&Element)>;

#[derive(Default)]
struct EventLoop {
    microtasks: RefCell<VecDeque<Task>>,
    frame_callbacks: RefCell<Vec<(FrameHandle, Task)>>,
    next_handle: Cell<u64>,
    frame_count: Cell<u64>,
    in_checkpoint: Cell<bool>,
    script_runner: RefCell<Option<ScriptRunner>>,
}

thread_local! {
    static EVENT_LOOP: EventLoop = EventLoop::default();
}

fn with_loop<R>(f: impl FnOnce(&EventLoop) -> R) -> Option<R> {
    EVENT_LOOP.try_with(f).ok()
}

/// Queue a microtask. It runs at the next checkpoint.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    with_loop(|l| l.microtasks.borrow_mut().push_back(Box::new(task)));
}

/// Request a callback for the next animation frame.
pub fn request_animation_frame(callback: impl FnOnce() + 'static) -> FrameHandle {
    with_loop(|l| {
        let handle = FrameHandle(l.next_handle.get());
        l.next_handle.set(handle.0 + 1);
        l.frame_callbacks
            .borrow_mut()
            .push((handle, Box::new(callback)));
        handle
    })
    .unwrap_or(FrameHandle(u64::MAX))
}

/// Cancel a frame callback that has not run yet.
pub fn cancel_animation_frame(handle: FrameHandle) {
    with_loop(|l| l.frame_callbacks.borrow_mut().retain(|(h, _)| *h != handle));
}

/// Run microtasks until the queue is empty, including the ones queued by
/// microtasks. Re-entrant calls return immediately.
pub fn perform_microtask_checkpoint() {
    let entered = with_loop(|l| !l.in_checkpoint.replace(true)).unwrap_or(false);
    if !entered {
        return;
    }
    let _guard = CheckpointGuard;
    while let Some(task) = with_loop(|l| l.microtasks.borrow_mut().pop_front()).flatten() {
        task();
    }
}

struct CheckpointGuard;

impl Drop for CheckpointGuard {
    fn drop(&mut self) {
        with_loop(|l| l.in_checkpoint.set(false));
    }
}

/// Run one animation frame.
pub fn run_animation_frame() {
    perform_microtask_checkpoint();
    let callbacks = with_loop(|l| std::mem::take(&mut *l.frame_callbacks.borrow_mut()))
        .unwrap_or_default();
    let count = with_loop(|l| {
        let n = l.frame_count.get() + 1;
        l.frame_count.set(n);
        n
    })
    .unwrap_or_default();
    tracing::trace!(frame = count, callbacks = callbacks.len(), "animation frame");
    for (_, callback) in callbacks {
        callback();
        perform_microtask_checkpoint();
    }
}

/// Number of frames run on this thread so far.
pub fn frame_count() -> u64 {
    with_loop(|l| l.frame_count.get()).unwrap_or_default()
}

/// Whether microtasks or frame callbacks are waiting.
pub fn has_pending_work() -> bool {
    with_loop(|l| !l.microtasks.borrow().is_empty() || !l.frame_callbacks.borrow().is_empty())
        .unwrap_or(false)
}

/// Install the function that executes re-created `<script>` elements.
pub fn set_script_runner(runner: impl Fn(&Element) + 'static) {
    with_loop(|l| *l.script_runner.borrow_mut() = Some(Rc::new(runner)));
}

/// Hand a script element to the installed runner. Without a runner the
/// script is inert, as in a document with scripting disabled.
pub fn run_script(script: &Element) {
    let runner = with_loop(|l| l.script_runner.borrow().clone()).flatten();
    match runner {
        Some(runner) => runner(script),
        None => tracing::debug!("no script runner installed; script left inert"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microtasks_run_in_order_including_nested() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = Rc::clone(&log);
            queue_microtask(move || {
                log.borrow_mut().push(1);
                let log = Rc::clone(&log);
                queue_microtask(move || log.borrow_mut().push(3));
            });
        }
        {
            let log = Rc::clone(&log);
            queue_microtask(move || log.borrow_mut().push(2));
        }
        perform_microtask_checkpoint();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn frame_callbacks_requested_during_a_frame_wait() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = Rc::clone(&log);
            request_animation_frame(move || {
                log.borrow_mut().push("first");
                let log = Rc::clone(&log);
                request_animation_frame(move || log.borrow_mut().push("second"));
            });
        }
        run_animation_frame();
        assert_eq!(*log.borrow(), vec!["first"]);
        run_animation_frame();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn cancelled_frame_callback_never_runs() {
        let ran = Rc::new(Cell::new(false));
        let handle = {
            let ran = Rc::clone(&ran);
            request_animation_frame(move || ran.set(true))
        };
        cancel_animation_frame(handle);
        run_animation_frame();
        assert!(!ran.get());
    }
}
