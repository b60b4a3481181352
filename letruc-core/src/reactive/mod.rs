//! Reactive Primitives
//!
//! This module implements the reactive system the component layer is built
//! on: signals, memos, effects, and the frame scheduler.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A signal holds a value. When it is read within a tracking context (a memo
//! or an effect), the reading computation is recorded as a dependent. When
//! the value changes, dependents are invalidated.
//!
//! [`State`] is set directly. [`Sensor`] is written by DOM events,
//! [`Collection`] by a mutation observer, [`Task`] by a future. [`Store`]
//! mirrors a JSON object as a tree of states.
//!
//! ## Memos
//!
//! A [`Memo`] is a derived value that caches its result. It re-evaluates only
//! when read after one of its dependencies changed, and recomputing to an
//! equal value does not wake its own dependents.
//!
//! ## Effects
//!
//! An [`Effect`] runs whenever its dependencies change. Effects are how
//! component state reaches the DOM. Writes inside [`batch`] run each stale
//! effect once, after the outermost batch closes.
//!
//! # Implementation Notes
//!
//! Tracking uses a thread-local stack of frames. A signal read pushes the
//! signal's id into the top frame; the computation's source edges are then
//! replaced with what it read on that run.

mod collection;
mod context;
mod effect;
mod local;
mod memo;
mod runtime;
mod scheduler;
mod sensor;
mod signal;
mod store;
mod task;

pub use collection::{key_of, Collection, CollectionChange};
pub use context::{run_tracked, untrack, ReactiveContext};
pub use effect::{Cleanup, Effect, IntoCleanup};
pub use local::{in_local_scope, run_local};
pub(crate) use local::spawn;
pub use memo::{Computed, Memo};
pub use runtime::{batch, Runtime, RuntimeStats};
pub use scheduler::{pending_jobs, schedule, DedupeKey};
pub use sensor::{Sensor, SensorEvent};
pub use signal::{AnySignal, Signal, State};
pub use store::Store;
pub use task::Task;
